use std::collections::BTreeMap;

/// 메시지 속성 (본문과 별도로 전달되는 문자열 키/값)
pub type MessageAttributes = BTreeMap<String, String>;

/// 큐 컨슈머가 받는 메시지 한 건
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueDelivery {
    pub message_id: String,
    pub body: String,
    pub attributes: MessageAttributes,
    /// 이 메시지가 컨슈머에게 전달된 횟수 (최초 발행 시 0)
    pub receive_count: u32,
}

impl QueueDelivery {
    pub fn new(message_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            body: body.into(),
            attributes: MessageAttributes::new(),
            receive_count: 0,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_receive_count(mut self, receive_count: u32) -> Self {
        self.receive_count = receive_count;
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}
