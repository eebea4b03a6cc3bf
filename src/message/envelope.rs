use super::{MessageAttributes, QueueDelivery};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// pub/sub 알림 봉투
/// 실제 페이로드는 `Message` 필드에 JSON 문자열로 들어 있다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BrokerEnvelope {
    #[serde(rename = "Type", default)]
    pub kind: String,
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub topic_arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub message_attributes: BTreeMap<String, EnvelopeAttribute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeAttribute {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl BrokerEnvelope {
    /// 토픽에서 받은 메시지를 구독자에게 전달할 알림 봉투로 감싼다
    pub fn notification(topic: &str, delivery: &QueueDelivery) -> Self {
        Self {
            kind: "Notification".to_string(),
            message_id: delivery.message_id.clone(),
            topic_arn: topic.to_string(),
            message: Some(delivery.body.clone()),
            timestamp: Utc::now().to_rfc3339(),
            message_attributes: wrap_attributes(&delivery.attributes),
        }
    }
}

fn wrap_attributes(attributes: &MessageAttributes) -> BTreeMap<String, EnvelopeAttribute> {
    attributes
        .iter()
        .map(|(key, value)| {
            (
                key.clone(),
                EnvelopeAttribute {
                    kind: "String".to_string(),
                    value: value.clone(),
                },
            )
        })
        .collect()
}
