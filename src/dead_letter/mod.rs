/// DLQ 로거
/// DLQ로 넘어온 메시지를 최대한 해석해서 로그로 남긴다.
/// 어떤 입력이 와도 실패하지 않으며, 메시지당 정확히 한 건의 로그를 남긴다.
// region:    --- Imports
use crate::message::{ParseResult, QueueDelivery};
use serde_json::Value;
use tracing::error;

// endregion: --- Imports

/// DLQ 메시지에 붙는 고정 사유
pub const FAULTY_ITEM_REASON: &str = "marketValue is less than minimumPrice";

/// 해석 불가능한 본문 표시
pub const UNPARSEABLE_MARKER: &str = "unparseable";

/// 브로커 봉투에서 원본 메시지가 담긴 필드
const ENVELOPE_MESSAGE_FIELD: &str = "Message";

// region:    --- Diagnosis
/// 실패한 메시지의 진단 결과 (로그 전용)
#[derive(Debug, Clone, PartialEq)]
pub enum FaultyItemDiagnosis {
    /// 본문 자체가 JSON
    Parsed(Value),
    /// 브로커 봉투 안의 Message가 JSON
    Enveloped(Value),
    /// 어느 쪽으로도 해석 불가
    Unparseable(String),
}

impl FaultyItemDiagnosis {
    /// (a) 본문을 JSON으로 직접 해석
    /// (b) 해석 결과가 브로커 봉투면 Message를 다시 해석
    /// (c) 본문이 JSON이 아니면 원문 그대로
    pub fn from_body(body: &str) -> Self {
        let item = match ParseResult::<Value>::json(body) {
            ParseResult::Ok(item) => item,
            ParseResult::ParseFailure(_) => return Self::Unparseable(body.to_string()),
        };
        match unwrap_envelope(&item) {
            Some(inner) => Self::Enveloped(inner),
            None => Self::Parsed(item),
        }
    }

    pub fn reason(&self) -> &'static str {
        FAULTY_ITEM_REASON
    }
}

/// 객체이고 문자열 Message 필드가 JSON일 때만 Some
fn unwrap_envelope(item: &Value) -> Option<Value> {
    let message = item.as_object()?.get(ENVELOPE_MESSAGE_FIELD)?.as_str()?;
    ParseResult::<Value>::json(message).ok()
}
// endregion: --- Diagnosis

// region:    --- Dead Letter Logger
#[derive(Debug, Default, Clone, Copy)]
pub struct DeadLetterLogger;

impl DeadLetterLogger {
    pub fn new() -> Self {
        Self
    }

    /// DLQ 메시지 한 건 처리
    pub fn handle(&self, delivery: &QueueDelivery) -> FaultyItemDiagnosis {
        let diagnosis = FaultyItemDiagnosis::from_body(&delivery.body);
        log_diagnosis(&delivery.message_id, &diagnosis);
        diagnosis
    }
}

fn log_diagnosis(message_id: &str, diagnosis: &FaultyItemDiagnosis) {
    match diagnosis {
        FaultyItemDiagnosis::Parsed(item) | FaultyItemDiagnosis::Enveloped(item) => error!(
            "{:<12} --> Faulty stock item received: {} | Reason: {} (message_id: {})",
            "DeadLetter",
            item,
            diagnosis.reason(),
            message_id
        ),
        FaultyItemDiagnosis::Unparseable(raw) => error!(
            "{:<12} --> Faulty stock item received ({}): {} | Reason: {} (message_id: {})",
            "DeadLetter",
            UNPARSEABLE_MARKER,
            raw,
            diagnosis.reason(),
            message_id
        ),
    }
}
// endregion: --- Dead Letter Logger
