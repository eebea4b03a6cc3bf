use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const TIMESTAMP_FIELD: &str = "timestamp";

// 입찰 이벤트
// bidId 외의 필드는 해석하지 않고 그대로 보존한다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidEvent {
    #[serde(rename = "bidId")]
    pub bid_id: i64,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

// 저장되는 입찰 (처리 시각 추가)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistedBid {
    #[serde(flatten)]
    pub bid: BidEvent,
    pub timestamp: String,
}

impl PersistedBid {
    /// 처리 시각을 붙인다. 같은 이벤트가 재전달되면 시각이 달라진다.
    pub fn enrich(mut bid: BidEvent, processed_at: DateTime<Utc>) -> Self {
        bid.fields.remove(TIMESTAMP_FIELD);
        Self {
            bid,
            timestamp: processed_at.to_rfc3339(),
        }
    }
}
