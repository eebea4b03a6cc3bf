use crate::database::StoreError;
use std::time::Duration;
use thiserror::Error;

/// 메시지 처리 중 호출(invocation)을 중단시키는 오류
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed message body: {0}")]
    Parse(String),
    #[error("stock item {id}: marketValue {market_value} is less than minimumPrice {minimum_price}")]
    Validation {
        id: String,
        market_value: f64,
        minimum_price: f64,
    },
    #[error("store write failed: {0}")]
    Persistence(#[from] StoreError),
    #[error("invocation timed out after {0:?}")]
    Timeout(Duration),
}
