/// 입찰 수집 핸들러
/// 1. 봉투의 Message 파싱 (실패 시 해당 메시지만 건너뜀)
/// 2. 처리 시각(timestamp) 추가
/// 3. bidId 기준 upsert (실패 시 호출 전체 실패)
// region:    --- Imports
use super::model::{BidEvent, PersistedBid};
use crate::config::PipelineConfig;
use crate::database::{DurableStore, RecordKey, StoreError};
use crate::error::IngestError;
use crate::message::{BrokerEnvelope, ParseResult};
use crate::outcome::{BatchFailure, BatchOutcome, BatchSummary, DeliveryOutcome, DropReason};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info};

// endregion: --- Imports

// region:    --- Bid Ingest Handler
pub struct BidIngestHandler {
    store: Arc<dyn DurableStore>,
    table: String,
    clock: fn() -> DateTime<Utc>,
}

impl BidIngestHandler {
    pub fn new(store: Arc<dyn DurableStore>, config: &PipelineConfig) -> Self {
        Self {
            store,
            table: config.bids_table.clone(),
            clock: Utc::now,
        }
    }

    /// 처리 시각 공급자 교체
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// 배치 처리
    pub async fn handle_batch(&self, envelopes: &[BrokerEnvelope]) -> BatchOutcome {
        let mut summary = BatchSummary::default();

        for envelope in envelopes {
            match self.handle_envelope(envelope).await {
                DeliveryOutcome::RetryableFailure(error) => {
                    return BatchOutcome::Failed(BatchFailure {
                        message_id: Some(envelope.message_id.clone()),
                        error,
                        completed: summary,
                    });
                }
                outcome => summary.record(&outcome),
            }
        }

        BatchOutcome::Completed(summary)
    }

    /// 봉투 한 건 처리
    pub async fn handle_envelope(&self, envelope: &BrokerEnvelope) -> DeliveryOutcome {
        // 1. 입찰 메시지 파싱
        let message = envelope.message.as_deref().unwrap_or_default();
        let bid = match ParseResult::<BidEvent>::json(message) {
            ParseResult::Ok(bid) => bid,
            ParseResult::ParseFailure(reason) => {
                error!(
                    "{:<12} --> 입찰 메시지 파싱 실패, 건너뜀: {} ({})",
                    "BidIngest", message, reason
                );
                return DeliveryOutcome::Dropped(DropReason::Unparseable(reason));
            }
        };

        // 2. 처리 시각 추가
        let bid = PersistedBid::enrich(bid, (self.clock)());

        // 3. 저장
        match self.persist(&bid).await {
            Ok(()) => {
                info!(
                    "{:<12} --> 입찰 저장 완료: {}",
                    "BidIngest",
                    serde_json::to_string(&bid).unwrap_or_default()
                );
                DeliveryOutcome::Processed
            }
            Err(e) => {
                error!("{:<12} --> 입찰 저장 실패: {}", "BidIngest", e);
                DeliveryOutcome::RetryableFailure(e)
            }
        }
    }

    async fn persist(&self, bid: &PersistedBid) -> Result<(), IngestError> {
        let record = serde_json::to_value(bid).map_err(StoreError::from)?;
        self.store
            .put_item(&self.table, &RecordKey::Number(bid.bid.bid_id), &record)
            .await?;
        Ok(())
    }
}
// endregion: --- Bid Ingest Handler
