/// 재고 상품 수집 핸들러
/// 1. 본문 파싱 (실패 시 배치 전체 실패)
/// 2. auctionType 속성 필터링 (불일치 시 드롭)
/// 3. marketValue >= minimumPrice 검증 (위반 시 배치 전체 실패 -> 재전달 -> DLQ)
/// 4. id 기준 upsert
// region:    --- Imports
use super::model::{AuctionType, PersistedStockItem, StockItemEvent, AUCTION_TYPE_ATTRIBUTE};
use crate::config::PipelineConfig;
use crate::database::{DurableStore, RecordKey, StoreError};
use crate::error::IngestError;
use crate::message::{ParseResult, QueueDelivery};
use crate::outcome::{BatchFailure, BatchOutcome, BatchSummary, DeliveryOutcome, DropReason};
use std::sync::Arc;
use tracing::{error, info};

// endregion: --- Imports

// region:    --- Stock Ingest Handler
pub struct StockIngestHandler {
    store: Arc<dyn DurableStore>,
    table: String,
}

impl StockIngestHandler {
    pub fn new(store: Arc<dyn DurableStore>, config: &PipelineConfig) -> Self {
        Self {
            store,
            table: config.stock_table.clone(),
        }
    }

    /// 배치 처리
    /// 메시지는 순서대로 처리하며, 첫 번째 치명적 오류에서 호출을 중단한다.
    pub async fn handle_batch(&self, deliveries: &[QueueDelivery]) -> BatchOutcome {
        info!(
            "{:<12} --> 배치 수신: {}건",
            "StockIngest",
            deliveries.len()
        );
        let mut summary = BatchSummary::default();

        for delivery in deliveries {
            match self.handle_delivery(delivery).await {
                DeliveryOutcome::RetryableFailure(error) => {
                    error!(
                        "{:<12} --> 배치 실패 (message_id: {}): {}",
                        "StockIngest", delivery.message_id, error
                    );
                    return BatchOutcome::Failed(BatchFailure {
                        message_id: Some(delivery.message_id.clone()),
                        error,
                        completed: summary,
                    });
                }
                outcome => summary.record(&outcome),
            }
        }

        info!(
            "{:<12} --> 배치 완료: 저장 {}건, 드롭 {}건",
            "StockIngest", summary.processed, summary.dropped
        );
        BatchOutcome::Completed(summary)
    }

    /// 메시지 한 건 처리
    pub async fn handle_delivery(&self, delivery: &QueueDelivery) -> DeliveryOutcome {
        // 1. 본문 파싱
        let item = match ParseResult::<StockItemEvent>::json(&delivery.body) {
            ParseResult::Ok(item) => item,
            ParseResult::ParseFailure(reason) => {
                return DeliveryOutcome::RetryableFailure(IngestError::Parse(reason))
            }
        };

        // 2. auctionType 필터링
        let raw_auction_type = delivery.attribute(AUCTION_TYPE_ATTRIBUTE);
        let auction_type = match raw_auction_type.map(str::parse::<AuctionType>) {
            Some(Ok(auction_type)) => auction_type,
            _ => {
                info!(
                    "{:<12} --> auctionType 불일치로 드롭: id={}, auctionType={:?}",
                    "StockIngest", item.id, raw_auction_type
                );
                return DeliveryOutcome::Dropped(DropReason::FilterMismatch {
                    auction_type: raw_auction_type.map(str::to_string),
                });
            }
        };

        // 3. 가격 검증
        if let Some((market_value, minimum_price)) = item.prices() {
            if market_value < minimum_price {
                error!(
                    "{:<12} --> marketValue < minimumPrice, 재전달 유도: {}",
                    "StockIngest",
                    serde_json::to_string(&item).unwrap_or_else(|_| delivery.body.clone())
                );
                return DeliveryOutcome::RetryableFailure(IngestError::Validation {
                    id: item.id,
                    market_value,
                    minimum_price,
                });
            }
        }

        // 4. 저장
        let id = item.id.clone();
        match self.persist(PersistedStockItem::new(item, auction_type)).await {
            Ok(()) => {
                info!(
                    "{:<12} --> 저장 완료: id={}, auctionType={}",
                    "StockIngest", id, auction_type
                );
                DeliveryOutcome::Processed
            }
            Err(e) => DeliveryOutcome::RetryableFailure(e),
        }
    }

    async fn persist(&self, item: PersistedStockItem) -> Result<(), IngestError> {
        let record = serde_json::to_value(&item).map_err(StoreError::from)?;
        self.store
            .put_item(&self.table, &RecordKey::Text(item.item.id.clone()), &record)
            .await?;
        Ok(())
    }
}
// endregion: --- Stock Ingest Handler
