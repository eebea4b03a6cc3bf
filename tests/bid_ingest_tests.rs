mod common;

use auction_pipeline::bidding::BidIngestHandler;
use auction_pipeline::database::{InMemoryStore, RecordKey};
use auction_pipeline::error::IngestError;
use auction_pipeline::message::{BrokerEnvelope, QueueDelivery};
use auction_pipeline::outcome::{BatchOutcome, BatchSummary, DeliveryOutcome, DropReason};
use chrono::{DateTime, TimeZone, Utc};
use common::config;
use serde_json::json;
use std::sync::Arc;

const BIDS_TABLE: &str = "Bids";
const AUCTION_TOPIC: &str = "auction-topic";

fn setup() -> (Arc<InMemoryStore>, BidIngestHandler) {
    let store = Arc::new(InMemoryStore::new());
    let handler = BidIngestHandler::new(store.clone(), &config());
    (store, handler)
}

fn envelope(id: &str, message: &str) -> BrokerEnvelope {
    BrokerEnvelope::notification(AUCTION_TOPIC, &QueueDelivery::new(id, message))
}

fn morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap()
}

fn evening() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 18, 0, 0).unwrap()
}

/// 입찰은 처리 시각이 추가된 채로 저장되고 나머지 필드는 그대로다
#[tokio::test]
async fn test_bid_is_persisted_with_timestamp() {
    let (store, handler) = setup();

    let outcome = handler
        .handle_batch(&[envelope("m-5", r#"{"bidId":5,"bidder":"x"}"#)])
        .await;

    assert!(matches!(
        outcome,
        BatchOutcome::Completed(BatchSummary {
            processed: 1,
            dropped: 0
        })
    ));
    let record = store
        .get(BIDS_TABLE, &RecordKey::Number(5))
        .await
        .expect("저장된 입찰");
    assert_eq!(record["bidId"], 5);
    assert_eq!(record["bidder"], "x");
    let timestamp = record["timestamp"].as_str().expect("timestamp 문자열");
    assert!(DateTime::parse_from_rfc3339(timestamp).is_ok());
}

/// 처리 시각 공급자를 교체할 수 있다
#[tokio::test]
async fn test_timestamp_comes_from_clock() {
    let store = Arc::new(InMemoryStore::new());
    let handler = BidIngestHandler::new(store.clone(), &config()).with_clock(morning);

    handler
        .handle_batch(&[envelope("m-5", r#"{"bidId":5,"amount":120}"#)])
        .await;

    assert_eq!(
        store.get(BIDS_TABLE, &RecordKey::Number(5)).await,
        Some(json!({
            "bidId": 5,
            "amount": 120,
            "timestamp": "2026-10-16T09:30:00+00:00"
        }))
    );
}

/// 재전달된 입찰은 timestamp만 바뀐 채로 덮어쓴다
#[tokio::test]
async fn test_redelivered_bid_only_changes_timestamp() {
    let store = Arc::new(InMemoryStore::new());
    let message = r#"{"bidId":9,"bidder":"y","amount":300}"#;

    BidIngestHandler::new(store.clone(), &config())
        .with_clock(morning)
        .handle_batch(&[envelope("m-9", message)])
        .await;
    let mut first = store.get(BIDS_TABLE, &RecordKey::Number(9)).await.unwrap();

    BidIngestHandler::new(store.clone(), &config())
        .with_clock(evening)
        .handle_batch(&[envelope("m-9", message)])
        .await;
    let mut second = store.get(BIDS_TABLE, &RecordKey::Number(9)).await.unwrap();

    assert_eq!(store.len(BIDS_TABLE).await, 1);
    assert_ne!(first["timestamp"], second["timestamp"]);
    first.as_object_mut().unwrap().remove("timestamp");
    second.as_object_mut().unwrap().remove("timestamp");
    assert_eq!(first, second);
}

/// 파싱할 수 없는 입찰은 건너뛰고 나머지는 계속 처리한다
#[tokio::test]
async fn test_unparseable_bid_is_skipped() {
    let (store, handler) = setup();

    let outcome = handler
        .handle_batch(&[
            envelope("m-1", "garbage"),
            envelope("m-2", r#"{"bidId":2}"#),
        ])
        .await;

    assert!(matches!(
        outcome,
        BatchOutcome::Completed(BatchSummary {
            processed: 1,
            dropped: 1
        })
    ));
    assert_eq!(store.len(BIDS_TABLE).await, 1);
    assert!(store.get(BIDS_TABLE, &RecordKey::Number(2)).await.is_some());
}

/// 필터 없는 구독이라 재고 상품도 도착한다. bidId가 없으면 건너뛴다
#[tokio::test]
async fn test_message_without_bid_id_is_skipped() {
    let (store, handler) = setup();
    let stock_item = envelope("m-1", r#"{"id":"1","marketValue":100}"#);

    match handler.handle_envelope(&stock_item).await {
        DeliveryOutcome::Dropped(DropReason::Unparseable(_)) => {}
        other => panic!("건너뛰어야 한다: {other:?}"),
    }
    assert_eq!(store.write_count(), 0);
}

/// Message가 없는 봉투도 건너뛴다
#[tokio::test]
async fn test_envelope_without_message_is_skipped() {
    let (store, handler) = setup();
    let mut empty = envelope("m-1", "");
    empty.message = None;

    assert!(matches!(
        handler.handle_envelope(&empty).await,
        DeliveryOutcome::Dropped(_)
    ));
    assert_eq!(store.write_count(), 0);
}

/// 저장소 오류는 호출 전체를 실패시킨다
#[tokio::test]
async fn test_store_failure_fails_the_invocation() {
    let (store, handler) = setup();
    store.set_fail_writes(true);

    match handler
        .handle_batch(&[envelope("m-6", r#"{"bidId":6}"#)])
        .await
    {
        BatchOutcome::Failed(failure) => {
            assert_eq!(failure.message_id.as_deref(), Some("m-6"));
            assert!(matches!(failure.error, IngestError::Persistence(_)));
        }
        BatchOutcome::Completed(_) => panic!("저장 실패는 호출을 실패시켜야 한다"),
    }
    assert_eq!(store.len(BIDS_TABLE).await, 0);
}
