#![allow(dead_code)]

use async_trait::async_trait;
use auction_pipeline::config::PipelineConfig;
use auction_pipeline::message::QueueDelivery;
use auction_pipeline::message_broker::{BrokerError, TopicPublisher};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// 메모리 저장소를 쓰는 테스트 설정
pub fn config() -> PipelineConfig {
    PipelineConfig::from_lookup(|key| {
        let value = match key {
            "TABLE_NAME" => "Stock",
            "BIDS_TABLE" => "Bids",
            "REGION" => "eu-west-1",
            "STORE_BACKEND" => "memory",
            _ => return None,
        };
        Some(value.to_string())
    })
    .expect("테스트 설정 로드 실패")
}

// region:    --- Recording Publisher
/// 발행된 메시지를 기록만 하는 퍼블리셔
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, QueueDelivery)>>,
    fail: AtomicBool,
    failures_left: AtomicUsize,
    attempts: AtomicUsize,
}

impl RecordingPublisher {
    /// 모든 발행이 실패한다
    pub fn failing() -> Self {
        let publisher = Self::default();
        publisher.fail.store(true, Ordering::SeqCst);
        publisher
    }

    /// 처음 times번의 발행만 실패한다
    pub fn failing_times(times: usize) -> Self {
        let publisher = Self::default();
        publisher.failures_left.store(times, Ordering::SeqCst);
        publisher
    }

    /// 실패를 포함한 발행 시도 횟수
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn published(&self) -> Vec<(String, QueueDelivery)> {
        self.published.lock().unwrap().clone()
    }

    pub fn published_to(&self, topic: &str) -> Vec<QueueDelivery> {
        self.published()
            .into_iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, delivery)| delivery)
            .collect()
    }
}

#[async_trait]
impl TopicPublisher for RecordingPublisher {
    async fn publish(&self, topic: &str, delivery: &QueueDelivery) -> Result<(), BrokerError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let transient = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if transient || self.fail.load(Ordering::SeqCst) {
            return Err(BrokerError::Publish {
                topic: topic.to_string(),
                reason: "broker unavailable".to_string(),
            });
        }
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), delivery.clone()));
        Ok(())
    }
}
// endregion: --- Recording Publisher

// region:    --- Log Capture
/// ERROR 레벨 로그 메시지를 모으는 레이어
#[derive(Clone, Default)]
pub struct ErrorLogCapture {
    messages: Arc<Mutex<Vec<String>>>,
}

impl ErrorLogCapture {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl<S: Subscriber> Layer<S> for ErrorLogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::ERROR {
            return;
        }
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.messages.lock().unwrap().push(visitor.0);
    }
}

#[derive(Default)]
struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}
// endregion: --- Log Capture
