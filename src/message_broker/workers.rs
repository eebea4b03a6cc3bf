/// 브로커 워커
/// 각 워커는 별도 태스크에서 돌며, 메시지를 모아 핸들러를 호출(invocation)하고
/// 결과에 따라 커밋/재전달/DLQ 이동을 수행한다.
// region:    --- Imports
use super::topology::{apply_settlement, forward_batch, FilterPolicy, RedrivePolicy};
use super::{KafkaConsumer, TopicPublisher};
use crate::bidding::BidIngestHandler;
use crate::config::BatchSettings;
use crate::dead_letter::DeadLetterLogger;
use crate::message::{BrokerEnvelope, QueueDelivery};
use crate::outcome::BatchOutcome;
use crate::stock::StockIngestHandler;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{error, info, warn};

// endregion: --- Imports

/// 메시지를 기다리는 동안의 배치 창 (한 건씩 처리하는 워커용)
const SINGLE_MESSAGE_WINDOW: Duration = Duration::from_millis(0);

/// 큐/DLQ 발행 실패 시 재시도 간격
pub const PUBLISH_RETRY_DELAY: Duration = Duration::from_secs(1);

// region:    --- Subscription Forwarder
/// 토픽 -> 필터 -> 재고 큐
pub struct SubscriptionForwarder {
    pub consumer: KafkaConsumer,
    pub publisher: Arc<dyn TopicPublisher>,
    pub filter: FilterPolicy,
    pub queue: String,
}

impl SubscriptionForwarder {
    pub async fn run(self) {
        info!(
            "{:<12} --> 필터 구독 시작: {} -> {}",
            "Subscription",
            self.consumer.topic(),
            self.queue
        );
        loop {
            let batch = match self.consumer.next_batch(1, SINGLE_MESSAGE_WINDOW).await {
                Ok(batch) => batch,
                Err(e) => {
                    error!("{:<12} --> 메시지 수신 오류: {:?}", "Subscription", e);
                    continue;
                }
            };

            // 배치 전체가 전달된 뒤에만 커밋한다
            forward_batch(
                &*self.publisher,
                &self.filter,
                &self.queue,
                &batch,
                PUBLISH_RETRY_DELAY,
            )
            .await;
            commit(&self.consumer, "Subscription");
        }
    }
}
// endregion: --- Subscription Forwarder

// region:    --- Stock Queue Worker
/// 재고 배치 한 건의 호출과 정산
pub struct StockBatchProcessor {
    pub publisher: Arc<dyn TopicPublisher>,
    pub handler: StockIngestHandler,
    pub redrive: RedrivePolicy,
    pub timeout: Duration,
    pub queue: String,
    pub dead_letter_queue: String,
    pub retry_delay: Duration,
}

impl StockBatchProcessor {
    /// 핸들러를 호출하고 결과에 따라 재전달/DLQ 이동까지 마친 뒤 반환한다
    pub async fn process(&self, batch: Vec<QueueDelivery>) -> BatchOutcome {
        let outcome = invoke(self.timeout, self.handler.handle_batch(&batch)).await;
        if let BatchOutcome::Failed(failure) = &outcome {
            warn!(
                "{:<12} --> 배치 실패, 재전달 정책 적용: {}",
                "StockWorker", failure.error
            );
        }

        let settled = self.redrive.settle(batch, &outcome);
        apply_settlement(
            &*self.publisher,
            &self.queue,
            &self.dead_letter_queue,
            settled,
            self.retry_delay,
        )
        .await;
        outcome
    }
}

pub struct StockQueueWorker {
    pub consumer: KafkaConsumer,
    pub processor: StockBatchProcessor,
    pub batch: BatchSettings,
}

impl StockQueueWorker {
    pub async fn run(self) {
        info!(
            "{:<12} --> 재고 큐 워커 시작: {} (배치 {}건 / {:?})",
            "StockWorker",
            self.consumer.topic(),
            self.batch.max_size,
            self.batch.window
        );
        loop {
            let batch = match self
                .consumer
                .next_batch(self.batch.max_size, self.batch.window)
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    error!("{:<12} --> 메시지 수신 오류: {:?}", "StockWorker", e);
                    continue;
                }
            };

            self.processor.process(batch).await;
            commit(&self.consumer, "StockWorker");
        }
    }
}
// endregion: --- Stock Queue Worker

// region:    --- Dead Letter Worker
pub struct DeadLetterWorker {
    pub consumer: KafkaConsumer,
    pub logger: DeadLetterLogger,
}

impl DeadLetterWorker {
    pub async fn run(self) {
        info!(
            "{:<12} --> DLQ 워커 시작: {}",
            "DeadLetter",
            self.consumer.topic()
        );
        loop {
            match self.consumer.next_batch(1, SINGLE_MESSAGE_WINDOW).await {
                Ok(batch) => {
                    for delivery in &batch {
                        self.logger.handle(delivery);
                    }
                    commit(&self.consumer, "DeadLetter");
                }
                Err(e) => error!("{:<12} --> 메시지 수신 오류: {:?}", "DeadLetter", e),
            }
        }
    }
}
// endregion: --- Dead Letter Worker

// region:    --- Bid Subscription Worker
/// 토픽 -> (필터 없음) -> 입찰 핸들러
/// 실패한 호출은 max_attempts번까지 다시 호출한 뒤 버린다.
pub struct BidSubscriptionWorker {
    pub consumer: KafkaConsumer,
    pub handler: BidIngestHandler,
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl BidSubscriptionWorker {
    pub async fn run(self) {
        info!(
            "{:<12} --> 입찰 구독 시작: {}",
            "BidWorker",
            self.consumer.topic()
        );
        loop {
            let batch = match self.consumer.next_batch(1, SINGLE_MESSAGE_WINDOW).await {
                Ok(batch) => batch,
                Err(e) => {
                    error!("{:<12} --> 메시지 수신 오류: {:?}", "BidWorker", e);
                    continue;
                }
            };
            let envelopes: Vec<BrokerEnvelope> = batch
                .iter()
                .map(|delivery| BrokerEnvelope::notification(self.consumer.topic(), delivery))
                .collect();

            for attempt in 1..=self.max_attempts {
                match invoke(self.timeout, self.handler.handle_batch(&envelopes)).await {
                    BatchOutcome::Completed(_) => break,
                    BatchOutcome::Failed(failure) if attempt < self.max_attempts => warn!(
                        "{:<12} --> 호출 실패 ({}/{}), 재호출: {}",
                        "BidWorker", attempt, self.max_attempts, failure.error
                    ),
                    BatchOutcome::Failed(failure) => error!(
                        "{:<12} --> 호출 실패 ({}/{}), 메시지 폐기: {:?} ({})",
                        "BidWorker", attempt, self.max_attempts, failure.message_id, failure.error
                    ),
                }
            }
            commit(&self.consumer, "BidWorker");
        }
    }
}
// endregion: --- Bid Subscription Worker

// region:    --- Helpers
/// 호출 시간 제한. 시간 초과는 명시적 실패와 같게 취급한다
async fn invoke<F>(timeout: Duration, invocation: F) -> BatchOutcome
where
    F: std::future::Future<Output = BatchOutcome>,
{
    match time::timeout(timeout, invocation).await {
        Ok(outcome) => outcome,
        Err(_) => BatchOutcome::timed_out(timeout),
    }
}

fn commit(consumer: &KafkaConsumer, component: &str) {
    if let Err(e) = consumer.commit() {
        error!("{:<12} --> 오프셋 커밋 실패: {:?}", component, e);
    }
}
// endregion: --- Helpers
