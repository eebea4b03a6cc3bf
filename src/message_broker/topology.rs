/// 브로커 토폴로지 규칙
/// 토픽 -> (필터) -> 기본 큐 -> (재전달 한도 초과) -> DLQ
/// 핸들러는 이 규칙을 모른다. 어댑터가 핸들러 결과를 보고 적용한다.
// region:    --- Imports
use super::TopicPublisher;
use crate::message::{MessageAttributes, QueueDelivery};
use crate::outcome::BatchOutcome;
use crate::stock::{AuctionType, AUCTION_TYPE_ATTRIBUTE};
use std::time::Duration;
use tokio::time;
use tracing::{debug, warn};

// endregion: --- Imports

// region:    --- Filter Policy
/// 속성 기반 구독 필터 (허용 목록, 정확히 일치)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPolicy {
    attribute: String,
    allowlist: Vec<String>,
}

impl FilterPolicy {
    pub fn new<I, S>(attribute: impl Into<String>, allowlist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attribute: attribute.into(),
            allowlist: allowlist.into_iter().map(Into::into).collect(),
        }
    }

    /// 재고 큐 구독 필터: auctionType ∈ {Public, Private, Online}
    pub fn auction_types() -> Self {
        Self::new(
            AUCTION_TYPE_ATTRIBUTE,
            AuctionType::ALL.iter().map(AuctionType::as_str),
        )
    }

    pub fn matches(&self, attributes: &MessageAttributes) -> bool {
        attributes
            .get(&self.attribute)
            .is_some_and(|value| self.allowlist.iter().any(|allowed| allowed == value))
    }
}

/// 필터와 일치하면 큐로 전달. 전달했으면 true
/// 큐 입장에서는 새 메시지이므로 전달 횟수는 0부터 시작한다.
pub async fn forward_if_matching(
    publisher: &dyn TopicPublisher,
    filter: &FilterPolicy,
    queue: &str,
    delivery: &QueueDelivery,
    retry_delay: Duration,
) -> bool {
    if !filter.matches(&delivery.attributes) {
        debug!(
            "{:<12} --> 필터 불일치, 전달하지 않음: message_id={}",
            "Subscription", delivery.message_id
        );
        return false;
    }
    let forwarded = delivery.clone().with_receive_count(0);
    publish_until_accepted(publisher, queue, &forwarded, retry_delay).await;
    true
}

/// 배치 전체를 필터에 통과시킨다. 모든 메시지가 전달(또는 필터링)된 뒤에만 반환한다
pub async fn forward_batch(
    publisher: &dyn TopicPublisher,
    filter: &FilterPolicy,
    queue: &str,
    batch: &[QueueDelivery],
    retry_delay: Duration,
) -> usize {
    let mut forwarded = 0;
    for delivery in batch {
        if forward_if_matching(publisher, filter, queue, delivery, retry_delay).await {
            forwarded += 1;
        }
    }
    forwarded
}
// endregion: --- Filter Policy

// region:    --- Redrive Policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedriveAction {
    Acknowledge,
    Redeliver,
    DeadLetter,
}

/// 재전달 정책
/// 실패한 배치의 메시지가 max_receive_count번 전달됐으면 DLQ로 보낸다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedrivePolicy {
    pub max_receive_count: u32,
}

impl RedrivePolicy {
    pub fn new(max_receive_count: u32) -> Self {
        Self { max_receive_count }
    }

    pub fn action_for(&self, delivery: &QueueDelivery, batch_failed: bool) -> RedriveAction {
        if !batch_failed {
            RedriveAction::Acknowledge
        } else if delivery.receive_count >= self.max_receive_count {
            RedriveAction::DeadLetter
        } else {
            RedriveAction::Redeliver
        }
    }

    /// 배치 결과 정산
    /// 실패하면 이미 성공한 메시지를 포함해 배치 전체가 재전달 대상이다.
    pub fn settle(
        &self,
        batch: Vec<QueueDelivery>,
        outcome: &BatchOutcome,
    ) -> Vec<(QueueDelivery, RedriveAction)> {
        let failed = outcome.is_failed();
        batch
            .into_iter()
            .map(|delivery| {
                let action = self.action_for(&delivery, failed);
                (delivery, action)
            })
            .collect()
    }
}

/// 정산 결과를 큐/DLQ에 반영
/// 모든 재전달/DLQ 이동이 발행된 뒤에만 반환하므로, 이후 오프셋을 커밋해도 유실되지 않는다.
pub async fn apply_settlement(
    publisher: &dyn TopicPublisher,
    queue: &str,
    dead_letter_queue: &str,
    settled: Vec<(QueueDelivery, RedriveAction)>,
    retry_delay: Duration,
) {
    for (delivery, action) in settled {
        match action {
            RedriveAction::Acknowledge => {}
            RedriveAction::Redeliver => {
                debug!(
                    "{:<12} --> 재전달: message_id={}, receive_count={}",
                    "Redrive", delivery.message_id, delivery.receive_count
                );
                publish_until_accepted(publisher, queue, &delivery, retry_delay).await;
            }
            RedriveAction::DeadLetter => {
                warn!(
                    "{:<12} --> DLQ 이동: message_id={}, receive_count={}",
                    "Redrive", delivery.message_id, delivery.receive_count
                );
                publish_until_accepted(publisher, dead_letter_queue, &delivery, retry_delay)
                    .await;
            }
        }
    }
}

/// 발행이 성공할 때까지 같은 메시지를 재시도
async fn publish_until_accepted(
    publisher: &dyn TopicPublisher,
    topic: &str,
    delivery: &QueueDelivery,
    retry_delay: Duration,
) {
    let mut attempt: u32 = 1;
    while let Err(e) = publisher.publish(topic, delivery).await {
        warn!(
            "{:<12} --> 발행 실패 ({}회차), {:?} 후 재시도: topic={}, message_id={} ({})",
            "Redrive", attempt, retry_delay, topic, delivery.message_id, e
        );
        attempt = attempt.saturating_add(1);
        time::sleep(retry_delay).await;
    }
}
// endregion: --- Redrive Policy

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;
    use crate::outcome::{BatchFailure, BatchSummary};
    use rstest::rstest;

    fn attributes(value: Option<&str>) -> MessageAttributes {
        value
            .map(|v| MessageAttributes::from([(AUCTION_TYPE_ATTRIBUTE.to_string(), v.to_string())]))
            .unwrap_or_default()
    }

    #[rstest]
    #[case(Some("Public"), true)]
    #[case(Some("Private"), true)]
    #[case(Some("Online"), true)]
    #[case(Some("public"), false)]
    #[case(Some("Foo"), false)]
    #[case(None, false)]
    fn auction_type_filter(#[case] value: Option<&str>, #[case] expected: bool) {
        assert_eq!(
            FilterPolicy::auction_types().matches(&attributes(value)),
            expected
        );
    }

    fn failed() -> BatchOutcome {
        BatchOutcome::Failed(BatchFailure {
            message_id: Some("b".to_string()),
            error: IngestError::Parse("bad".to_string()),
            completed: BatchSummary::default(),
        })
    }

    fn batch(receive_count: u32) -> Vec<QueueDelivery> {
        vec![
            QueueDelivery::new("a", "{}").with_receive_count(receive_count),
            QueueDelivery::new("b", "{").with_receive_count(receive_count),
        ]
    }

    #[test]
    fn completed_batch_is_acknowledged() {
        let settled = RedrivePolicy::new(1).settle(
            batch(1),
            &BatchOutcome::Completed(BatchSummary::default()),
        );
        assert!(settled
            .iter()
            .all(|(_, action)| *action == RedriveAction::Acknowledge));
    }

    #[test]
    fn failed_batch_at_threshold_is_dead_lettered_whole() {
        let settled = RedrivePolicy::new(1).settle(batch(1), &failed());
        assert_eq!(settled.len(), 2);
        assert!(settled
            .iter()
            .all(|(_, action)| *action == RedriveAction::DeadLetter));
    }

    #[test]
    fn failed_batch_below_threshold_is_redelivered() {
        let settled = RedrivePolicy::new(3).settle(batch(2), &failed());
        assert!(settled
            .iter()
            .all(|(delivery, action)| *action == RedriveAction::Redeliver
                && delivery.receive_count == 2));
    }
}
