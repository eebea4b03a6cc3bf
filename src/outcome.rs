/// 핸들러 처리 결과
/// 브로커에 어떻게 알릴지는 호출하는 어댑터가 결정한다.
// region:    --- Imports
use crate::error::IngestError;

// endregion: --- Imports

// region:    --- Delivery Outcome
/// 메시지를 저장하지 않고 확인(ack) 처리한 이유
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// auctionType 속성이 없거나 허용 목록에 없음
    FilterMismatch { auction_type: Option<String> },
    /// 본문 파싱 실패 (입찰 핸들러만 건너뛴다)
    Unparseable(String),
}

/// 메시지 한 건의 처리 결과
#[derive(Debug)]
pub enum DeliveryOutcome {
    Processed,
    Dropped(DropReason),
    RetryableFailure(IngestError),
}
// endregion: --- Delivery Outcome

// region:    --- Batch Outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub dropped: usize,
}

impl BatchSummary {
    /// 성공/드롭 결과를 집계. 실패는 집계 대상이 아니다
    pub fn record(&mut self, outcome: &DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Processed => self.processed += 1,
            DeliveryOutcome::Dropped(_) => self.dropped += 1,
            DeliveryOutcome::RetryableFailure(_) => {}
        }
    }
}

/// 배치를 실패시킨 메시지와 오류
#[derive(Debug)]
pub struct BatchFailure {
    /// 타임아웃처럼 특정 메시지와 무관한 실패면 None
    pub message_id: Option<String>,
    pub error: IngestError,
    /// 실패 이전까지 처리된 결과
    pub completed: BatchSummary,
}

/// 한 번의 호출(배치) 처리 결과
#[derive(Debug)]
pub enum BatchOutcome {
    Completed(BatchSummary),
    Failed(BatchFailure),
}

impl BatchOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn timed_out(timeout: std::time::Duration) -> Self {
        Self::Failed(BatchFailure {
            message_id: None,
            error: IngestError::Timeout(timeout),
            completed: BatchSummary::default(),
        })
    }
}
// endregion: --- Batch Outcome
