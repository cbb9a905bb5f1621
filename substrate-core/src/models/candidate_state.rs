use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a short-term memory as it moves through consolidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    /// Eligible for selection, not yet picked up by a run.
    Pending,
    /// Picked up by the current run's selection phase.
    Selected,
    /// Successfully distilled and written to long-term memory.
    Processed,
    /// The run failed on this candidate; may be retried up to the bound.
    Failed,
}

/// Tracks one short-term memory's progress through the consolidation
/// pipeline across retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateState {
    pub memory_id: Uuid,
    pub status: CandidateStatus,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl CandidateState {
    pub fn pending(memory_id: Uuid, at: DateTime<Utc>) -> Self {
        Self {
            memory_id,
            status: CandidateStatus::Pending,
            retry_count: 0,
            last_error: None,
            updated_at: at,
        }
    }

    /// Whether this candidate may still be retried given `max_retries`.
    pub fn can_retry(&self, max_retries: u32) -> bool {
        self.status == CandidateStatus::Failed && self.retry_count < max_retries
    }

    pub fn record_failure(&mut self, reason: impl Into<String>, at: DateTime<Utc>) {
        self.status = CandidateStatus::Failed;
        self.retry_count += 1;
        self.last_error = Some(reason.into());
        self.updated_at = at;
    }

    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.status = CandidateStatus::Processed;
        self.last_error = None;
        self.updated_at = at;
    }
}
