use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReindexPhase {
    Scanning,
    Embedding,
    Validating,
    Done,
    Failed,
    Cancelled,
}

/// State of one in-flight or completed reindex, scoped to a single
/// `(provider_id, model_id)` pair — only one such job may run at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReindexJob {
    pub job_id: Uuid,
    pub provider_id: String,
    pub model_id: String,
    pub phase: ReindexPhase,
    pub processed: usize,
    pub total_records: usize,
    pub failed_record_ids: Vec<Uuid>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// A point-in-time progress notification emitted while a reindex runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReindexProgress {
    pub phase: ReindexPhase,
    pub processed: usize,
    pub total_records: usize,
}
