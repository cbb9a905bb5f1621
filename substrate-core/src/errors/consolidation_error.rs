use thiserror::Error;

/// Failures from the STM to LTM consolidation pipeline.
#[derive(Debug, Error)]
pub enum ConsolidationError {
    #[error("consolidation failed: {reason}")]
    ConsolidationFailed { reason: String },

    #[error("distillation failed: {reason}")]
    DistillationFailed { reason: String },

    #[error("merge conflict on candidate {candidate_id}: {reason}")]
    MergeConflict { candidate_id: String, reason: String },

    #[error("a consolidation run is already in progress")]
    AlreadyRunning,
}
