use thiserror::Error;

/// Failures surfaced at the memory service façade.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("memory service is not ready: {reason}")]
    NotReady { reason: String },

    #[error("quota exceeded: {resource} at {current}/{limit}")]
    QuotaExceeded {
        resource: String,
        current: u64,
        limit: u64,
    },
}
