use thiserror::Error;

/// Failures from the memory repository's dual-write and reconciliation paths.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("database error: {reason}")]
    DbError { reason: String },

    #[error("io error writing {path}: {reason}")]
    IoError { path: String, reason: String },

    #[error("memory not found: {id}")]
    NotFound { id: String },

    #[error("serialization error: {reason}")]
    SerializationError { reason: String },

    #[error("reconciliation found {drift_count} drifted record(s)")]
    ReconciliationError { drift_count: usize },
}

impl From<String> for RepositoryError {
    fn from(reason: String) -> Self {
        RepositoryError::DbError { reason }
    }
}
