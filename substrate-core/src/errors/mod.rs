pub mod code;
pub mod consolidation_error;
pub mod embedding_error;
pub mod repository_error;
pub mod search_error;
pub mod service_error;

pub use code::{ErrorCode, Severity};
pub use consolidation_error::ConsolidationError;
pub use embedding_error::EmbeddingError;
pub use repository_error::RepositoryError;
pub use search_error::SearchError;
pub use service_error::ServiceError;

use thiserror::Error;

/// The top-level error type returned by every substrate crate. Wraps one of
/// the per-domain error enums and always resolves to exactly one
/// [`ErrorCode`].
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Consolidation(#[from] ConsolidationError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl MemoryError {
    pub fn code(&self) -> ErrorCode {
        use ErrorCode::*;
        match self {
            MemoryError::Repository(e) => match e {
                RepositoryError::InvalidInput { .. } => MemoryRepositoryInvalidInput,
                RepositoryError::DbError { .. } => MemoryRepositoryDbError,
                RepositoryError::IoError { .. } => MemoryRepositoryIoError,
                RepositoryError::NotFound { .. } => MemoryRepositoryNotFound,
                RepositoryError::SerializationError { .. } => MemoryRepositorySerializationError,
                RepositoryError::ReconciliationError { .. } => {
                    MemoryRepositoryReconciliationError
                }
            },
            MemoryError::Search(e) => match e {
                SearchError::SearchFailed { .. } => MemorySearchFailed,
                SearchError::DimensionMismatch { .. } => VectorRetrieverDimensionMismatch,
                SearchError::EmbeddingFailed { .. } => VectorRetrieverEmbeddingFailed,
            },
            MemoryError::Embedding(e) => match e {
                EmbeddingError::EmbeddingFailed { .. } => MemoryEmbeddingFailed,
                EmbeddingError::ReindexFailed { .. } => MemoryReindexFailed,
                EmbeddingError::ReindexValidationFailed { .. } => {
                    EmbeddingReindexValidationFailed
                }
                EmbeddingError::ProviderUnavailable { .. } => MemoryProviderUnavailable,
            },
            MemoryError::Consolidation(e) => match e {
                ConsolidationError::ConsolidationFailed { .. } => MemoryConsolidationFailed,
                ConsolidationError::DistillationFailed { .. } => MemoryDistillationFailed,
                ConsolidationError::MergeConflict { .. } => MemoryMergeConflict,
                ConsolidationError::AlreadyRunning => MemoryAlreadyRunning,
            },
            MemoryError::Service(e) => match e {
                ServiceError::NotReady { .. } => MemoryNotReady,
                ServiceError::QuotaExceeded { .. } => MemoryQuotaExceeded,
            },
        }
    }

    pub fn severity(&self) -> Severity {
        self.code().severity()
    }
}

pub type MemoryResult<T> = Result<T, MemoryError>;
