use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a [`crate::errors::MemoryError`].
///
/// `Fatal` means the operation left no observable mutation and the engine
/// may continue serving other requests. `Recoverable` means the caller may
/// retry, typically after a backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Fatal,
    Recoverable,
}

/// The full typed error code taxonomy. Every [`crate::errors::MemoryError`]
/// reports exactly one of these — the code is the contract external
/// collaborators match on, not the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    MemoryRepositoryInvalidInput,
    MemoryRepositoryDbError,
    MemoryRepositoryIoError,
    MemoryRepositoryNotFound,
    MemoryRepositorySerializationError,
    MemoryRepositoryReconciliationError,
    MemorySearchFailed,
    MemoryEmbeddingFailed,
    MemoryConsolidationFailed,
    MemoryDistillationFailed,
    MemoryReindexFailed,
    EmbeddingReindexValidationFailed,
    MemoryProviderUnavailable,
    MemoryMergeConflict,
    MemoryNotReady,
    MemoryQuotaExceeded,
    VectorRetrieverDimensionMismatch,
    VectorRetrieverEmbeddingFailed,
    MemoryAlreadyRunning,
}

impl ErrorCode {
    /// Severity implied by this code, per the error taxonomy table.
    pub const fn severity(self) -> Severity {
        use ErrorCode::*;
        match self {
            MemoryRepositoryInvalidInput
            | MemoryRepositoryDbError
            | MemoryRepositoryIoError
            | MemoryRepositoryNotFound
            | MemoryRepositorySerializationError
            | MemoryConsolidationFailed
            | MemoryMergeConflict
            | VectorRetrieverDimensionMismatch => Severity::Fatal,
            MemoryRepositoryReconciliationError
            | MemorySearchFailed
            | MemoryEmbeddingFailed
            | MemoryDistillationFailed
            | MemoryReindexFailed
            | EmbeddingReindexValidationFailed
            | MemoryProviderUnavailable
            | MemoryNotReady
            | MemoryQuotaExceeded
            | VectorRetrieverEmbeddingFailed
            | MemoryAlreadyRunning => Severity::Recoverable,
        }
    }

    /// The stable SCREAMING_SNAKE_CASE wire form, as it appears in spec and logs.
    pub const fn as_str(self) -> &'static str {
        use ErrorCode::*;
        match self {
            MemoryRepositoryInvalidInput => "MEMORY_REPOSITORY_INVALID_INPUT",
            MemoryRepositoryDbError => "MEMORY_REPOSITORY_DB_ERROR",
            MemoryRepositoryIoError => "MEMORY_REPOSITORY_IO_ERROR",
            MemoryRepositoryNotFound => "MEMORY_REPOSITORY_NOT_FOUND",
            MemoryRepositorySerializationError => "MEMORY_REPOSITORY_SERIALIZATION_ERROR",
            MemoryRepositoryReconciliationError => "MEMORY_REPOSITORY_RECONCILIATION_ERROR",
            MemorySearchFailed => "MEMORY_SEARCH_FAILED",
            MemoryEmbeddingFailed => "MEMORY_EMBEDDING_FAILED",
            MemoryConsolidationFailed => "MEMORY_CONSOLIDATION_FAILED",
            MemoryDistillationFailed => "MEMORY_DISTILLATION_FAILED",
            MemoryReindexFailed => "MEMORY_REINDEX_FAILED",
            EmbeddingReindexValidationFailed => "EMBEDDING_REINDEX_VALIDATION_FAILED",
            MemoryProviderUnavailable => "MEMORY_PROVIDER_UNAVAILABLE",
            MemoryMergeConflict => "MEMORY_MERGE_CONFLICT",
            MemoryNotReady => "MEMORY_NOT_READY",
            MemoryQuotaExceeded => "MEMORY_QUOTA_EXCEEDED",
            VectorRetrieverDimensionMismatch => "VECTOR_RETRIEVER_DIMENSION_MISMATCH",
            VectorRetrieverEmbeddingFailed => "VECTOR_RETRIEVER_EMBEDDING_FAILED",
            MemoryAlreadyRunning => "MEMORY_ALREADY_RUNNING",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
