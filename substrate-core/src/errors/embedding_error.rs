use thiserror::Error;

/// Failures from embedding generation, storage, and reindexing.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding failed: {reason}")]
    EmbeddingFailed { reason: String },

    #[error("reindex failed: {reason}")]
    ReindexFailed { reason: String },

    #[error("reindex validation failed: {checked} sampled, {failed} below similarity floor")]
    ReindexValidationFailed { checked: usize, failed: usize },

    #[error("embedding provider {provider} unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },
}
