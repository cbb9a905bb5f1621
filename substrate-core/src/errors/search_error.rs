use thiserror::Error;

/// Failures from BM25, vector, and hybrid retrieval.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search failed: {reason}")]
    SearchFailed { reason: String },

    #[error("query embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("failed to embed query: {reason}")]
    EmbeddingFailed { reason: String },
}

impl From<String> for SearchError {
    fn from(reason: String) -> Self {
        SearchError::SearchFailed { reason }
    }
}
