//! Vector Retriever (C7): embeds the query through the configured provider
//! and ranks stored vectors by cosine similarity within one
//! `(provider, model)` generation.

use std::sync::Arc;

use substrate_core::errors::SearchError;
use substrate_core::memory::{Layer, MemoryRecord, MemoryType};
use substrate_core::traits::EmbeddingProvider;
use substrate_storage::StorageEngine;

/// Filters and limit shared by a single vector search call.
#[derive(Debug, Clone, Default)]
pub struct VectorSearchOptions {
    pub memory_type: Option<MemoryType>,
    pub layer: Option<Layer>,
    /// Overrides the configured `(provider_id, model_id)` pair the vectors
    /// are scanned under. `None` uses the retriever's own provider.
    pub provider_filter: Option<(String, String)>,
    pub limit: usize,
    pub min_similarity: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct VectorResult {
    pub memory: MemoryRecord,
    pub similarity: f64,
}

pub struct VectorRetriever {
    storage: Arc<StorageEngine>,
    provider: Arc<dyn EmbeddingProvider>,
}

impl VectorRetriever {
    pub fn new(storage: Arc<StorageEngine>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { storage, provider }
    }

    pub async fn search(
        &self,
        query: &str,
        options: &VectorSearchOptions,
    ) -> Result<Vec<VectorResult>, SearchError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(min) = options.min_similarity {
            if !(0.0..=1.0).contains(&min) {
                return Err(SearchError::SearchFailed {
                    reason: "minSimilarity must be in [0, 1]".to_string(),
                });
            }
        }
        let limit = if options.limit == 0 { 20 } else { options.limit };

        let embedding = self
            .provider
            .embed(trimmed)
            .await
            .map_err(|e| SearchError::EmbeddingFailed { reason: e.to_string() })?;

        let (provider_id, model_id) = options
            .provider_filter
            .clone()
            .unwrap_or_else(|| (self.provider.provider_id().to_string(), self.provider.model_id().to_string()));

        // Over-fetch before applying type/layer predicates, which the
        // storage layer's vector scan doesn't push down (it's a brute-force
        // scan keyed only on provider/model).
        let candidate_limit = limit.saturating_mul(4).max(limit);
        let hits = self
            .storage
            .search_vector(&provider_id, &model_id, &embedding, candidate_limit)?;

        let mut results: Vec<VectorResult> = hits
            .into_iter()
            .filter(|(memory, _)| {
                options.memory_type.map_or(true, |t| memory.memory_type == t)
                    && options.layer.map_or(true, |l| memory.layer == l)
            })
            .map(|(memory, similarity)| VectorResult { memory, similarity })
            .collect();

        if let Some(min) = options.min_similarity {
            results.retain(|r| r.similarity >= min);
        }
        results.truncate(limit);
        Ok(results)
    }
}
