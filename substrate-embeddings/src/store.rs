//! Embedding storage (C4): persists vectors keyed by `(memory_id, provider,
//! model)`. The repository never embeds on write — this is an explicit step
//! driven by the consolidation pipeline or the reindex job below.

use std::sync::Arc;

use substrate_core::errors::{RepositoryError, SearchError};
use substrate_core::memory::MemoryRecord;
use substrate_core::traits::EmbeddingProvider;
use substrate_storage::StorageEngine;

/// Thin wrapper over [`StorageEngine`]'s embedding primitives, scoped to one
/// `(provider_id, model_id)` generation per call.
pub struct EmbeddingStore {
    storage: Arc<StorageEngine>,
}

impl EmbeddingStore {
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    pub fn store(
        &self,
        memory_id: &str,
        provider_id: &str,
        model_id: &str,
        version: u32,
        vector: &[f32],
    ) -> Result<(), RepositoryError> {
        self.storage.store_embedding(memory_id, provider_id, model_id, version, vector)
    }

    pub fn fetch(
        &self,
        memory_id: &str,
        provider_id: &str,
        model_id: &str,
    ) -> Result<Option<Vec<f32>>, RepositoryError> {
        self.storage.get_embedding(memory_id, provider_id, model_id)
    }

    /// Embed `text` through `provider` and persist the result for `memory_id`.
    /// Dimension is whatever the provider reports; a mismatch against an
    /// existing row under the same key is an upsert, not an error, since
    /// `(memory_id, provider_id, model_id)` is the storage key.
    pub async fn embed_and_store(
        &self,
        provider: &dyn EmbeddingProvider,
        memory_id: &str,
        text: &str,
    ) -> Result<(), RepositoryError> {
        let vector = provider
            .embed(text)
            .await
            .map_err(|e| RepositoryError::DbError { reason: e.to_string() })?;
        self.store(memory_id, provider.provider_id(), provider.model_id(), provider.version(), &vector)
    }

    /// Search stored vectors for `provider_id`/`model_id`, returning memories
    /// ranked by cosine similarity descending.
    pub fn search(
        &self,
        provider_id: &str,
        model_id: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<(MemoryRecord, f64)>, SearchError> {
        self.storage.search_vector(provider_id, model_id, query_embedding, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use substrate_core::errors::EmbeddingError;

    struct ConstantProvider;

    #[async_trait]
    impl EmbeddingProvider for ConstantProvider {
        fn provider_id(&self) -> &str {
            "constant"
        }
        fn model_id(&self) -> &str {
            "v1"
        }
        fn dimensions(&self) -> usize {
            3
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![1.0, 0.0, 0.0])
        }
    }

    #[tokio::test]
    async fn embed_and_store_then_fetch_round_trips() {
        let storage = Arc::new(StorageEngine::open_in_memory().unwrap());
        let store = EmbeddingStore::new(storage);
        let provider = ConstantProvider;

        store.embed_and_store(&provider, "mem-1", "hello").await.unwrap();

        let fetched = store.fetch("mem-1", "constant", "v1").unwrap().unwrap();
        assert_eq!(fetched, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn fetch_missing_returns_none() {
        let storage = Arc::new(StorageEngine::open_in_memory().unwrap());
        let store = EmbeddingStore::new(storage);
        assert!(store.fetch("missing", "constant", "v1").unwrap().is_none());
    }
}
