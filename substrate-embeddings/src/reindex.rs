//! Provider-switch reindex (C4 §4.4): replace every vector produced by
//! `(old_provider, old_model)` with one from a new provider, batch by batch,
//! tolerating per-record failures, with an optional post-hoc validation pass.

use std::sync::Arc;

use chrono::Utc;
use substrate_core::config::ReindexConfig;
use substrate_core::errors::EmbeddingError;
use substrate_core::models::{ReindexJob, ReindexPhase, ReindexProgress};
use substrate_core::traits::{CancelToken, Clock, EmbeddingProvider, SystemClock};
use substrate_storage::StorageEngine;
use uuid::Uuid;

/// Runs one reindex: streams records currently embedded under
/// `(old_provider_id, old_model_id)`, re-embeds them with `new_provider`, and
/// (optionally) spot-checks the result.
///
/// Only one reindex per `(provider, model)` pair should run at a time; the
/// caller (the service façade) is responsible for that single-flight guard.
pub struct ReindexRunner {
    storage: Arc<StorageEngine>,
    config: ReindexConfig,
    clock: Arc<dyn Clock>,
}

impl ReindexRunner {
    pub fn new(storage: Arc<StorageEngine>, config: ReindexConfig) -> Self {
        Self::with_clock(storage, config, Arc::new(SystemClock))
    }

    pub fn with_clock(storage: Arc<StorageEngine>, config: ReindexConfig, clock: Arc<dyn Clock>) -> Self {
        Self { storage, config, clock }
    }

    /// Runs the reindex to completion. `on_progress` is invoked after every
    /// batch during the embedding phase and once after the validation
    /// sample. Returns the failed job on validation failure rather than
    /// propagating partial writes: rows already replaced stay replaced,
    /// so a rerun is idempotent.
    pub async fn run(
        &self,
        old_provider_id: &str,
        old_model_id: &str,
        new_provider: &dyn EmbeddingProvider,
        validate_after: bool,
        cancel: &CancelToken,
        mut on_progress: impl FnMut(ReindexProgress),
    ) -> Result<ReindexJob, EmbeddingError> {
        let job_id = Uuid::new_v4();
        let started_at = self.clock.now();

        let records = self
            .storage
            .list_embedded(old_provider_id, old_model_id)
            .map_err(|e| EmbeddingError::ReindexFailed { reason: e.to_string() })?;
        let total_records = records.len();

        on_progress(ReindexProgress {
            phase: ReindexPhase::Scanning,
            processed: 0,
            total_records,
        });

        let mut processed = 0usize;
        let mut failed_record_ids = Vec::new();
        let mut reindexed: Vec<(String, String)> = Vec::with_capacity(total_records);

        for batch in records.chunks(self.config.batch_size.max(1)) {
            for (memory_id, content) in batch {
                match new_provider.embed(content).await {
                    Ok(vector) => {
                        if let Err(e) = self.storage.replace_embedding(
                            memory_id,
                            old_provider_id,
                            old_model_id,
                            new_provider.provider_id(),
                            new_provider.model_id(),
                            new_provider.version(),
                            &vector,
                        ) {
                            tracing::warn!(memory_id = %memory_id, error = %e, "reindex write failed");
                            push_failed_id(&mut failed_record_ids, memory_id);
                        } else {
                            reindexed.push((memory_id.clone(), content.clone()));
                        }
                    }
                    Err(e) => {
                        tracing::warn!(memory_id = %memory_id, error = %e, "reindex embed failed");
                        push_failed_id(&mut failed_record_ids, memory_id);
                    }
                }
                processed += 1;
            }
            on_progress(ReindexProgress {
                phase: ReindexPhase::Embedding,
                processed,
                total_records,
            });

            if cancel.is_cancelled() {
                return Ok(ReindexJob {
                    job_id,
                    provider_id: new_provider.provider_id().to_string(),
                    model_id: new_provider.model_id().to_string(),
                    phase: ReindexPhase::Cancelled,
                    processed,
                    total_records,
                    failed_record_ids,
                    started_at,
                    finished_at: Some(Utc::now()),
                });
            }
        }

        if validate_after && !reindexed.is_empty() {
            let sample_size =
                ((reindexed.len() as f64) * self.config.validation_sample_rate).ceil() as usize;
            let sample_size = sample_size.clamp(0, reindexed.len());
            let sample = &reindexed[..sample_size];

            let mut checked = 0usize;
            let mut failed = 0usize;
            for (memory_id, content) in sample {
                checked += 1;
                let stored = self
                    .storage
                    .get_embedding(memory_id, new_provider.provider_id(), new_provider.model_id())
                    .map_err(|e| EmbeddingError::ReindexFailed { reason: e.to_string() })?;
                let Some(stored) = stored else {
                    failed += 1;
                    continue;
                };
                let fresh = match new_provider.embed(content).await {
                    Ok(v) => v,
                    Err(_) => {
                        failed += 1;
                        continue;
                    }
                };
                if cosine_similarity(&stored, &fresh) < self.config.min_validation_similarity {
                    failed += 1;
                }
                on_progress(ReindexProgress {
                    phase: ReindexPhase::Validating,
                    processed: checked,
                    total_records: sample.len(),
                });
            }

            if failed > 0 {
                return Err(EmbeddingError::ReindexValidationFailed { checked, failed });
            }
        }

        Ok(ReindexJob {
            job_id,
            provider_id: new_provider.provider_id().to_string(),
            model_id: new_provider.model_id().to_string(),
            phase: ReindexPhase::Done,
            processed,
            total_records,
            failed_record_ids,
            started_at,
            finished_at: Some(Utc::now()),
        })
    }
}

fn push_failed_id(out: &mut Vec<Uuid>, memory_id: &str) {
    if let Ok(id) = memory_id.parse() {
        out.push(id);
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProvider {
        provider_id: &'static str,
        model_id: &'static str,
        dims: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for FixedProvider {
        fn provider_id(&self) -> &str {
            self.provider_id
        }
        fn model_id(&self) -> &str {
            self.model_id
        }
        fn dimensions(&self) -> usize {
            self.dims
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let seed = text.len() as f32;
            Ok(vec![seed, 1.0, 0.0])
        }
    }

    fn seed_old_embedding(storage: &StorageEngine, memory: &substrate_core::memory::MemoryRecord) {
        storage.insert_memory(memory).unwrap();
        storage
            .store_embedding(&memory.id.to_string(), "old", "v0", 1, &[0.1, 0.1, 0.1])
            .unwrap();
    }

    fn sample_memory(content: &str) -> substrate_core::memory::MemoryRecord {
        use substrate_core::memory::{Confidence, Importance, Layer, MemoryType, Provenance};
        let now = Utc::now();
        substrate_core::memory::MemoryRecord {
            id: Uuid::new_v4(),
            content: content.to_string(),
            memory_type: MemoryType::Fact,
            layer: Layer::Ltm,
            importance: Importance::new(0.5),
            confidence: Confidence::new(0.5),
            tags: Default::default(),
            entities: Default::default(),
            provenance: Provenance::explicit("conv-1"),
            supersedes: None,
            superseded_by: None,
            created_at: now,
            updated_at: now,
            accessed_at: now,
            access_count: 0,
            checksum: "deadbeef".to_string(),
        }
    }

    #[tokio::test]
    async fn reindex_replaces_old_generation_with_new() {
        let storage = Arc::new(StorageEngine::open_in_memory().unwrap());
        let memory = sample_memory("hello world");
        seed_old_embedding(&storage, &memory);

        let runner = ReindexRunner::new(storage.clone(), ReindexConfig::default());
        let provider = FixedProvider {
            provider_id: "new",
            model_id: "v1",
            dims: 3,
            calls: AtomicUsize::new(0),
        };

        let job = runner
            .run("old", "v0", &provider, false, &CancelToken::new(), |_| {})
            .await
            .unwrap();

        assert_eq!(job.processed, 1);
        assert!(job.failed_record_ids.is_empty());
        assert!(storage
            .get_embedding(&memory.id.to_string(), "old", "v0")
            .unwrap()
            .is_none());
        assert!(storage
            .get_embedding(&memory.id.to_string(), "new", "v1")
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn reindex_with_no_records_is_a_no_op() {
        let storage = Arc::new(StorageEngine::open_in_memory().unwrap());
        let runner = ReindexRunner::new(storage, ReindexConfig::default());
        let provider = FixedProvider {
            provider_id: "new",
            model_id: "v1",
            dims: 3,
            calls: AtomicUsize::new(0),
        };

        let job = runner.run("old", "v0", &provider, true, &CancelToken::new(), |_| {}).await.unwrap();
        assert_eq!(job.total_records, 0);
        assert_eq!(job.processed, 0);
    }

    #[tokio::test]
    async fn validation_passes_when_reembedding_matches_stored_vector() {
        let storage = Arc::new(StorageEngine::open_in_memory().unwrap());
        let memory = sample_memory("stable text");
        seed_old_embedding(&storage, &memory);

        let mut config = ReindexConfig::default();
        config.validation_sample_rate = 1.0;
        let runner = ReindexRunner::new(storage, config);
        let provider = FixedProvider {
            provider_id: "new",
            model_id: "v1",
            dims: 3,
            calls: AtomicUsize::new(0),
        };

        let job = runner.run("old", "v0", &provider, true, &CancelToken::new(), |_| {}).await.unwrap();
        assert_eq!(job.phase, ReindexPhase::Done);
    }

    #[tokio::test]
    async fn cancelling_mid_run_returns_partial_progress() {
        let storage = Arc::new(StorageEngine::open_in_memory().unwrap());
        for i in 0..4 {
            let memory = sample_memory(&format!("doc {i}"));
            seed_old_embedding(&storage, &memory);
        }

        let mut config = ReindexConfig::default();
        config.batch_size = 1;
        let runner = ReindexRunner::new(storage, config);
        let provider = FixedProvider {
            provider_id: "new",
            model_id: "v1",
            dims: 3,
            calls: AtomicUsize::new(0),
        };

        let cancel = CancelToken::new();
        let mut seen = 0;
        let job = runner
            .run("old", "v0", &provider, false, &cancel, |progress| {
                seen += 1;
                if seen == 1 {
                    cancel.cancel();
                }
            })
            .await
            .unwrap();

        assert_eq!(job.phase, ReindexPhase::Cancelled);
        assert!(job.processed < job.total_records);
    }
}
