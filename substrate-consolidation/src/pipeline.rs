//! Orchestrates Select -> (optional cluster) -> Distill -> Merge -> Write
//! (C9 §4.9) with a single-flight guard, retry bookkeeping, and cooperative
//! cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use substrate_core::config::ConsolidationConfig;
use substrate_core::errors::ConsolidationError;
use substrate_core::models::CandidateState;
use substrate_core::traits::{CancelToken, Clock, DistillationProvider, EmbeddingProvider, SystemClock};
use substrate_repository::MemoryRepository;
use substrate_retrieval::HybridSearch;
use substrate_storage::StorageEngine;

use crate::clustering::build_clusters;
use crate::distillation::distill_cluster;
use crate::merge::{merge_draft, MergeOutcome};
use crate::selection::select_candidates;
use crate::token_budget::TokenBudgeter;

/// Result of one consolidation run (C9 invariants): every selected
/// candidate ends the run `processed` or `failed`; `facts_distilled` is the
/// sum of successful drafts; `errors` is non-empty iff at least one
/// candidate failed.
#[derive(Debug, Clone, Default)]
pub struct ConsolidationReport {
    pub candidates_selected: usize,
    pub candidates_processed: usize,
    pub candidates_failed: usize,
    pub facts_distilled: usize,
    pub ltm_created: usize,
    pub ltm_reinforced: usize,
    pub errors: Vec<String>,
    pub cancelled: bool,
}

/// Similarity threshold above which a draft is treated as a near-duplicate
/// of an existing LTM record and reinforced rather than inserted fresh.
const DUPLICATE_THRESHOLD: f64 = 0.85;

pub struct ConsolidationRunner {
    storage: Arc<StorageEngine>,
    repository: Arc<MemoryRepository>,
    hybrid: Arc<HybridSearch>,
    distillation_provider: Arc<dyn DistillationProvider>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    config: ConsolidationConfig,
    clock: Arc<dyn Clock>,
    running: AtomicBool,
}

impl ConsolidationRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<StorageEngine>,
        repository: Arc<MemoryRepository>,
        hybrid: Arc<HybridSearch>,
        distillation_provider: Arc<dyn DistillationProvider>,
        embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
        config: ConsolidationConfig,
    ) -> Self {
        Self {
            storage,
            repository,
            hybrid,
            distillation_provider,
            embedding_provider,
            config,
            clock: Arc::new(SystemClock),
            running: AtomicBool::new(false),
        }
    }

    /// Runs one consolidation pass. Rejects overlapping runs with
    /// [`ConsolidationError::AlreadyRunning`] rather than queueing or
    /// coalescing them (the concurrency-bound open question in C9's design
    /// notes): a second caller should retry after this one completes.
    pub async fn run(&self, cancel: &CancelToken) -> Result<ConsolidationReport, ConsolidationError> {
        if self.running.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return Err(ConsolidationError::AlreadyRunning);
        }
        let result = self.run_inner(cancel).await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn run_inner(&self, cancel: &CancelToken) -> Result<ConsolidationReport, ConsolidationError> {
        let now = self.clock.now();
        let budgeter = TokenBudgeter::new();

        let selected = select_candidates(&self.storage, &self.repository, &self.config, now)?;
        let mut report = ConsolidationReport {
            candidates_selected: selected.len(),
            ..Default::default()
        };

        if selected.is_empty() {
            return Ok(report);
        }

        let candidate_memories = selected.iter().map(|c| c.memory.clone()).collect();
        let embedder = self.embedding_provider.as_deref();
        let clusters = build_clusters(candidate_memories, embedder, self.config.enable_pre_clustering).await;

        for cluster in clusters {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let source_ids: Vec<Uuid> = cluster.memories.iter().map(|m| m.id).collect();
            match self.process_cluster(&budgeter, &cluster, &source_ids, now).await {
                Ok(outcome) => {
                    report.facts_distilled += outcome.drafts;
                    report.ltm_created += outcome.created;
                    report.ltm_reinforced += outcome.reinforced;
                    report.candidates_processed += source_ids.len();
                }
                Err(reason) => {
                    report.candidates_failed += source_ids.len();
                    report.errors.push(reason.clone());
                    self.mark_failed(&source_ids, &reason, now)?;
                }
            }
        }

        Ok(report)
    }

    async fn process_cluster(
        &self,
        budgeter: &TokenBudgeter,
        cluster: &crate::clustering::ClusterGroup,
        source_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> Result<ClusterOutcome, String> {
        let drafts = distill_cluster(self.distillation_provider.as_ref(), budgeter, cluster, self.config.max_output_tokens)
            .await
            .map_err(|e| e.to_string())?;

        let mut outcome = ClusterOutcome {
            drafts: drafts.len(),
            created: 0,
            reinforced: 0,
        };

        for draft in &drafts {
            let merged = merge_draft(&self.repository, &self.hybrid, draft, source_ids, DUPLICATE_THRESHOLD)
                .await
                .map_err(|e| e.to_string())?;
            match merged {
                MergeOutcome::Created(_) => outcome.created += 1,
                MergeOutcome::Reinforced(_) => outcome.reinforced += 1,
            }
        }

        for memory_id in source_ids {
            let mut state = self
                .storage
                .get_candidate(&memory_id.to_string())
                .map_err(|e| e.to_string())?
                .unwrap_or_else(|| CandidateState::pending(*memory_id, now));
            state.record_success(now);
            self.storage.upsert_candidate(&state).map_err(|e| e.to_string())?;
        }

        Ok(outcome)
    }

    fn mark_failed(&self, source_ids: &[Uuid], reason: &str, now: DateTime<Utc>) -> Result<(), ConsolidationError> {
        for memory_id in source_ids {
            let mut state = self
                .storage
                .get_candidate(&memory_id.to_string())
                .map_err(|e| ConsolidationError::ConsolidationFailed { reason: e.to_string() })?
                .unwrap_or_else(|| CandidateState::pending(*memory_id, now));
            state.record_failure(reason, now);
            self.storage
                .upsert_candidate(&state)
                .map_err(|e| ConsolidationError::ConsolidationFailed { reason: e.to_string() })?;
        }
        Ok(())
    }
}

struct ClusterOutcome {
    drafts: usize,
    created: usize,
    reinforced: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use substrate_core::config::HybridSearchConfig;
    use substrate_core::errors::EmbeddingError;
    use substrate_core::memory::{Layer, MemoryType, Provenance};
    use substrate_core::models::CandidateStatus;
    use substrate_core::traits::{DistillationOutcome, DistillationRequest};
    use substrate_repository::CreateMemoryInput;
    use tempfile::TempDir;

    struct EchoEmbedder;
    #[async_trait]
    impl EmbeddingProvider for EchoEmbedder {
        fn provider_id(&self) -> &str {
            "echo"
        }
        fn model_id(&self) -> &str {
            "v1"
        }
        fn dimensions(&self) -> usize {
            2
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if text.contains("dark") {
                Ok(vec![1.0, 0.0])
            } else {
                Ok(vec![0.0, 1.0])
            }
        }
    }

    struct EchoDistiller;
    #[async_trait]
    impl DistillationProvider for EchoDistiller {
        fn provider_id(&self) -> &str {
            "echo-distiller"
        }
        async fn distill(&self, request: DistillationRequest) -> Result<Vec<DistillationOutcome>, ConsolidationError> {
            Ok(vec![DistillationOutcome {
                content: request.contents.join(" / "),
                confidence: 0.75,
            }])
        }
    }

    struct MalformedDistiller;
    #[async_trait]
    impl DistillationProvider for MalformedDistiller {
        fn provider_id(&self) -> &str {
            "malformed"
        }
        async fn distill(&self, _request: DistillationRequest) -> Result<Vec<DistillationOutcome>, ConsolidationError> {
            Err(ConsolidationError::DistillationFailed {
                reason: "not-json".to_string(),
            })
        }
    }

    fn setup() -> (Arc<StorageEngine>, Arc<MemoryRepository>, Arc<HybridSearch>, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(StorageEngine::open_in_memory().unwrap());
        let repository = Arc::new(MemoryRepository::new(storage.clone(), dir.path().join("memories")).unwrap());
        let hybrid = Arc::new(HybridSearch::new(storage.clone(), Arc::new(EchoEmbedder), HybridSearchConfig::default()));
        (storage, repository, hybrid, dir)
    }

    fn old_stm_input(content: &str) -> CreateMemoryInput {
        CreateMemoryInput::new(content, MemoryType::Observation, Layer::Stm, Provenance::implicit("conv-1"))
    }

    #[tokio::test]
    async fn successful_run_distills_and_marks_candidates_processed() {
        let (storage, repository, hybrid, _dir) = setup();
        let memory = repository.create(old_stm_input("the user always works late on fridays")).unwrap();

        let mut config = ConsolidationConfig::default();
        config.min_candidate_age_ms = 0;
        config.enable_pre_clustering = false;
        let runner = ConsolidationRunner::new(
            storage.clone(),
            repository.clone(),
            hybrid,
            Arc::new(EchoDistiller),
            Some(Arc::new(EchoEmbedder)),
            config,
        );

        let report = runner.run(&CancelToken::new()).await.unwrap();
        assert_eq!(report.candidates_selected, 1);
        assert_eq!(report.candidates_processed, 1);
        assert_eq!(report.candidates_failed, 0);
        assert_eq!(report.facts_distilled, 1);
        assert!(report.errors.is_empty());

        let final_state = storage.get_candidate(&memory.id.to_string()).unwrap().unwrap();
        assert_eq!(final_state.status, CandidateStatus::Processed);
    }

    #[tokio::test]
    async fn malformed_distillation_marks_candidate_failed_with_error() {
        let (storage, repository, hybrid, _dir) = setup();
        let memory = repository.create(old_stm_input("some transient note")).unwrap();

        let mut config = ConsolidationConfig::default();
        config.min_candidate_age_ms = 0;
        let runner = ConsolidationRunner::new(storage.clone(), repository.clone(), hybrid, Arc::new(MalformedDistiller), None, config);

        let report = runner.run(&CancelToken::new()).await.unwrap();
        assert_eq!(report.facts_distilled, 0);
        assert_eq!(report.candidates_failed, 1);
        assert!(!report.errors.is_empty());

        let final_state = storage.get_candidate(&memory.id.to_string()).unwrap().unwrap();
        assert_eq!(final_state.status, CandidateStatus::Failed);
        assert_eq!(final_state.retry_count, 1);
    }

    #[tokio::test]
    async fn rerun_on_already_processed_candidates_does_not_duplicate_ltm() {
        let (storage, repository, hybrid, _dir) = setup();
        repository.create(old_stm_input("stable repeated fact about the team")).unwrap();

        let mut config = ConsolidationConfig::default();
        config.min_candidate_age_ms = 0;
        let runner = ConsolidationRunner::new(
            storage.clone(),
            repository.clone(),
            hybrid,
            Arc::new(EchoDistiller),
            None,
            config,
        );

        let first = runner.run(&CancelToken::new()).await.unwrap();
        assert_eq!(first.candidates_processed, 1);

        let second = runner.run(&CancelToken::new()).await.unwrap();
        assert_eq!(second.candidates_selected, 0);
        assert_eq!(second.facts_distilled, 0);
    }

    #[tokio::test]
    async fn overlapping_runs_are_rejected() {
        let (storage, repository, hybrid, _dir) = setup();
        let runner = Arc::new(ConsolidationRunner::new(
            storage,
            repository,
            hybrid,
            Arc::new(EchoDistiller),
            None,
            ConsolidationConfig::default(),
        ));

        runner.running.store(true, Ordering::SeqCst);
        let err = runner.run(&CancelToken::new()).await.unwrap_err();
        assert!(matches!(err, ConsolidationError::AlreadyRunning));
    }
}
