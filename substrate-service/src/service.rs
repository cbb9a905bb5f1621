use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use substrate_consolidation::ConsolidationRunner;
use substrate_core::config::ServiceConfig;
use substrate_core::errors::{MemoryError, MemoryResult, RepositoryError, ServiceError};
use substrate_core::memory::{Layer, MemoryRecord, MemoryType};
use substrate_core::models::{HealthReport, ReindexJob};
use substrate_core::traits::{CancelToken, Clock, DistillationProvider, EmbeddingProvider, SystemClock};
use substrate_embeddings::{EmbeddingStore, ReindexRunner};
use substrate_ingest::{IngestError, IngestReport, Ingestor};
use substrate_patterns::{DetectedPattern, PatternDetector, PatternError};
use substrate_repository::{CreateMemoryInput, ListQuery, MemoryRepository, ReconciliationReport, UpdateMemoryInput};
use substrate_retrieval::{HybridResult, HybridSearch, HybridSearchFilter};
use substrate_storage::StorageEngine;

use crate::options::RememberOptions;
use crate::readiness::Readiness;

/// Memories pulled per page when rehydrating embeddings at `initialize()`
/// time. Mirrors the bulk-pull-then-filter approach used elsewhere for
/// operations without a dedicated streaming cursor.
const REHYDRATE_PAGE_SIZE: usize = 10_000;

/// Public façade (C11): the one type external collaborators construct and
/// call. Every data operation below requires a prior, successful
/// [`MemoryService::initialize`] or it fails fast with
/// [`ServiceError::NotReady`]; `is_ready`/`health_check` are the exceptions,
/// since monitoring needs to work even while the service is still starting.
pub struct MemoryService {
    config: ServiceConfig,
    storage: Arc<StorageEngine>,
    repository: Arc<MemoryRepository>,
    hybrid: Arc<HybridSearch>,
    embedding_store: EmbeddingStore,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    consolidation: ConsolidationRunner,
    reindex: ReindexRunner,
    pattern_detector: PatternDetector,
    ingestor: Ingestor,
    readiness: Readiness,
    clock: Arc<dyn Clock>,
    last_consolidation: Mutex<Option<DateTime<Utc>>>,
}

impl MemoryService {
    /// Opens the relational index and Markdown mirror at the paths in
    /// `config`, and wires up search, consolidation, reindex, pattern
    /// detection, and ingest against them. Does not yet accept reads or
    /// writes — call [`Self::initialize`] first.
    pub fn new(
        config: ServiceConfig,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        distillation_provider: Arc<dyn DistillationProvider>,
    ) -> MemoryResult<Self> {
        Self::with_clock(config, embedding_provider, distillation_provider, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: ServiceConfig,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        distillation_provider: Arc<dyn DistillationProvider>,
        clock: Arc<dyn Clock>,
    ) -> MemoryResult<Self> {
        config.validate().map_err(|e| ServiceError::NotReady { reason: e.to_string() })?;

        let storage = Arc::new(StorageEngine::open(&config.db_path)?);
        let repository = Arc::new(MemoryRepository::with_clock(
            storage.clone(),
            config.data_dir.clone(),
            clock.clone(),
        )?);

        let guarded_embedder: Arc<dyn EmbeddingProvider> =
            Arc::new(substrate_embeddings::CircuitBreakerProvider::new(embedding_provider, config.circuit_breaker));
        let guarded_distiller: Arc<dyn DistillationProvider> = Arc::new(
            substrate_consolidation::CircuitBreakerDistiller::new(distillation_provider, config.circuit_breaker),
        );

        let hybrid = Arc::new(HybridSearch::new(storage.clone(), guarded_embedder.clone(), config.search.clone()));
        let embedding_store = EmbeddingStore::new(storage.clone());
        let consolidation = ConsolidationRunner::new(
            storage.clone(),
            repository.clone(),
            hybrid.clone(),
            guarded_distiller,
            Some(guarded_embedder.clone()),
            config.consolidation.clone(),
        );
        let reindex = ReindexRunner::with_clock(storage.clone(), config.reindex.clone(), clock.clone());
        let pattern_detector =
            PatternDetector::with_clock(repository.clone(), config.patterns.clone(), clock.clone()).map_err(map_pattern_err)?;
        let ingestor = Ingestor::new(repository.clone(), quarantine_dir(&config.data_dir));

        Ok(Self {
            config,
            storage,
            repository,
            hybrid,
            embedding_store,
            embedding_provider: guarded_embedder,
            consolidation,
            reindex,
            pattern_detector,
            ingestor,
            readiness: Readiness::default(),
            clock,
            last_consolidation: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Rehydrates any memory missing an embedding under the configured
    /// provider/model, then opens the service for reads and writes. Per-
    /// record embedding failures are logged and skipped, not fatal — a
    /// provider outage at startup shouldn't prevent the service coming up.
    pub async fn initialize(&self) -> MemoryResult<()> {
        self.rehydrate_embeddings().await?;
        self.readiness.mark_ready();
        tracing::info!("memory service initialized");
        Ok(())
    }

    /// Marks the service not-ready. Does not close the underlying SQLite
    /// connection pool or flush any in-flight consolidation/reindex run;
    /// callers that started one should cancel it first.
    pub fn shutdown(&self) -> MemoryResult<()> {
        self.readiness.mark_not_ready();
        tracing::info!("memory service shut down");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    pub fn health_check(&self) -> HealthReport {
        let count = self.repository.count(&ListQuery::default());
        HealthReport {
            db_connected: count.is_ok(),
            memory_count: count.unwrap_or(0),
            embedding_provider: Some(format!(
                "{}/{}",
                self.embedding_provider.provider_id(),
                self.embedding_provider.model_id()
            )),
            last_consolidation: *self.last_consolidation.lock().expect("last_consolidation mutex poisoned"),
        }
    }

    pub async fn remember_explicit(
        &self,
        content: impl Into<String>,
        conversation_id: impl Into<String>,
        options: RememberOptions,
    ) -> MemoryResult<MemoryRecord> {
        self.readiness.require_ready()?;
        self.remember(content.into(), substrate_core::memory::Provenance::explicit(conversation_id), options)
            .await
    }

    pub async fn remember_implicit(
        &self,
        content: impl Into<String>,
        conversation_id: impl Into<String>,
        options: RememberOptions,
    ) -> MemoryResult<MemoryRecord> {
        self.readiness.require_ready()?;
        self.remember(content.into(), substrate_core::memory::Provenance::implicit(conversation_id), options)
            .await
    }

    async fn remember(
        &self,
        content: String,
        provenance: substrate_core::memory::Provenance,
        options: RememberOptions,
    ) -> MemoryResult<MemoryRecord> {
        let mut input = CreateMemoryInput::new(content, options.memory_type, options.layer, provenance);
        input.importance = options.importance;
        input.confidence = options.confidence;
        input.tags = options.tags;
        input.entities = options.entities;
        input.message_id = options.message_id;

        let record = self.repository.create(input)?;
        self.embed_best_effort(&record).await;
        Ok(record)
    }

    pub async fn update(&self, id: Uuid, changes: UpdateMemoryInput) -> MemoryResult<MemoryRecord> {
        self.readiness.require_ready()?;
        let record = self.repository.update(id, changes)?;
        self.embed_best_effort(&record).await;
        Ok(record)
    }

    pub fn delete(&self, id: Uuid) -> MemoryResult<()> {
        self.readiness.require_ready()?;
        Ok(self.repository.delete(id)?)
    }

    /// Runs hybrid search and bumps `accessed_at`/`access_count` on every
    /// returned memory — the service's answer to the open question of
    /// whether a read should mutate a record at all.
    pub async fn search(&self, query: &str, filter: &HybridSearchFilter) -> MemoryResult<Vec<HybridResult>> {
        self.readiness.require_ready()?;
        let results = self.hybrid.search(query, filter).await?;
        for result in &results {
            if let Err(e) = self.repository.touch_accessed(result.memory.id) {
                tracing::warn!(memory_id = %result.memory.id, error = %e, "failed to record access");
            }
        }
        Ok(results)
    }

    pub fn list(&self, query: &ListQuery) -> MemoryResult<Vec<MemoryRecord>> {
        self.readiness.require_ready()?;
        Ok(self.repository.list(query)?)
    }

    pub fn find_by_type(&self, memory_type: MemoryType, limit: usize) -> MemoryResult<Vec<MemoryRecord>> {
        self.readiness.require_ready()?;
        Ok(self.repository.find_by_type(memory_type, limit)?)
    }

    pub fn find_by_layer(&self, layer: Layer, limit: usize) -> MemoryResult<Vec<MemoryRecord>> {
        self.readiness.require_ready()?;
        Ok(self.repository.find_by_layer(layer, limit)?)
    }

    pub async fn consolidate_now(&self, cancel: &CancelToken) -> MemoryResult<substrate_consolidation::ConsolidationReport> {
        self.readiness.require_ready()?;
        let report = self.consolidation.run(cancel).await?;
        *self.last_consolidation.lock().expect("last_consolidation mutex poisoned") = Some(self.clock.now());
        Ok(report)
    }

    pub async fn reindex(
        &self,
        old_provider_id: &str,
        old_model_id: &str,
        new_provider: &dyn EmbeddingProvider,
        validate_after: bool,
        cancel: &CancelToken,
    ) -> MemoryResult<ReindexJob> {
        self.readiness.require_ready()?;
        Ok(self
            .reindex
            .run(old_provider_id, old_model_id, new_provider, validate_after, cancel, |_progress| {})
            .await?)
    }

    pub fn reconcile(&self) -> MemoryResult<ReconciliationReport> {
        self.readiness.require_ready()?;
        Ok(self.repository.reconcile()?)
    }

    /// Sidecar import (C13): not part of C11's named surface, but exposed
    /// here since nothing else in the system drives it — a caller invokes
    /// this on demand or at startup, the same way the original design notes
    /// describe.
    pub fn ingest(&self, dir: &Path) -> MemoryResult<IngestReport> {
        self.readiness.require_ready()?;
        self.ingestor.scan_directory(dir).map_err(map_ingest_err)
    }

    /// Pattern detection (C10): likewise not named in C11's surface list,
    /// but its output (`promote_pattern`) is the only way a preference
    /// memory gets created from recurring implicit signal, so the façade
    /// has to expose it to make C10 reachable at all.
    pub fn detect_patterns(&self) -> MemoryResult<Vec<DetectedPattern>> {
        self.readiness.require_ready()?;
        self.pattern_detector.detect().map_err(map_pattern_err)
    }

    pub fn promote_pattern(&self, pattern: &DetectedPattern) -> MemoryResult<MemoryRecord> {
        self.readiness.require_ready()?;
        self.pattern_detector.promote_to_preference(pattern).map_err(map_pattern_err)
    }

    async fn embed_best_effort(&self, record: &MemoryRecord) {
        if let Err(e) = self
            .embedding_store
            .embed_and_store(self.embedding_provider.as_ref(), &record.id.to_string(), &record.content)
            .await
        {
            tracing::warn!(memory_id = %record.id, error = %e, "failed to embed memory on write");
        }
    }

    async fn rehydrate_embeddings(&self) -> MemoryResult<()> {
        let query = ListQuery {
            limit: REHYDRATE_PAGE_SIZE,
            ..ListQuery::default()
        };
        let records = self.repository.list(&query)?;
        let mut rehydrated = 0usize;
        for record in &records {
            let existing = self.embedding_store.fetch(
                &record.id.to_string(),
                self.embedding_provider.provider_id(),
                self.embedding_provider.model_id(),
            )?;
            if existing.is_none() {
                self.embed_best_effort(record).await;
                rehydrated += 1;
            }
        }
        if rehydrated > 0 {
            tracing::info!(rehydrated, total = records.len(), "rehydrated missing embeddings at startup");
        }
        Ok(())
    }
}

fn quarantine_dir(data_dir: &Path) -> PathBuf {
    data_dir
        .parent()
        .map(|root| root.join("quarantine"))
        .unwrap_or_else(|| PathBuf::from("quarantine"))
}

fn map_ingest_err(e: IngestError) -> MemoryError {
    let reason = e.to_string();
    match e {
        IngestError::DirectoryRead { path, .. } | IngestError::QuarantineSetup { path, .. } => {
            MemoryError::Repository(RepositoryError::IoError { path, reason })
        }
    }
}

/// The pattern detector's error enum predates the service's closed error
/// taxonomy; both of its variants map onto `ServiceError::NotReady` since
/// each means the operation could not proceed as configured, not that a
/// mutation partially landed.
fn map_pattern_err(e: PatternError) -> MemoryError {
    match e {
        PatternError::Repository(inner) => MemoryError::Repository(inner),
        PatternError::InvalidConfig(inner) => MemoryError::Service(ServiceError::NotReady { reason: inner.to_string() }),
        PatternError::BelowPromotionThreshold { .. } => {
            MemoryError::Service(ServiceError::NotReady { reason: e.to_string() })
        }
    }
}
