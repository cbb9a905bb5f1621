use std::path::{Path, PathBuf};
use std::sync::Arc;

use substrate_core::errors::RepositoryError;
use substrate_core::memory::{Layer, MemoryRecord, MemoryType};
use substrate_core::models::{ProvenanceEvent, ProvenanceEventKind};
use substrate_core::traits::{Clock, SystemClock};
use substrate_storage::StorageEngine;
use uuid::Uuid;

use crate::file_ops::{unlink_tolerant, write_and_rename};
use crate::input::{CreateMemoryInput, ListQuery, UpdateMemoryInput};
use crate::reconcile::{self, ReconciliationReport};

/// Dual-write memory repository (C3): every mutation lands on the relational
/// index and its Markdown mirror inside one SQLite transaction, or neither
/// does. See [`reconcile`] for the drift detector that heals the gap a crash
/// between the file rename and `COMMIT` can leave behind.
pub struct MemoryRepository {
    storage: Arc<StorageEngine>,
    data_dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl MemoryRepository {
    pub fn new(storage: Arc<StorageEngine>, data_dir: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        Self::with_clock(storage, data_dir, Arc::new(SystemClock))
    }

    pub fn with_clock(
        storage: Arc<StorageEngine>,
        data_dir: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RepositoryError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir).map_err(|e| RepositoryError::IoError {
            path: data_dir.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            storage,
            data_dir,
            clock,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Dual-write protocol's create path (C3 §4.3, steps 1-6). Validation,
    /// then a single SQLite transaction carrying the `memories` insert, the
    /// provenance event, and the Markdown write-then-rename.
    pub fn create(&self, input: CreateMemoryInput) -> Result<MemoryRecord, RepositoryError> {
        validate_content(&input.content)?;

        let now = self.clock.now();
        let mut record = MemoryRecord {
            id: Uuid::new_v4(),
            content: input.content,
            memory_type: input.memory_type,
            layer: input.layer,
            importance: input.importance,
            confidence: input.confidence,
            tags: substrate_core::memory::dedup_preserve_order(input.tags),
            entities: substrate_core::memory::dedup_preserve_order(input.entities),
            provenance: input.provenance,
            supersedes: input.supersedes,
            superseded_by: None,
            created_at: now,
            updated_at: now,
            accessed_at: now,
            access_count: 0,
            checksum: String::new(),
        };

        let text = substrate_codec::serialize(&record, input.message_id.as_deref())
            .map_err(|e| RepositoryError::SerializationError { reason: e.to_string() })?;
        record.checksum = substrate_codec::checksum(&text);
        let file_name = substrate_codec::build_file_name(&record);
        let target_path = self.data_dir.join(&file_name);

        let event = ProvenanceEvent {
            id: Uuid::new_v4(),
            memory_id: record.id,
            kind: input.provenance_event_kind.unwrap_or(ProvenanceEventKind::Created),
            detail: Some(provenance_detail(&record.checksum, &file_name, input.message_id.as_deref())),
            occurred_at: now,
        };

        let data_dir = self.data_dir.clone();
        self.storage
            .insert_memory_with_provenance(&record, &event, || write_and_rename(&data_dir, &target_path, &text))?;

        tracing::debug!(memory_id = %record.id, file = %file_name, "memory created");
        Ok(record)
    }

    pub fn get_by_id(&self, id: Uuid) -> Result<Option<MemoryRecord>, RepositoryError> {
        self.storage.get_memory(&id.to_string())
    }

    /// Applies `changes`, rewrites the Markdown mirror in place (the
    /// filename is stable across updates since it's derived from
    /// `created_at`/`memory_type`/`id`, none of which an update can touch),
    /// and records `Superseded` instead of `Updated` when this call is the
    /// one that sets `superseded_by`.
    pub fn update(&self, id: Uuid, changes: UpdateMemoryInput) -> Result<MemoryRecord, RepositoryError> {
        let mut record = self
            .get_by_id(id)?
            .ok_or_else(|| RepositoryError::NotFound { id: id.to_string() })?;

        if let Some(content) = changes.content {
            validate_content(&content)?;
            record.content = content;
        }
        if let Some(importance) = changes.importance {
            record.importance = importance;
        }
        if let Some(confidence) = changes.confidence {
            record.confidence = confidence;
        }
        if let Some(tags) = changes.tags {
            record.tags = substrate_core::memory::dedup_preserve_order(tags);
        }
        if let Some(entities) = changes.entities {
            record.entities = substrate_core::memory::dedup_preserve_order(entities);
        }
        if let Some(layer) = changes.layer {
            record.layer = layer;
        }
        if let Some(supersedes) = changes.supersedes {
            record.supersedes = Some(supersedes);
        }
        let becomes_superseded = changes.superseded_by.is_some() && record.superseded_by.is_none();
        if let Some(superseded_by) = changes.superseded_by {
            record.superseded_by = Some(superseded_by);
        }

        let now = self.clock.now();
        record.updated_at = now;

        let text = substrate_codec::serialize(&record, changes.message_id.as_deref())
            .map_err(|e| RepositoryError::SerializationError { reason: e.to_string() })?;
        record.checksum = substrate_codec::checksum(&text);
        let file_name = substrate_codec::build_file_name(&record);
        let target_path = self.data_dir.join(&file_name);

        let kind = if becomes_superseded {
            ProvenanceEventKind::Superseded
        } else {
            ProvenanceEventKind::Updated
        };
        let event = ProvenanceEvent {
            id: Uuid::new_v4(),
            memory_id: record.id,
            kind,
            detail: Some(provenance_detail(&record.checksum, &file_name, changes.message_id.as_deref())),
            occurred_at: now,
        };

        let data_dir = self.data_dir.clone();
        self.storage
            .update_memory_with_provenance(&record, &event, || write_and_rename(&data_dir, &target_path, &text))?;

        tracing::debug!(memory_id = %record.id, superseded = becomes_superseded, "memory updated");
        Ok(record)
    }

    /// Delete's order reverses create's: the DB row is removed inside the
    /// transaction before the file is unlinked, and a missing file is
    /// tolerated — the transaction still commits.
    pub fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let existing = self
            .get_by_id(id)?
            .ok_or_else(|| RepositoryError::NotFound { id: id.to_string() })?;

        let file_name = substrate_codec::build_file_name(&existing);
        let target_path = self.data_dir.join(&file_name);
        let now = self.clock.now();
        let event = ProvenanceEvent {
            id: Uuid::new_v4(),
            memory_id: id,
            kind: ProvenanceEventKind::Deleted,
            detail: Some(format!(r#"{{"fileName":"{file_name}"}}"#)),
            occurred_at: now,
        };

        self.storage
            .delete_memory_with_provenance(&id.to_string(), &event, || unlink_tolerant(&target_path))?;
        tracing::debug!(memory_id = %id, "memory deleted");
        Ok(())
    }

    pub fn list(&self, query: &ListQuery) -> Result<Vec<MemoryRecord>, RepositoryError> {
        self.storage.list_filtered(&query.filter, query.limit, query.offset)
    }

    pub fn count(&self, query: &ListQuery) -> Result<u64, RepositoryError> {
        self.storage.count_filtered(&query.filter)
    }

    pub fn find_by_type(&self, memory_type: MemoryType, limit: usize) -> Result<Vec<MemoryRecord>, RepositoryError> {
        self.storage.list_by_type(memory_type, limit)
    }

    pub fn find_by_layer(&self, layer: Layer, limit: usize) -> Result<Vec<MemoryRecord>, RepositoryError> {
        self.storage.list_by_layer(layer, limit)
    }

    /// Bumps `access_count` and `accessed_at` for a memory that was just
    /// read. DB-only, deliberately outside the dual-write transaction: the
    /// Markdown mirror's `accessedAt` can lag until the next content
    /// change, since reconciliation only compares content, not access
    /// metadata.
    pub fn touch_accessed(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.storage.touch_accessed(&id.to_string(), self.clock.now())
    }

    /// Walks the data directory and the `memories` table; never mutates
    /// either side.
    pub fn reconcile(&self) -> Result<ReconciliationReport, RepositoryError> {
        let report = reconcile::scan(&self.storage, &self.data_dir)?;
        if !report.is_clean() {
            tracing::warn!(
                orphaned = report.orphaned_files.len(),
                missing = report.missing_files.len(),
                mismatched = report.content_mismatches.len(),
                "reconciliation found drift"
            );
        }
        Ok(report)
    }
}

fn validate_content(content: &str) -> Result<(), RepositoryError> {
    if content.trim().is_empty() {
        return Err(RepositoryError::InvalidInput {
            reason: "content must not be empty".to_string(),
        });
    }
    Ok(())
}

fn provenance_detail(checksum: &str, file_name: &str, message_id: Option<&str>) -> String {
    let detail = serde_json::json!({
        "checksum": checksum,
        "fileName": file_name,
        "sourceMessageId": message_id,
    });
    detail.to_string()
}
