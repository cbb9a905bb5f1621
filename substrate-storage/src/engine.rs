//! `StorageEngine` — owns the connection pool, runs migrations at startup,
//! and exposes the raw memory/embedding/provenance persistence primitives
//! the repository and retrieval layers build on.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;

use substrate_core::errors::{RepositoryError, SearchError};
use substrate_core::memory::{Layer, MemoryRecord, MemoryType};
use substrate_core::models::{CandidateState, CandidateStatus, ProvenanceEvent};

use crate::migrations::run_migrations;
use crate::pool::ConnectionPool;
use crate::queries::{memory_crud, memory_search, vector_search};

pub struct StorageEngine {
    pool: ConnectionPool,
    /// In-memory mode uses isolated writer/reader databases, so reads must
    /// go through the writer there; file-backed mode uses the read pool.
    use_read_pool: bool,
}

impl StorageEngine {
    pub fn open(path: &Path) -> Result<Self, RepositoryError> {
        let pool = ConnectionPool::open(path, 4)?;
        let engine = Self {
            pool,
            use_read_pool: true,
        };
        engine.initialize()?;
        Ok(engine)
    }

    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        let pool = ConnectionPool::open_in_memory(1)?;
        let engine = Self {
            pool,
            use_read_pool: false,
        };
        engine.initialize()?;
        Ok(engine)
    }

    fn initialize(&self) -> Result<(), RepositoryError> {
        self.pool.writer.with_conn(run_migrations)
    }

    fn with_reader<F, T>(&self, f: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<T, RepositoryError>,
    {
        if self.use_read_pool {
            self.pool.readers.with_conn(f)
        } else {
            self.pool.writer.with_conn(f)
        }
    }

    pub fn insert_memory(&self, memory: &MemoryRecord) -> Result<(), RepositoryError> {
        self.pool.writer.with_conn(|conn| memory_crud::insert_memory(conn, memory))
    }

    pub fn update_memory(&self, memory: &MemoryRecord) -> Result<(), RepositoryError> {
        self.pool.writer.with_conn(|conn| memory_crud::update_memory(conn, memory))
    }

    pub fn delete_memory(&self, id: &str) -> Result<(), RepositoryError> {
        self.pool.writer.with_conn(|conn| memory_crud::delete_memory(conn, id))
    }

    /// Insert a memory row, its provenance event, and run `file_op` (the
    /// Markdown mirror write) all inside one transaction: the dual-write
    /// protocol's steps 3-5 (C3 §4.3). `file_op` runs after the DB writes but
    /// before `COMMIT`, so a crash during the file write rolls the DB half
    /// back and a crash after the rename but before commit leaves an
    /// orphaned file for `reconcile` to report.
    pub fn insert_memory_with_provenance<F>(
        &self,
        memory: &MemoryRecord,
        event: &ProvenanceEvent,
        file_op: F,
    ) -> Result<(), RepositoryError>
    where
        F: FnOnce() -> Result<(), RepositoryError>,
    {
        self.pool
            .writer
            .with_conn(|conn| memory_crud::insert_memory_and_provenance(conn, memory, event, file_op))
    }

    /// Update a memory row, append its provenance event, and run `file_op`
    /// (the Markdown mirror rewrite) atomically.
    pub fn update_memory_with_provenance<F>(
        &self,
        memory: &MemoryRecord,
        event: &ProvenanceEvent,
        file_op: F,
    ) -> Result<(), RepositoryError>
    where
        F: FnOnce() -> Result<(), RepositoryError>,
    {
        self.pool
            .writer
            .with_conn(|conn| memory_crud::update_memory_and_provenance(conn, memory, event, file_op))
    }

    /// Delete a memory row, append its provenance event, and run `file_op`
    /// (the Markdown mirror unlink) atomically.
    pub fn delete_memory_with_provenance<F>(
        &self,
        id: &str,
        event: &ProvenanceEvent,
        file_op: F,
    ) -> Result<(), RepositoryError>
    where
        F: FnOnce() -> Result<(), RepositoryError>,
    {
        self.pool
            .writer
            .with_conn(|conn| memory_crud::delete_memory_and_provenance(conn, id, event, file_op))
    }

    pub fn get_memory(&self, id: &str) -> Result<Option<MemoryRecord>, RepositoryError> {
        self.with_reader(|conn| memory_crud::get_memory(conn, id))
    }

    pub fn touch_accessed(&self, id: &str, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        self.pool.writer.with_conn(|conn| memory_crud::touch_accessed(conn, id, at))
    }

    pub fn list_by_type(
        &self,
        memory_type: MemoryType,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, RepositoryError> {
        self.with_reader(|conn| memory_crud::list_by_type(conn, memory_type, limit))
    }

    pub fn list_by_layer(&self, layer: Layer, limit: usize) -> Result<Vec<MemoryRecord>, RepositoryError> {
        self.with_reader(|conn| memory_crud::list_by_layer(conn, layer, limit))
    }

    pub fn list_all(&self, limit: usize) -> Result<Vec<MemoryRecord>, RepositoryError> {
        self.with_reader(|conn| memory_crud::list_all(conn, limit))
    }

    pub fn list_filtered(
        &self,
        filter: &memory_crud::ListFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<MemoryRecord>, RepositoryError> {
        self.with_reader(|conn| memory_crud::list_filtered(conn, filter, limit, offset))
    }

    pub fn count_filtered(&self, filter: &memory_crud::ListFilter) -> Result<u64, RepositoryError> {
        self.with_reader(|conn| memory_crud::count_filtered(conn, filter))
    }

    pub fn search_fts5(
        &self,
        query: &str,
        filter: &memory_crud::ListFilter,
        limit: usize,
    ) -> Result<Vec<memory_search::Fts5Hit>, RepositoryError> {
        self.with_reader(|conn| memory_search::search_fts5(conn, query, filter, limit))
    }

    pub fn search_vector(
        &self,
        provider_id: &str,
        model_id: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<(MemoryRecord, f64)>, SearchError> {
        let run = |conn: &rusqlite::Connection| {
            vector_search::search_vector(conn, provider_id, model_id, query_embedding, limit)
        };
        if self.use_read_pool {
            self.pool.readers.with_conn(run)
        } else {
            self.pool.writer.with_conn(run)
        }
    }

    pub fn store_embedding(
        &self,
        memory_id: &str,
        provider_id: &str,
        model_id: &str,
        version: u32,
        embedding: &[f32],
    ) -> Result<(), RepositoryError> {
        self.pool
            .writer
            .with_conn(|conn| vector_search::store_embedding(conn, memory_id, provider_id, model_id, version, embedding))
    }

    /// List `(memory_id, content)` pairs currently embedded under
    /// `(provider_id, model_id)` — the reindex job's input set.
    pub fn list_embedded(&self, provider_id: &str, model_id: &str) -> Result<Vec<(String, String)>, RepositoryError> {
        self.with_reader(|conn| vector_search::list_embedded(conn, provider_id, model_id))
    }

    /// Fetch a single stored embedding, if present.
    pub fn get_embedding(
        &self,
        memory_id: &str,
        provider_id: &str,
        model_id: &str,
    ) -> Result<Option<Vec<f32>>, RepositoryError> {
        self.with_reader(|conn| vector_search::get_embedding(conn, memory_id, provider_id, model_id))
    }

    /// Fetch the embedding format revision stored for a memory, if present.
    pub fn get_embedding_version(
        &self,
        memory_id: &str,
        provider_id: &str,
        model_id: &str,
    ) -> Result<Option<u32>, RepositoryError> {
        self.with_reader(|conn| vector_search::get_embedding_version(conn, memory_id, provider_id, model_id))
    }

    /// Atomically delete the `(old_provider, old_model)` embedding and
    /// insert the `(new_provider, new_model)` one for the same memory.
    #[allow(clippy::too_many_arguments)]
    pub fn replace_embedding(
        &self,
        memory_id: &str,
        old_provider_id: &str,
        old_model_id: &str,
        new_provider_id: &str,
        new_model_id: &str,
        new_version: u32,
        embedding: &[f32],
    ) -> Result<(), RepositoryError> {
        self.pool.writer.with_conn(|conn| {
            vector_search::replace_embedding(
                conn,
                memory_id,
                old_provider_id,
                old_model_id,
                new_provider_id,
                new_model_id,
                new_version,
                embedding,
            )
        })
    }

    pub fn insert_provenance_event(&self, event: &ProvenanceEvent) -> Result<(), RepositoryError> {
        self.pool
            .writer
            .with_conn(|conn| crate::queries::provenance::insert_provenance_event_inner(conn, event))
    }

    pub fn upsert_candidate(&self, candidate: &CandidateState) -> Result<(), RepositoryError> {
        self.pool.writer.with_conn(|conn| {
            conn.execute(
                "INSERT INTO consolidation_candidates (memory_id, status, retry_count, last_error, updated_at)
                 VALUES (?1,?2,?3,?4,?5)
                 ON CONFLICT(memory_id) DO UPDATE SET
                    status = excluded.status, retry_count = excluded.retry_count,
                    last_error = excluded.last_error, updated_at = excluded.updated_at",
                rusqlite::params![
                    candidate.memory_id.to_string(),
                    candidate_status_str(candidate.status),
                    candidate.retry_count,
                    candidate.last_error,
                    candidate.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| RepositoryError::DbError {
                reason: e.to_string(),
            })?;
            Ok(())
        })
    }

    pub fn pending_candidates(&self, limit: usize) -> Result<Vec<String>, RepositoryError> {
        self.with_reader(|conn| {
            let mut stmt = conn
                .prepare("SELECT memory_id FROM consolidation_candidates WHERE status = 'pending' LIMIT ?1")
                .map_err(|e| RepositoryError::DbError {
                    reason: e.to_string(),
                })?;
            let rows = stmt
                .query_map(rusqlite::params![limit as i64], |row| row.get::<_, String>(0))
                .map_err(|e| RepositoryError::DbError {
                    reason: e.to_string(),
                })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row.map_err(|e| RepositoryError::DbError {
                    reason: e.to_string(),
                })?);
            }
            Ok(out)
        })
    }

    /// Memory ids currently in `status`, e.g. `Failed` candidates still
    /// eligible for retry. Unlike [`StorageEngine::pending_candidates`] this
    /// isn't hardcoded to `pending` so the selection phase can also sweep
    /// up retryable failures.
    pub fn candidates_by_status(&self, status: CandidateStatus, limit: usize) -> Result<Vec<String>, RepositoryError> {
        self.with_reader(|conn| {
            let mut stmt = conn
                .prepare("SELECT memory_id FROM consolidation_candidates WHERE status = ?1 LIMIT ?2")
                .map_err(|e| RepositoryError::DbError {
                    reason: e.to_string(),
                })?;
            let rows = stmt
                .query_map(rusqlite::params![candidate_status_str(status), limit as i64], |row| {
                    row.get::<_, String>(0)
                })
                .map_err(|e| RepositoryError::DbError {
                    reason: e.to_string(),
                })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row.map_err(|e| RepositoryError::DbError {
                    reason: e.to_string(),
                })?);
            }
            Ok(out)
        })
    }

    /// Fetch one candidate's tracked state, if it has ever been selected.
    pub fn get_candidate(&self, memory_id: &str) -> Result<Option<CandidateState>, RepositoryError> {
        self.with_reader(|conn| {
            conn.query_row(
                "SELECT memory_id, status, retry_count, last_error, updated_at
                 FROM consolidation_candidates WHERE memory_id = ?1",
                rusqlite::params![memory_id],
                |row| {
                    let memory_id: String = row.get(0)?;
                    let status: String = row.get(1)?;
                    let retry_count: u32 = row.get(2)?;
                    let last_error: Option<String> = row.get(3)?;
                    let updated_at: String = row.get(4)?;
                    Ok((memory_id, status, retry_count, last_error, updated_at))
                },
            )
            .optional()
            .map_err(|e| RepositoryError::DbError {
                reason: e.to_string(),
            })?
            .map(|(memory_id, status, retry_count, last_error, updated_at)| {
                Ok(CandidateState {
                    memory_id: memory_id.parse().map_err(|e| RepositoryError::DbError {
                        reason: format!("bad candidate memory_id: {e}"),
                    })?,
                    status: parse_candidate_status(&status)?,
                    retry_count,
                    last_error,
                    updated_at: DateTime::parse_from_rfc3339(&updated_at)
                        .map_err(|e| RepositoryError::DbError {
                            reason: e.to_string(),
                        })?
                        .with_timezone(&Utc),
                })
            })
            .transpose()
        })
    }
}

fn parse_candidate_status(s: &str) -> Result<CandidateStatus, RepositoryError> {
    match s {
        "pending" => Ok(CandidateStatus::Pending),
        "selected" => Ok(CandidateStatus::Selected),
        "processed" => Ok(CandidateStatus::Processed),
        "failed" => Ok(CandidateStatus::Failed),
        other => Err(RepositoryError::DbError {
            reason: format!("unknown candidate status: {other}"),
        }),
    }
}

fn candidate_status_str(status: CandidateStatus) -> &'static str {
    match status {
        CandidateStatus::Pending => "pending",
        CandidateStatus::Selected => "selected",
        CandidateStatus::Processed => "processed",
        CandidateStatus::Failed => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use substrate_core::memory::{Confidence, Importance, Provenance};
    use uuid::Uuid;

    fn sample_memory() -> MemoryRecord {
        let now = Utc::now();
        MemoryRecord {
            id: Uuid::new_v4(),
            content: "the user prefers dark mode".to_string(),
            memory_type: MemoryType::Preference,
            layer: Layer::Stm,
            importance: Importance::new(0.6),
            confidence: Confidence::new(0.8),
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

    #[test]
    fn insert_then_get_round_trips() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let memory = sample_memory();
        engine.insert_memory(&memory).unwrap();
        let fetched = engine.get_memory(&memory.id.to_string()).unwrap().unwrap();
        assert_eq!(fetched.content, memory.content);
        assert_eq!(fetched.layer, Layer::Stm);
    }

    #[test]
    fn get_missing_returns_none() {
        let engine = StorageEngine::open_in_memory().unwrap();
        assert!(engine.get_memory(&Uuid::new_v4().to_string()).unwrap().is_none());
    }

    #[test]
    fn delete_missing_is_not_found() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let err = engine.delete_memory(&Uuid::new_v4().to_string()).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[test]
    fn fts5_search_finds_inserted_content() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let memory = sample_memory();
        engine.insert_memory(&memory).unwrap();
        let hits = engine.search_fts5("\"dark mode\"", &memory_crud::ListFilter::default(), 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].memory.id, memory.id);
    }

    proptest! {
        #[test]
        fn insert_then_get_preserves_arbitrary_content(body in "[a-zA-Z0-9 ]{1,60}") {
            let engine = StorageEngine::open_in_memory().unwrap();
            let mut memory = sample_memory();
            memory.content = body.clone();
            engine.insert_memory(&memory).unwrap();

            let fetched = engine.get_memory(&memory.id.to_string()).unwrap().unwrap();
            prop_assert_eq!(fetched.content, body);
        }
    }

    #[test]
    fn store_embedding_round_trips_vector_and_version() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let memory = sample_memory();
        engine.insert_memory(&memory).unwrap();
        let id = memory.id.to_string();

        engine.store_embedding(&id, "onnx", "v1", 2, &[0.1, 0.2, 0.3]).unwrap();

        assert_eq!(engine.get_embedding(&id, "onnx", "v1").unwrap(), Some(vec![0.1, 0.2, 0.3]));
        assert_eq!(engine.get_embedding_version(&id, "onnx", "v1").unwrap(), Some(2));
    }

    #[test]
    fn store_embedding_without_a_prior_row_defaults_no_version() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let memory = sample_memory();
        engine.insert_memory(&memory).unwrap();
        let id = memory.id.to_string();

        assert_eq!(engine.get_embedding_version(&id, "onnx", "v1").unwrap(), None);
    }

    #[test]
    fn replace_embedding_moves_to_new_provider_and_version() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let memory = sample_memory();
        engine.insert_memory(&memory).unwrap();
        let id = memory.id.to_string();

        engine.store_embedding(&id, "onnx", "v1", 1, &[0.1, 0.2]).unwrap();
        engine
            .replace_embedding(&id, "onnx", "v1", "onnx", "v2", 1, &[0.4, 0.5])
            .unwrap();

        assert_eq!(engine.get_embedding(&id, "onnx", "v1").unwrap(), None);
        assert_eq!(engine.get_embedding(&id, "onnx", "v2").unwrap(), Some(vec![0.4, 0.5]));
    }
}
