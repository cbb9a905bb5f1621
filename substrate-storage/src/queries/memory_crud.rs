//! Insert, update, get, delete, bulk ops for memories.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use substrate_core::errors::RepositoryError;
use substrate_core::memory::{Layer, MemoryRecord, MemoryType, Provenance, SourceType};
use substrate_core::models::ProvenanceEvent;

use super::provenance::insert_provenance_event_inner;

/// Insert a single memory. Wrapped in a transaction: row + row existing
/// already is treated as caller error, not silently upserted.
pub fn insert_memory(conn: &Connection, memory: &MemoryRecord) -> Result<(), RepositoryError> {
    let tx = conn.unchecked_transaction().map_err(|e| RepositoryError::DbError {
        reason: format!("insert_memory begin: {e}"),
    })?;
    match insert_memory_inner(&tx, memory) {
        Ok(()) => tx.commit().map_err(|e| RepositoryError::DbError {
            reason: format!("insert_memory commit: {e}"),
        }),
        Err(e) => {
            let _ = tx.rollback();
            Err(e)
        }
    }
}

fn insert_memory_inner(conn: &Connection, memory: &MemoryRecord) -> Result<(), RepositoryError> {
    let tags_json = serde_json::to_string(&memory.tags).map_err(|e| {
        RepositoryError::SerializationError {
            reason: e.to_string(),
        }
    })?;
    let entities_json = serde_json::to_string(&memory.entities).map_err(|e| {
        RepositoryError::SerializationError {
            reason: e.to_string(),
        }
    })?;

    conn.execute(
        "INSERT INTO memories (
            id, content, memory_type, layer, importance, confidence,
            tags, entities, source_type, conversation_id,
            supersedes, superseded_by, created_at, updated_at, accessed_at,
            access_count, checksum
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17)",
        params![
            memory.id.to_string(),
            memory.content,
            memory.memory_type.as_str(),
            layer_str(memory.layer),
            memory.importance.value(),
            memory.confidence.value(),
            tags_json,
            entities_json,
            source_type_str(memory.provenance.source_type),
            memory.provenance.conversation_id,
            memory.supersedes.map(|id| id.to_string()),
            memory.superseded_by.map(|id| id.to_string()),
            memory.created_at.to_rfc3339(),
            memory.updated_at.to_rfc3339(),
            memory.accessed_at.to_rfc3339(),
            memory.access_count as i64,
            memory.checksum,
        ],
    )
    .map_err(|e| RepositoryError::DbError {
        reason: e.to_string(),
    })?;

    Ok(())
}

/// Insert a memory row and its accompanying provenance event, then run
/// `file_op` — the Markdown mirror write — all inside one transaction, and
/// commit only if every step succeeds. This is the dual-write protocol's
/// steps 3-5 (C3 §4.3): a crash between the file rename and `COMMIT` rolls
/// the DB half back, leaving an orphaned file for reconciliation to report.
pub fn insert_memory_and_provenance<F>(
    conn: &Connection,
    memory: &MemoryRecord,
    event: &ProvenanceEvent,
    file_op: F,
) -> Result<(), RepositoryError>
where
    F: FnOnce() -> Result<(), RepositoryError>,
{
    let tx = conn.unchecked_transaction().map_err(|e| RepositoryError::DbError {
        reason: format!("insert_memory_and_provenance begin: {e}"),
    })?;
    let result = insert_memory_inner(&tx, memory)
        .and_then(|_| insert_provenance_event_inner(&tx, event))
        .and_then(|_| file_op());
    match result {
        Ok(()) => tx.commit().map_err(|e| RepositoryError::DbError {
            reason: format!("insert_memory_and_provenance commit: {e}"),
        }),
        Err(e) => {
            let _ = tx.rollback();
            Err(e)
        }
    }
}

/// Update a memory row, append its provenance event, and run `file_op` (the
/// Markdown mirror rewrite) in a single transaction.
pub fn update_memory_and_provenance<F>(
    conn: &Connection,
    memory: &MemoryRecord,
    event: &ProvenanceEvent,
    file_op: F,
) -> Result<(), RepositoryError>
where
    F: FnOnce() -> Result<(), RepositoryError>,
{
    let tx = conn.unchecked_transaction().map_err(|e| RepositoryError::DbError {
        reason: format!("update_memory_and_provenance begin: {e}"),
    })?;
    let result = update_memory_inner(&tx, memory)
        .and_then(|_| insert_provenance_event_inner(&tx, event))
        .and_then(|_| file_op());
    match result {
        Ok(()) => tx.commit().map_err(|e| RepositoryError::DbError {
            reason: format!("update_memory_and_provenance commit: {e}"),
        }),
        Err(e) => {
            let _ = tx.rollback();
            Err(e)
        }
    }
}

/// Delete a memory row, append its provenance event, and run `file_op` (the
/// Markdown mirror unlink) in a single transaction. Missing rows are
/// tolerated (the file may already be gone too).
pub fn delete_memory_and_provenance<F>(
    conn: &Connection,
    id: &str,
    event: &ProvenanceEvent,
    file_op: F,
) -> Result<(), RepositoryError>
where
    F: FnOnce() -> Result<(), RepositoryError>,
{
    let tx = conn.unchecked_transaction().map_err(|e| RepositoryError::DbError {
        reason: format!("delete_memory_and_provenance begin: {e}"),
    })?;
    let result = delete_memory(&tx, id)
        .and_then(|_| insert_provenance_event_inner(&tx, event))
        .and_then(|_| file_op());
    match result {
        Ok(()) => tx.commit().map_err(|e| RepositoryError::DbError {
            reason: format!("delete_memory_and_provenance commit: {e}"),
        }),
        Err(e) => {
            let _ = tx.rollback();
            Err(e)
        }
    }
}

/// Get a single memory by ID.
pub fn get_memory(conn: &Connection, id: &str) -> Result<Option<MemoryRecord>, RepositoryError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, content, memory_type, layer, importance, confidence,
                    tags, entities, source_type, conversation_id,
                    supersedes, superseded_by, created_at, updated_at, accessed_at,
                    access_count, checksum
             FROM memories WHERE id = ?1",
        )
        .map_err(|e| RepositoryError::DbError {
            reason: e.to_string(),
        })?;

    stmt.query_row(params![id], row_to_memory)
        .optional()
        .map_err(|e| RepositoryError::DbError {
            reason: e.to_string(),
        })?
        .transpose()
}

/// Update an existing memory. Returns `NotFound` if no row matched.
pub fn update_memory(conn: &Connection, memory: &MemoryRecord) -> Result<(), RepositoryError> {
    let tx = conn.unchecked_transaction().map_err(|e| RepositoryError::DbError {
        reason: format!("update_memory begin: {e}"),
    })?;
    match update_memory_inner(&tx, memory) {
        Ok(()) => tx.commit().map_err(|e| RepositoryError::DbError {
            reason: format!("update_memory commit: {e}"),
        }),
        Err(e) => {
            let _ = tx.rollback();
            Err(e)
        }
    }
}

fn update_memory_inner(conn: &Connection, memory: &MemoryRecord) -> Result<(), RepositoryError> {
    let tags_json = serde_json::to_string(&memory.tags).map_err(|e| {
        RepositoryError::SerializationError {
            reason: e.to_string(),
        }
    })?;
    let entities_json = serde_json::to_string(&memory.entities).map_err(|e| {
        RepositoryError::SerializationError {
            reason: e.to_string(),
        }
    })?;

    let rows = conn
        .execute(
            "UPDATE memories SET
                content = ?2, memory_type = ?3, layer = ?4, importance = ?5,
                confidence = ?6, tags = ?7, entities = ?8,
                supersedes = ?9, superseded_by = ?10,
                updated_at = ?11, accessed_at = ?12, access_count = ?13, checksum = ?14
             WHERE id = ?1",
            params![
                memory.id.to_string(),
                memory.content,
                memory.memory_type.as_str(),
                layer_str(memory.layer),
                memory.importance.value(),
                memory.confidence.value(),
                tags_json,
                entities_json,
                memory.supersedes.map(|id| id.to_string()),
                memory.superseded_by.map(|id| id.to_string()),
                memory.updated_at.to_rfc3339(),
                memory.accessed_at.to_rfc3339(),
                memory.access_count as i64,
                memory.checksum,
            ],
        )
        .map_err(|e| RepositoryError::DbError {
            reason: e.to_string(),
        })?;

    if rows == 0 {
        return Err(RepositoryError::NotFound {
            id: memory.id.to_string(),
        });
    }
    Ok(())
}

/// Update only `accessed_at`/`access_count` for a read, without touching
/// `updated_at` — this crate's resolution of whether a read is a mutation.
pub fn touch_accessed(
    conn: &Connection,
    id: &str,
    accessed_at: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    conn.execute(
        "UPDATE memories SET accessed_at = ?2, access_count = access_count + 1 WHERE id = ?1",
        params![id, accessed_at.to_rfc3339()],
    )
    .map_err(|e| RepositoryError::DbError {
        reason: e.to_string(),
    })?;
    Ok(())
}

/// Delete a memory by ID.
pub fn delete_memory(conn: &Connection, id: &str) -> Result<(), RepositoryError> {
    let rows = conn
        .execute("DELETE FROM memories WHERE id = ?1", params![id])
        .map_err(|e| RepositoryError::DbError {
            reason: e.to_string(),
        })?;
    if rows == 0 {
        return Err(RepositoryError::NotFound { id: id.to_string() });
    }
    Ok(())
}

/// List memories by type, newest first.
pub fn list_by_type(
    conn: &Connection,
    memory_type: MemoryType,
    limit: usize,
) -> Result<Vec<MemoryRecord>, RepositoryError> {
    query_ordered(
        conn,
        "WHERE memory_type = ?1 ORDER BY created_at DESC LIMIT ?2",
        params![memory_type.as_str(), limit as i64],
    )
}

/// List memories by layer, newest first.
pub fn list_by_layer(
    conn: &Connection,
    layer: Layer,
    limit: usize,
) -> Result<Vec<MemoryRecord>, RepositoryError> {
    query_ordered(
        conn,
        "WHERE layer = ?1 ORDER BY created_at DESC LIMIT ?2",
        params![layer_str(layer), limit as i64],
    )
}

/// List all memories, newest first. Used by reindex and reconciliation scans.
pub fn list_all(conn: &Connection, limit: usize) -> Result<Vec<MemoryRecord>, RepositoryError> {
    query_ordered(
        conn,
        "ORDER BY created_at DESC LIMIT ?1",
        params![limit as i64],
    )
}

/// Filter predicates for [`list_filtered`] / [`count_filtered`]. `None`
/// leaves that predicate unconstrained.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub memory_type: Option<MemoryType>,
    pub layer: Option<Layer>,
    pub source_type: Option<SourceType>,
}

impl ListFilter {
    fn where_clause(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut clauses = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(t) = self.memory_type {
            clauses.push(format!("memory_type = ?{}", values.len() + 1));
            values.push(Box::new(t.as_str().to_string()));
        }
        if let Some(l) = self.layer {
            clauses.push(format!("layer = ?{}", values.len() + 1));
            values.push(Box::new(layer_str(l).to_string()));
        }
        if let Some(s) = self.source_type {
            clauses.push(format!("source_type = ?{}", values.len() + 1));
            values.push(Box::new(source_type_str(s).to_string()));
        }
        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!("WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

/// List memories matching `filter`, newest first, with offset-based paging.
pub fn list_filtered(
    conn: &Connection,
    filter: &ListFilter,
    limit: usize,
    offset: usize,
) -> Result<Vec<MemoryRecord>, RepositoryError> {
    let (where_clause, mut values) = filter.where_clause();
    let limit_idx = values.len() + 1;
    let offset_idx = values.len() + 2;
    let sql = format!(
        "SELECT id, content, memory_type, layer, importance, confidence,
                tags, entities, source_type, conversation_id,
                supersedes, superseded_by, created_at, updated_at, accessed_at,
                access_count, checksum
         FROM memories {where_clause} ORDER BY created_at DESC LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
    );
    values.push(Box::new(limit as i64));
    values.push(Box::new(offset as i64));

    let mut stmt = conn.prepare(&sql).map_err(|e| RepositoryError::DbError {
        reason: e.to_string(),
    })?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), row_to_memory)
        .map_err(|e| RepositoryError::DbError {
            reason: e.to_string(),
        })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| RepositoryError::DbError {
            reason: e.to_string(),
        })??);
    }
    Ok(out)
}

/// Count memories matching `filter`.
pub fn count_filtered(conn: &Connection, filter: &ListFilter) -> Result<u64, RepositoryError> {
    let (where_clause, values) = filter.where_clause();
    let sql = format!("SELECT COUNT(*) FROM memories {where_clause}");
    let param_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    conn.query_row(&sql, param_refs.as_slice(), |row| row.get::<_, i64>(0))
        .map(|n| n as u64)
        .map_err(|e| RepositoryError::DbError {
            reason: e.to_string(),
        })
}

fn query_ordered(
    conn: &Connection,
    clause: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<MemoryRecord>, RepositoryError> {
    let sql = format!(
        "SELECT id, content, memory_type, layer, importance, confidence,
                tags, entities, source_type, conversation_id,
                supersedes, superseded_by, created_at, updated_at, accessed_at,
                access_count, checksum
         FROM memories {clause}"
    );
    let mut stmt = conn.prepare(&sql).map_err(|e| RepositoryError::DbError {
        reason: e.to_string(),
    })?;
    let rows = stmt
        .query_map(params, row_to_memory)
        .map_err(|e| RepositoryError::DbError {
            reason: e.to_string(),
        })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| RepositoryError::DbError {
            reason: e.to_string(),
        })??);
    }
    Ok(out)
}

fn layer_str(layer: Layer) -> &'static str {
    match layer {
        Layer::Stm => "stm",
        Layer::Ltm => "ltm",
    }
}

fn parse_layer(s: &str) -> Result<Layer, RepositoryError> {
    match s {
        "stm" => Ok(Layer::Stm),
        "ltm" => Ok(Layer::Ltm),
        other => Err(RepositoryError::SerializationError {
            reason: format!("unknown layer '{other}'"),
        }),
    }
}

fn parse_memory_type(s: &str) -> Result<MemoryType, RepositoryError> {
    match s {
        "fact" => Ok(MemoryType::Fact),
        "preference" => Ok(MemoryType::Preference),
        "decision" => Ok(MemoryType::Decision),
        "episode" => Ok(MemoryType::Episode),
        "observation" => Ok(MemoryType::Observation),
        "action_item" => Ok(MemoryType::ActionItem),
        other => Err(RepositoryError::SerializationError {
            reason: format!("unknown memory_type '{other}'"),
        }),
    }
}

fn source_type_str(s: SourceType) -> &'static str {
    match s {
        SourceType::Explicit => "explicit",
        SourceType::Implicit => "implicit",
        SourceType::Distilled => "distilled",
        SourceType::Imported => "imported",
    }
}

fn parse_source_type(s: &str) -> Result<SourceType, RepositoryError> {
    match s {
        "explicit" => Ok(SourceType::Explicit),
        "implicit" => Ok(SourceType::Implicit),
        "distilled" => Ok(SourceType::Distilled),
        "imported" => Ok(SourceType::Imported),
        other => Err(RepositoryError::SerializationError {
            reason: format!("unknown source_type '{other}'"),
        }),
    }
}

fn parse_dt(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::SerializationError {
            reason: format!("parse datetime '{s}': {e}"),
        })
}

pub(crate) fn row_to_memory(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<Result<MemoryRecord, RepositoryError>> {
    Ok(row_to_memory_inner(row))
}

fn row_to_memory_inner(row: &rusqlite::Row<'_>) -> Result<MemoryRecord, RepositoryError> {
    let to_db = |e: rusqlite::Error| RepositoryError::DbError {
        reason: e.to_string(),
    };

    let id_str: String = row.get(0).map_err(to_db)?;
    let content: String = row.get(1).map_err(to_db)?;
    let memory_type_str: String = row.get(2).map_err(to_db)?;
    let layer_str_val: String = row.get(3).map_err(to_db)?;
    let importance: f64 = row.get(4).map_err(to_db)?;
    let confidence: f64 = row.get(5).map_err(to_db)?;
    let tags_json: String = row.get(6).map_err(to_db)?;
    let entities_json: String = row.get(7).map_err(to_db)?;
    let source_type_str_val: String = row.get(8).map_err(to_db)?;
    let conversation_id: Option<String> = row.get(9).map_err(to_db)?;
    let supersedes: Option<String> = row.get(10).map_err(to_db)?;
    let superseded_by: Option<String> = row.get(11).map_err(to_db)?;
    let created_at: String = row.get(12).map_err(to_db)?;
    let updated_at: String = row.get(13).map_err(to_db)?;
    let accessed_at: String = row.get(14).map_err(to_db)?;
    let access_count: i64 = row.get(15).map_err(to_db)?;
    let checksum: String = row.get(16).map_err(to_db)?;

    let tags: Vec<String> =
        serde_json::from_str(&tags_json).map_err(|e| RepositoryError::SerializationError {
            reason: format!("parse tags: {e}"),
        })?;
    let entities: Vec<String> =
        serde_json::from_str(&entities_json).map_err(|e| RepositoryError::SerializationError {
            reason: format!("parse entities: {e}"),
        })?;

    Ok(MemoryRecord {
        id: uuid::Uuid::parse_str(&id_str).map_err(|e| RepositoryError::SerializationError {
            reason: format!("parse id: {e}"),
        })?,
        content,
        memory_type: parse_memory_type(&memory_type_str)?,
        layer: parse_layer(&layer_str_val)?,
        importance: substrate_core::memory::Importance::new(importance),
        confidence: substrate_core::memory::Confidence::new(confidence),
        tags,
        entities,
        provenance: Provenance {
            source_type: parse_source_type(&source_type_str_val)?,
            conversation_id,
        },
        supersedes: supersedes
            .map(|s| uuid::Uuid::parse_str(&s))
            .transpose()
            .map_err(|e| RepositoryError::SerializationError {
                reason: format!("parse supersedes: {e}"),
            })?,
        superseded_by: superseded_by
            .map(|s| uuid::Uuid::parse_str(&s))
            .transpose()
            .map_err(|e| RepositoryError::SerializationError {
                reason: format!("parse superseded_by: {e}"),
            })?,
        created_at: parse_dt(&created_at)?,
        updated_at: parse_dt(&updated_at)?,
        accessed_at: parse_dt(&accessed_at)?,
        access_count: access_count as u64,
        checksum,
    })
}
