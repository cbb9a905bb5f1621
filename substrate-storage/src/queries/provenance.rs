//! Provenance log inserts, factored out so both the standalone
//! `StorageEngine::insert_provenance_event` path and the combined
//! dual-write transactions in `memory_crud` share one statement.

use rusqlite::{params, Connection};

use substrate_core::errors::RepositoryError;
use substrate_core::models::ProvenanceEvent;

pub fn insert_provenance_event_inner(
    conn: &Connection,
    event: &ProvenanceEvent,
) -> Result<(), RepositoryError> {
    conn.execute(
        "INSERT INTO memory_provenance (id, memory_id, kind, detail, occurred_at) VALUES (?1,?2,?3,?4,?5)",
        params![
            event.id.to_string(),
            event.memory_id.to_string(),
            kind_str(event.kind),
            event.detail,
            event.occurred_at.to_rfc3339(),
        ],
    )
    .map_err(|e| RepositoryError::DbError {
        reason: e.to_string(),
    })?;
    Ok(())
}

fn kind_str(kind: substrate_core::models::ProvenanceEventKind) -> &'static str {
    use substrate_core::models::ProvenanceEventKind::*;
    match kind {
        Created => "created",
        Updated => "updated",
        Deleted => "deleted",
        Superseded => "superseded",
        Consolidated => "consolidated",
        Imported => "imported",
    }
}
