//! Initial schema: memories, embeddings, provenance log, FTS5 index, and the
//! consolidation candidate-state table.

use rusqlite::Connection;
use substrate_core::errors::RepositoryError;

pub fn migrate(conn: &Connection) -> Result<(), RepositoryError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS memories (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            memory_type TEXT NOT NULL,
            layer TEXT NOT NULL,
            importance REAL NOT NULL,
            confidence REAL NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]',
            entities TEXT NOT NULL DEFAULT '[]',
            source_type TEXT NOT NULL,
            conversation_id TEXT,
            supersedes TEXT,
            superseded_by TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            accessed_at TEXT NOT NULL,
            access_count INTEGER NOT NULL DEFAULT 0,
            checksum TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_memories_layer ON memories(layer);
        CREATE INDEX IF NOT EXISTS idx_memories_type ON memories(memory_type);
        CREATE INDEX IF NOT EXISTS idx_memories_source_type ON memories(source_type);
        CREATE INDEX IF NOT EXISTS idx_memories_importance ON memories(importance DESC);
        CREATE INDEX IF NOT EXISTS idx_memories_created_at ON memories(created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_memories_superseded_by ON memories(superseded_by);
        CREATE INDEX IF NOT EXISTS idx_memories_accessed_at ON memories(accessed_at);

        CREATE VIRTUAL TABLE IF NOT EXISTS memory_fts USING fts5(
            content,
            tags_flat,
            content='memories',
            content_rowid='rowid'
        );

        CREATE TRIGGER IF NOT EXISTS memories_ai AFTER INSERT ON memories BEGIN
            INSERT INTO memory_fts(rowid, content, tags_flat)
            VALUES (new.rowid, new.content, new.tags);
        END;

        CREATE TRIGGER IF NOT EXISTS memories_ad AFTER DELETE ON memories BEGIN
            INSERT INTO memory_fts(memory_fts, rowid, content, tags_flat)
            VALUES ('delete', old.rowid, old.content, old.tags);
        END;

        CREATE TRIGGER IF NOT EXISTS memories_au AFTER UPDATE ON memories BEGIN
            INSERT INTO memory_fts(memory_fts, rowid, content, tags_flat)
            VALUES ('delete', old.rowid, old.content, old.tags);
            INSERT INTO memory_fts(rowid, content, tags_flat)
            VALUES (new.rowid, new.content, new.tags);
        END;

        CREATE TABLE IF NOT EXISTS memory_embeddings (
            memory_id TEXT NOT NULL,
            provider_id TEXT NOT NULL,
            model_id TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            embedding BLOB NOT NULL,
            dimensions INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (memory_id, provider_id, model_id),
            FOREIGN KEY (memory_id) REFERENCES memories(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_embeddings_provider_model
            ON memory_embeddings(provider_id, model_id);

        CREATE TABLE IF NOT EXISTS memory_provenance (
            id TEXT PRIMARY KEY,
            memory_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            detail TEXT,
            occurred_at TEXT NOT NULL,
            FOREIGN KEY (memory_id) REFERENCES memories(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_provenance_memory_id ON memory_provenance(memory_id);

        CREATE TABLE IF NOT EXISTS consolidation_candidates (
            memory_id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            retry_count INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (memory_id) REFERENCES memories(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_candidates_status ON consolidation_candidates(status);
        ",
    )
    .map_err(|e| RepositoryError::DbError {
        reason: format!("v001_init: {e}"),
    })?;
    Ok(())
}
