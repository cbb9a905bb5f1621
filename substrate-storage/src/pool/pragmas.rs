//! PRAGMA configuration applied to every SQLite connection.

use rusqlite::Connection;
use substrate_core::errors::RepositoryError;

/// Applied to the single writer connection: WAL mode, NORMAL sync, 256MB
/// mmap, 64MB cache, 5s busy_timeout, foreign_keys ON, incremental
/// auto_vacuum.
pub fn apply_pragmas(conn: &Connection) -> Result<(), RepositoryError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA mmap_size = 268435456;
        PRAGMA cache_size = -64000;
        PRAGMA busy_timeout = 5000;
        PRAGMA foreign_keys = ON;
        PRAGMA auto_vacuum = INCREMENTAL;
        ",
    )
    .map_err(|e| RepositoryError::DbError {
        reason: e.to_string(),
    })?;
    Ok(())
}

/// Applied to read-pool connections: same durability posture minus the
/// writer-only pragmas that don't apply to a read-only handle.
pub fn apply_read_pragmas(conn: &Connection) -> Result<(), RepositoryError> {
    conn.execute_batch(
        "
        PRAGMA synchronous = NORMAL;
        PRAGMA mmap_size = 268435456;
        PRAGMA cache_size = -32000;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .map_err(|e| RepositoryError::DbError {
        reason: e.to_string(),
    })?;
    Ok(())
}

/// Verify that WAL mode is active on a connection.
pub fn verify_wal_mode(conn: &Connection) -> Result<bool, RepositoryError> {
    let mode: String = conn
        .pragma_query_value(None, "journal_mode", |row| row.get(0))
        .map_err(|e| RepositoryError::DbError {
            reason: e.to_string(),
        })?;
    Ok(mode.eq_ignore_ascii_case("wal"))
}
