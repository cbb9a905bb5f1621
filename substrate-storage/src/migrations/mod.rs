pub mod v001_init;

use rusqlite::Connection;
use substrate_core::errors::RepositoryError;

/// Ordered list of migrations applied from a fresh database.
const MIGRATIONS: &[(i64, fn(&Connection) -> Result<(), RepositoryError>)] =
    &[(1, v001_init::migrate)];

/// Runs every migration newer than the database's current `schema_version`,
/// each inside its own transaction.
pub fn run_migrations(conn: &Connection) -> Result<(), RepositoryError> {
    let current: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    for (version, migrate) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        let tx = conn.unchecked_transaction().map_err(|e| RepositoryError::DbError {
            reason: e.to_string(),
        })?;
        migrate(&tx)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
            .map_err(|e| RepositoryError::DbError {
                reason: e.to_string(),
            })?;
        tx.commit().map_err(|e| RepositoryError::DbError {
            reason: e.to_string(),
        })?;
    }
    Ok(())
}
