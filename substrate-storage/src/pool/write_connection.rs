//! The single writer connection. All mutations funnel through this handle,
//! serialized by the `Mutex` — SQLite only ever sees one writer at a time,
//! which is what `BEGIN IMMEDIATE` relies on to fail fast instead of
//! deadlocking against the read pool.

use std::path::Path;

use rusqlite::Connection;
use substrate_core::errors::RepositoryError;

use super::pragmas::apply_pragmas;

pub struct WriteConnection {
    conn: std::sync::Mutex<Connection>,
}

impl WriteConnection {
    pub fn open(path: &Path) -> Result<Self, RepositoryError> {
        let conn = Connection::open(path).map_err(|e| RepositoryError::DbError {
            reason: e.to_string(),
        })?;
        apply_pragmas(&conn)?;
        Ok(Self {
            conn: std::sync::Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        let conn = Connection::open_in_memory().map_err(|e| RepositoryError::DbError {
            reason: e.to_string(),
        })?;
        apply_pragmas(&conn)?;
        Ok(Self {
            conn: std::sync::Mutex::new(conn),
        })
    }

    /// Execute a closure with exclusive access to the writer connection.
    pub fn with_conn<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<String>,
    {
        let guard = self
            .conn
            .lock()
            .map_err(|e| E::from(format!("writer lock poisoned: {e}")))?;
        f(&guard)
    }
}
