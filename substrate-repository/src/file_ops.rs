//! Temp-file-then-rename writes and best-effort unlinks for the Markdown
//! mirror. Kept separate from `repository.rs` so the dual-write closures
//! passed into `StorageEngine` stay one-liners.

use std::path::Path;

use substrate_core::errors::RepositoryError;
use uuid::Uuid;

/// Write `contents` to a uniquely named temp file in `dir`, then rename it
/// onto `target` — atomic on local filesystems. Cleans up the temp file if
/// the rename fails.
pub(crate) fn write_and_rename(dir: &Path, target: &Path, contents: &str) -> Result<(), RepositoryError> {
    let tmp_path = dir.join(format!(".tmp-{}.md", Uuid::new_v4()));
    std::fs::write(&tmp_path, contents).map_err(|e| RepositoryError::IoError {
        path: tmp_path.display().to_string(),
        reason: e.to_string(),
    })?;
    std::fs::rename(&tmp_path, target).map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        RepositoryError::IoError {
            path: target.display().to_string(),
            reason: e.to_string(),
        }
    })
}

/// Remove `path`, tolerating its absence — the delete protocol's file half.
pub(crate) fn unlink_tolerant(path: &Path) -> Result<(), RepositoryError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(RepositoryError::IoError {
            path: path.display().to_string(),
            reason: e.to_string(),
        }),
    }
}
