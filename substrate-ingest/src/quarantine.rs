//! Moves a malformed ingest file into the quarantine directory alongside a
//! sibling `.error` file recording why it was rejected.

use std::path::Path;

use crate::error::IngestError;

pub(crate) fn ensure_dir(dir: &Path) -> Result<(), IngestError> {
    std::fs::create_dir_all(dir).map_err(|e| IngestError::QuarantineSetup {
        path: dir.display().to_string(),
        reason: e.to_string(),
    })
}

/// Moves `source` into `quarantine_dir` (same file name) and writes
/// `{file_name}.error` next to it containing `reason`. Best-effort: a
/// failure here is logged, not propagated, since the scan must keep going.
pub(crate) fn quarantine_file(quarantine_dir: &Path, source: &Path, file_name: &str, reason: &str) {
    let dest = quarantine_dir.join(file_name);
    if let Err(e) = std::fs::rename(source, &dest) {
        tracing::warn!(file = %file_name, error = %e, "failed to move malformed file into quarantine");
        return;
    }
    let error_path = quarantine_dir.join(format!("{file_name}.error"));
    if let Err(e) = std::fs::write(&error_path, reason) {
        tracing::warn!(file = %file_name, error = %e, "failed to write quarantine error sibling");
    }
}
