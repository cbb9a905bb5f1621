use thiserror::Error;

/// Failures that abort a whole ingest run, as opposed to a single malformed
/// file (which is quarantined, not an error).
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read ingest directory {path}: {reason}")]
    DirectoryRead { path: String, reason: String },

    #[error("failed to prepare quarantine directory {path}: {reason}")]
    QuarantineSetup { path: String, reason: String },
}
