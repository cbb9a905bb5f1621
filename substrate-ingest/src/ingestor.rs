use std::path::{Path, PathBuf};
use std::sync::Arc;

use substrate_core::models::ProvenanceEventKind;
use substrate_repository::{CreateMemoryInput, MemoryRepository};

use crate::error::IngestError;
use crate::quarantine;
use crate::report::IngestReport;

const MARKDOWN_SUFFIX: &str = ".md";
const TEMP_PREFIX: &str = ".tmp-";
const ERROR_SUFFIX: &str = ".error";

/// Sidecar import (C13): walks a directory of externally authored Markdown
/// memory files, persisting each well-formed one through the repository and
/// quarantining anything that fails to parse instead of aborting the batch.
pub struct Ingestor {
    repository: Arc<MemoryRepository>,
    quarantine_dir: PathBuf,
}

impl Ingestor {
    pub fn new(repository: Arc<MemoryRepository>, quarantine_dir: impl Into<PathBuf>) -> Self {
        Self {
            repository,
            quarantine_dir: quarantine_dir.into(),
        }
    }

    /// Lists `.md` files directly inside `dir` (non-recursive), parses each,
    /// and either persists it or quarantines it. Returns a report; a single
    /// file's I/O failure is recorded in `report.errors` and does not stop
    /// the rest of the batch.
    pub fn scan_directory(&self, dir: &Path) -> Result<IngestReport, IngestError> {
        quarantine::ensure_dir(&self.quarantine_dir)?;

        let entries = std::fs::read_dir(dir).map_err(|e| IngestError::DirectoryRead {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut report = IngestReport::default();

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    report.errors.push(format!("failed to read directory entry: {e}"));
                    continue;
                }
            };
            let path = entry.path();
            if !is_candidate_file(&path) {
                continue;
            }
            let file_name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => {
                    report.errors.push(format!("skipping non-UTF-8 file name: {}", path.display()));
                    continue;
                }
            };

            match self.ingest_one(&path) {
                Ok(()) => {
                    report.processed += 1;
                }
                Err(reason) => {
                    tracing::warn!(file = %file_name, %reason, "quarantining malformed ingest file");
                    quarantine::quarantine_file(&self.quarantine_dir, &path, &file_name, &reason);
                    report.quarantined += 1;
                }
            }
        }

        Ok(report)
    }

    /// Reads and parses one file, persisting it on success. The `Err` case
    /// is not an [`IngestError`] — it's the quarantine reason string, since
    /// a malformed file is an expected outcome, not an aborting failure.
    fn ingest_one(&self, path: &Path) -> Result<(), String> {
        let text = std::fs::read_to_string(path).map_err(|e| format!("failed to read file: {e}"))?;
        let parsed = substrate_codec::parse(&text).map_err(|e| format!("failed to parse frontmatter: {e}"))?;

        let mut input = CreateMemoryInput::new(parsed.content, parsed.memory_type, parsed.layer, parsed.provenance);
        input.importance = parsed.importance;
        input.confidence = parsed.confidence;
        input.tags = parsed.tags;
        input.entities = parsed.entities;
        input.supersedes = parsed.supersedes;
        input.message_id = parsed.message_id;
        input.provenance_event_kind = Some(ProvenanceEventKind::Imported);

        self.repository
            .create(input)
            .map_err(|e| format!("failed to persist memory: {e}"))?;

        Ok(())
    }
}

fn is_candidate_file(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(MARKDOWN_SUFFIX) && !name.starts_with(TEMP_PREFIX) && !name.ends_with(ERROR_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use substrate_storage::StorageEngine;
    use tempfile::TempDir;

    fn fresh_ingestor() -> (Ingestor, TempDir, TempDir) {
        let storage_dir = TempDir::new().unwrap();
        let scan_dir = TempDir::new().unwrap();
        let storage = Arc::new(StorageEngine::open_in_memory().unwrap());
        let repository = Arc::new(MemoryRepository::new(storage, storage_dir.path().join("memories")).unwrap());
        let ingestor = Ingestor::new(repository, storage_dir.path().join("quarantine"));
        (ingestor, storage_dir, scan_dir)
    }

    fn well_formed_file() -> String {
        let now = chrono::Utc::now();
        format!(
            "---\nid: {}\nversion: 1\ntype: fact\nlayer: stm\nimportance: 0.5\nconfidence: 0.5\nsource:\n  type: explicit\n  conversationId: conv-import\ncreatedAt: {}\nupdatedAt: {}\naccessedAt: {}\n---\n\nthe user's timezone is UTC\n",
            uuid::Uuid::new_v4(),
            now.to_rfc3339(),
            now.to_rfc3339(),
            now.to_rfc3339(),
        )
    }

    #[test]
    fn well_formed_file_is_processed() {
        let (ingestor, _storage_dir, scan_dir) = fresh_ingestor();
        std::fs::write(scan_dir.path().join("note.md"), well_formed_file()).unwrap();

        let report = ingestor.scan_directory(scan_dir.path()).unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.quarantined, 0);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn malformed_file_is_quarantined_not_aborted() {
        let (ingestor, storage_dir, scan_dir) = fresh_ingestor();
        std::fs::write(scan_dir.path().join("garbage.md"), "not even frontmatter").unwrap();
        std::fs::write(scan_dir.path().join("note.md"), well_formed_file()).unwrap();

        let report = ingestor.scan_directory(scan_dir.path()).unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.quarantined, 1);
        assert!(report.errors.is_empty());

        let quarantine_dir = storage_dir.path().join("quarantine");
        assert!(quarantine_dir.join("garbage.md").exists());
        assert!(quarantine_dir.join("garbage.md.error").exists());
    }

    #[test]
    fn non_markdown_files_are_ignored() {
        let (ingestor, _storage_dir, scan_dir) = fresh_ingestor();
        std::fs::write(scan_dir.path().join("readme.txt"), "ignore me").unwrap();

        let report = ingestor.scan_directory(scan_dir.path()).unwrap();

        assert_eq!(report.processed, 0);
        assert_eq!(report.quarantined, 0);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let (ingestor, storage_dir, _scan_dir) = fresh_ingestor();
        let err = ingestor.scan_directory(&storage_dir.path().join("does-not-exist")).unwrap_err();
        assert!(matches!(err, IngestError::DirectoryRead { .. }));
    }
}
