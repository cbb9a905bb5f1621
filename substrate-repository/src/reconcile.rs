//! Reconciliation (C3 §4.3): walks the data directory and the `memories`
//! table and reports drift between them. Strictly read-only — this never
//! repairs anything, it only tells the caller where the two sides disagree.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use substrate_core::errors::RepositoryError;
use substrate_storage::StorageEngine;
use uuid::Uuid;

/// A file whose parsed content disagrees with its matching DB row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentMismatch {
    pub id: Uuid,
    pub file_name: String,
}

/// Result of a reconciliation scan. Never mutates either side.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationReport {
    /// Files on disk with no matching DB row, including files that failed
    /// to read or parse at all.
    pub orphaned_files: Vec<String>,
    /// DB rows with no file on disk.
    pub missing_files: Vec<Uuid>,
    /// Files that parse and match a DB row by id, but whose content differs.
    pub content_mismatches: Vec<ContentMismatch>,
    pub scanned_files: usize,
    pub scanned_records: usize,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.orphaned_files.is_empty() && self.missing_files.is_empty() && self.content_mismatches.is_empty()
    }

    pub fn drift_count(&self) -> usize {
        self.orphaned_files.len() + self.missing_files.len() + self.content_mismatches.len()
    }
}

/// Generous ceiling on records considered in one reconciliation pass. A
/// deployment with more memories than this needs a paginated scan, which
/// isn't implemented here.
const RECONCILE_SCAN_LIMIT: usize = 10_000_000;

pub(crate) fn scan(storage: &StorageEngine, data_dir: &Path) -> Result<ReconciliationReport, RepositoryError> {
    let db_records = storage.list_all(RECONCILE_SCAN_LIMIT)?;
    let db_by_id: HashMap<Uuid, String> = db_records.iter().map(|r| (r.id, r.content.clone())).collect();
    let mut seen_ids: HashSet<Uuid> = HashSet::new();
    let mut orphaned_files = Vec::new();
    let mut content_mismatches = Vec::new();
    let mut scanned_files = 0usize;

    let entries = std::fs::read_dir(data_dir).map_err(|e| RepositoryError::IoError {
        path: data_dir.display().to_string(),
        reason: e.to_string(),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| RepositoryError::IoError {
            path: data_dir.display().to_string(),
            reason: e.to_string(),
        })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();
        if file_name.starts_with(".tmp-") {
            continue;
        }
        scanned_files += 1;

        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(_) => {
                orphaned_files.push(file_name);
                continue;
            }
        };
        let parsed = match substrate_codec::parse(&text) {
            Ok(p) => p,
            Err(_) => {
                orphaned_files.push(file_name);
                continue;
            }
        };

        match db_by_id.get(&parsed.id) {
            None => orphaned_files.push(file_name),
            Some(db_content) => {
                seen_ids.insert(parsed.id);
                if db_content != &parsed.content {
                    content_mismatches.push(ContentMismatch {
                        id: parsed.id,
                        file_name,
                    });
                }
            }
        }
    }

    let mut missing_files: Vec<Uuid> = db_by_id.keys().filter(|id| !seen_ids.contains(id)).copied().collect();
    missing_files.sort();
    orphaned_files.sort();
    content_mismatches.sort_by_key(|m| m.id);

    Ok(ReconciliationReport {
        orphaned_files,
        missing_files,
        content_mismatches,
        scanned_files,
        scanned_records: db_records.len(),
    })
}
