//! Memory Repository (C3): dual-write CRUD over the relational index and
//! its content-addressed Markdown mirror, plus reconciliation.
//!
//! Nothing above this crate should ever write to `memories`/`memory_fts` or
//! to a `.md` file directly — every mutation goes through
//! [`MemoryRepository`] so the two sides move together.

mod file_ops;
mod input;
mod reconcile;
mod repository;

pub use input::{CreateMemoryInput, ListQuery, UpdateMemoryInput};
pub use reconcile::{ContentMismatch, ReconciliationReport};
pub use repository::MemoryRepository;

pub use substrate_storage::ListFilter;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::time::{SystemTime, UNIX_EPOCH};
    use substrate_core::memory::{MemoryType, Provenance};
    use substrate_core::memory::Layer;
    use substrate_storage::StorageEngine;
    use tempfile::TempDir;

    fn fresh_repo() -> (MemoryRepository, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(StorageEngine::open_in_memory().unwrap());
        let repo = MemoryRepository::new(storage, dir.path().join("memories")).unwrap();
        (repo, dir)
    }

    fn unique_content(label: &str) -> String {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        format!("{label} {nanos}")
    }

    #[test]
    fn create_persists_both_db_row_and_file() {
        let (repo, _dir) = fresh_repo();
        let input = CreateMemoryInput::new(
            unique_content("the user prefers dark mode"),
            MemoryType::Preference,
            Layer::Stm,
            Provenance::explicit("conv-1"),
        );
        let record = repo.create(input).unwrap();

        let fetched = repo.get_by_id(record.id).unwrap().unwrap();
        assert_eq!(fetched.content, record.content);

        let file_name = substrate_codec::build_file_name(&record);
        assert!(repo.data_dir().join(file_name).exists());
    }

    #[test]
    fn create_rejects_blank_content() {
        let (repo, _dir) = fresh_repo();
        let input = CreateMemoryInput::new("   ", MemoryType::Fact, Layer::Stm, Provenance::explicit("conv-1"));
        assert!(repo.create(input).is_err());
    }

    #[test]
    fn update_rewrites_file_in_place() {
        let (repo, _dir) = fresh_repo();
        let input = CreateMemoryInput::new(
            unique_content("original content"),
            MemoryType::Fact,
            Layer::Stm,
            Provenance::explicit("conv-1"),
        );
        let record = repo.create(input).unwrap();
        let file_name = substrate_codec::build_file_name(&record);

        let mut changes = UpdateMemoryInput::default();
        changes.content = Some("revised content".to_string());
        let updated = repo.update(record.id, changes).unwrap();

        assert_eq!(updated.content, "revised content");
        assert_eq!(substrate_codec::build_file_name(&updated), file_name);
        let on_disk = substrate_codec::parse(&std::fs::read_to_string(repo.data_dir().join(&file_name)).unwrap()).unwrap();
        assert_eq!(on_disk.content, "revised content");
    }

    #[test]
    fn delete_removes_row_and_file() {
        let (repo, _dir) = fresh_repo();
        let input = CreateMemoryInput::new(
            unique_content("transient note"),
            MemoryType::Observation,
            Layer::Stm,
            Provenance::implicit("conv-2"),
        );
        let record = repo.create(input).unwrap();
        let file_name = substrate_codec::build_file_name(&record);

        repo.delete(record.id).unwrap();

        assert!(repo.get_by_id(record.id).unwrap().is_none());
        assert!(!repo.data_dir().join(file_name).exists());
    }

    #[test]
    fn delete_missing_is_not_found() {
        let (repo, _dir) = fresh_repo();
        let err = repo.delete(uuid::Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, substrate_core::errors::RepositoryError::NotFound { .. }));
    }

    #[test]
    fn reconcile_reports_orphaned_file() {
        let (repo, _dir) = fresh_repo();
        std::fs::write(repo.data_dir().join("not_tracked.md"), "---\nbroken\n---\n\nx\n").unwrap();

        let report = repo.reconcile().unwrap();
        assert_eq!(report.orphaned_files, vec!["not_tracked.md".to_string()]);
        assert!(report.missing_files.is_empty());
    }

    #[test]
    fn reconcile_reports_missing_file() {
        let (repo, _dir) = fresh_repo();
        let input = CreateMemoryInput::new(
            unique_content("will lose its file"),
            MemoryType::Fact,
            Layer::Stm,
            Provenance::explicit("conv-3"),
        );
        let record = repo.create(input).unwrap();
        let file_name = substrate_codec::build_file_name(&record);
        std::fs::remove_file(repo.data_dir().join(file_name)).unwrap();

        let report = repo.reconcile().unwrap();
        assert_eq!(report.missing_files, vec![record.id]);
    }

    #[test]
    fn reconcile_is_clean_after_create() {
        let (repo, _dir) = fresh_repo();
        let input = CreateMemoryInput::new(
            unique_content("nothing drifted"),
            MemoryType::Fact,
            Layer::Stm,
            Provenance::explicit("conv-4"),
        );
        repo.create(input).unwrap();

        assert!(repo.reconcile().unwrap().is_clean());
    }

    #[test]
    fn list_filters_by_memory_type() {
        let (repo, _dir) = fresh_repo();
        repo.create(CreateMemoryInput::new(
            unique_content("a fact"),
            MemoryType::Fact,
            Layer::Stm,
            Provenance::explicit("conv-5"),
        ))
        .unwrap();
        repo.create(CreateMemoryInput::new(
            unique_content("a preference"),
            MemoryType::Preference,
            Layer::Stm,
            Provenance::explicit("conv-5"),
        ))
        .unwrap();

        let mut query = ListQuery::default();
        query.filter.memory_type = Some(MemoryType::Preference);
        let results = repo.list(&query).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].memory_type, MemoryType::Preference);
    }

    proptest! {
        #[test]
        fn create_then_get_preserves_arbitrary_scores(
            importance in 0.0f64..1.0,
            confidence in 0.0f64..1.0,
        ) {
            let (repo, _dir) = fresh_repo();
            let mut input = CreateMemoryInput::new(
                unique_content("arbitrary score memory"),
                MemoryType::Fact,
                Layer::Stm,
                Provenance::explicit("conv-proptest"),
            );
            input.importance = substrate_core::memory::Importance::new(importance);
            input.confidence = substrate_core::memory::Confidence::new(confidence);

            let record = repo.create(input).unwrap();
            let fetched = repo.get_by_id(record.id).unwrap().unwrap();

            prop_assert!((fetched.importance.value() - importance).abs() < 1e-9);
            prop_assert!((fetched.confidence.value() - confidence).abs() < 1e-9);
        }
    }
}
