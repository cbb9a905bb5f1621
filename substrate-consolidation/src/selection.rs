//! Stage 1: Select (C9 §4.9). Pulls STM candidates older than a watermark
//! or already marked `pending`, plus `failed` candidates still eligible for
//! retry, and transitions them to `selected`.

use chrono::{DateTime, Utc};
use substrate_core::config::ConsolidationConfig;
use substrate_core::errors::ConsolidationError;
use substrate_core::memory::{Layer, MemoryRecord};
use substrate_core::models::{CandidateState, CandidateStatus};
use substrate_repository::MemoryRepository;
use substrate_storage::StorageEngine;

/// A selected candidate paired with its current retry state.
pub struct SelectedCandidate {
    pub memory: MemoryRecord,
    pub state: CandidateState,
}

/// Runs the selection phase and returns the candidates chosen for this run,
/// each already transitioned to [`CandidateStatus::Selected`].
pub fn select_candidates(
    storage: &StorageEngine,
    repository: &MemoryRepository,
    config: &ConsolidationConfig,
    now: DateTime<Utc>,
) -> Result<Vec<SelectedCandidate>, ConsolidationError> {
    register_untracked_stm(storage, repository, config, now)?;

    let mut chosen_ids: Vec<(String, CandidateState)> = Vec::new();

    for memory_id in storage
        .candidates_by_status(CandidateStatus::Pending, config.max_candidates_per_run)
        .map_err(storage_err)?
    {
        if let Some(state) = storage.get_candidate(&memory_id).map_err(storage_err)? {
            chosen_ids.push((memory_id, state));
        }
    }

    if chosen_ids.len() < config.max_candidates_per_run {
        let remaining = config.max_candidates_per_run - chosen_ids.len();
        for memory_id in storage.candidates_by_status(CandidateStatus::Failed, remaining).map_err(storage_err)? {
            if let Some(state) = storage.get_candidate(&memory_id).map_err(storage_err)? {
                if state.can_retry(config.max_retries) {
                    chosen_ids.push((memory_id, state));
                }
            }
        }
    }

    chosen_ids.truncate(config.max_candidates_per_run);

    let mut selected = Vec::with_capacity(chosen_ids.len());
    for (memory_id, mut state) in chosen_ids {
        let Some(memory) = storage.get_memory(&memory_id).map_err(storage_err)? else {
            continue;
        };
        state.status = CandidateStatus::Selected;
        state.updated_at = now;
        storage.upsert_candidate(&state).map_err(storage_err)?;
        selected.push(SelectedCandidate { memory, state });
    }

    Ok(selected)
}

/// Registers every STM memory older than `min_candidate_age_ms` that has
/// never been tracked in `consolidation_candidates` as `pending`, so the
/// pull above picks it up. Memories already tracked (in any status) are
/// left alone here.
fn register_untracked_stm(
    storage: &StorageEngine,
    repository: &MemoryRepository,
    config: &ConsolidationConfig,
    now: DateTime<Utc>,
) -> Result<(), ConsolidationError> {
    let stm_memories = repository
        .find_by_layer(Layer::Stm, 10_000)
        .map_err(|e| ConsolidationError::ConsolidationFailed { reason: e.to_string() })?;

    let min_age = chrono::Duration::milliseconds(config.min_candidate_age_ms as i64);

    for memory in stm_memories {
        if memory.is_superseded() {
            continue;
        }
        if now - memory.created_at < min_age {
            continue;
        }
        if storage.get_candidate(&memory.id.to_string()).map_err(storage_err)?.is_some() {
            continue;
        }
        let state = CandidateState::pending(memory.id, now);
        storage.upsert_candidate(&state).map_err(storage_err)?;
    }

    Ok(())
}

fn storage_err(e: substrate_core::errors::RepositoryError) -> ConsolidationError {
    ConsolidationError::ConsolidationFailed { reason: e.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use substrate_core::memory::{MemoryType, Provenance};
    use substrate_core::traits::{Clock, SystemClock};
    use substrate_repository::CreateMemoryInput;
    use tempfile::TempDir;

    struct FixedClock(DateTime<Utc>);
    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn setup(age_ms: i64) -> (Arc<StorageEngine>, MemoryRepository, TempDir, DateTime<Utc>) {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(StorageEngine::open_in_memory().unwrap());
        let created_at = Utc::now() - chrono::Duration::milliseconds(age_ms);
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(created_at));
        let repository =
            MemoryRepository::with_clock(storage.clone(), dir.path().join("memories"), clock.clone()).unwrap();
        (storage, repository, dir, created_at)
    }

    #[test]
    fn selects_stm_memories_past_the_age_watermark() {
        let (storage, repository, _dir, _created_at) = setup(2 * 60 * 60 * 1000);
        repository
            .create(CreateMemoryInput::new(
                "user always reviews PRs before lunch",
                MemoryType::Observation,
                Layer::Stm,
                Provenance::implicit("conv-1"),
            ))
            .unwrap();

        let config = ConsolidationConfig::default();
        let selected = select_candidates(&storage, &repository, &config, Utc::now()).unwrap();

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].state.status, CandidateStatus::Selected);
    }

    #[test]
    fn does_not_select_memories_younger_than_watermark() {
        let (storage, repository, _dir, _created_at) = setup(0);
        repository
            .create(CreateMemoryInput::new(
                "fresh observation",
                MemoryType::Observation,
                Layer::Stm,
                Provenance::implicit("conv-1"),
            ))
            .unwrap();

        let config = ConsolidationConfig::default();
        let selected = select_candidates(&storage, &repository, &config, Utc::now()).unwrap();
        assert!(selected.is_empty());
    }

    #[test]
    fn respects_max_candidates_per_run() {
        let (storage, repository, _dir, _created_at) = setup(2 * 60 * 60 * 1000);
        for i in 0..5 {
            repository
                .create(CreateMemoryInput::new(
                    format!("observation number {i}"),
                    MemoryType::Observation,
                    Layer::Stm,
                    Provenance::implicit("conv-1"),
                ))
                .unwrap();
        }

        let mut config = ConsolidationConfig::default();
        config.max_candidates_per_run = 2;
        let selected = select_candidates(&storage, &repository, &config, Utc::now()).unwrap();
        assert_eq!(selected.len(), 2);
    }
}
