//! Stage 3-4: Merge and Write (C9 §4.9). For each draft, searches existing
//! LTM for a near-duplicate; reinforces it if found, otherwise writes a
//! fresh LTM record. Both paths go through [`MemoryRepository`], so they
//! inherit the dual-write guarantee.

use uuid::Uuid;

use substrate_core::errors::ConsolidationError;
use substrate_core::memory::{Confidence, Importance, Layer, MemoryRecord, MemoryType, Provenance};
use substrate_core::models::ProvenanceEventKind;
use substrate_core::traits::DistillationOutcome;
use substrate_repository::{CreateMemoryInput, MemoryRepository, UpdateMemoryInput};
use substrate_retrieval::{HybridSearch, HybridSearchFilter};

/// How much a reinforced LTM record's importance is nudged on each match.
const REINFORCEMENT_STEP: f64 = 0.1;

/// Outcome of merging one draft against existing long-term memory.
pub enum MergeOutcome {
    Created(MemoryRecord),
    Reinforced(MemoryRecord),
}

/// Merges a single distilled `draft` sourced from `source_ids` (the STM
/// memories that produced it) into long-term memory.
pub async fn merge_draft(
    repository: &MemoryRepository,
    hybrid: &HybridSearch,
    draft: &DistillationOutcome,
    source_ids: &[Uuid],
    duplicate_threshold: f64,
) -> Result<MergeOutcome, ConsolidationError> {
    let filter = HybridSearchFilter {
        memory_type: None,
        layer: Some(Layer::Ltm),
        min_score: None,
    };
    let hits = hybrid
        .search(&draft.content, &filter)
        .await
        .map_err(|e| ConsolidationError::ConsolidationFailed { reason: e.to_string() })?;

    let first_source = source_ids.first().copied();

    if let Some(top) = hits.first() {
        if top.score >= duplicate_threshold {
            let mut changes = UpdateMemoryInput::default();
            changes.importance = Some(top.memory.importance + Importance::new(REINFORCEMENT_STEP));
            if let Some(source_id) = first_source {
                if top.memory.supersedes.is_none() {
                    changes.supersedes = Some(source_id);
                }
            }
            let reinforced = repository
                .update(top.memory.id, changes)
                .map_err(|e| ConsolidationError::MergeConflict {
                    candidate_id: top.memory.id.to_string(),
                    reason: e.to_string(),
                })?;
            return Ok(MergeOutcome::Reinforced(reinforced));
        }
    }

    let mut input = CreateMemoryInput::new(draft.content.clone(), MemoryType::Fact, Layer::Ltm, Provenance::distilled());
    input.confidence = Confidence::new(draft.confidence);
    input.tags = vec!["consolidated".to_string()];
    input.supersedes = first_source;
    input.provenance_event_kind = Some(ProvenanceEventKind::Consolidated);

    let created = repository
        .create(input)
        .map_err(|e| ConsolidationError::ConsolidationFailed { reason: e.to_string() })?;
    Ok(MergeOutcome::Created(created))
}
