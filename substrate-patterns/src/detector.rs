//! Pattern Detector (C10): scans recent memories for recurring clusters and
//! promotes the confident ones to preference long-term memories.

use std::sync::Arc;

use substrate_core::config::PatternDetectorConfig;
use substrate_core::memory::{Confidence, Importance, Layer, MemoryRecord, MemoryType, Provenance, SourceType};
use substrate_core::traits::{Clock, SystemClock};
use substrate_repository::{CreateMemoryInput, ListQuery, MemoryRepository};

use crate::clustering::build_clusters;
use crate::decay::decay_patterns;
use crate::error::PatternError;
use crate::pattern::DetectedPattern;

/// Upper bound on memories pulled per scan; the window filter then narrows
/// this down by recency. Mirrors the consolidation selection phase's
/// bulk-pull-then-filter-in-memory approach.
const SCAN_PAGE_SIZE: usize = 10_000;

pub struct PatternDetector {
    repository: Arc<MemoryRepository>,
    config: PatternDetectorConfig,
    clock: Arc<dyn Clock>,
}

impl PatternDetector {
    pub fn new(repository: Arc<MemoryRepository>, config: PatternDetectorConfig) -> Result<Self, PatternError> {
        Self::with_clock(repository, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        repository: Arc<MemoryRepository>,
        config: PatternDetectorConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PatternError> {
        config.validate()?;
        Ok(Self { repository, config, clock })
    }

    pub fn config(&self) -> &PatternDetectorConfig {
        &self.config
    }

    /// Scans memories created within the configured window, clusters them,
    /// and returns clusters whose confidence clears `confidence_threshold`,
    /// most confident first (ties broken by cluster id for determinism).
    pub fn detect(&self) -> Result<Vec<DetectedPattern>, PatternError> {
        let now = self.clock.now();
        let window_start = now - chrono::Duration::milliseconds(self.config.window_ms as i64);

        let query = ListQuery {
            limit: SCAN_PAGE_SIZE,
            ..ListQuery::default()
        };
        let candidates: Vec<MemoryRecord> = self
            .repository
            .list(&query)?
            .into_iter()
            .filter(|m| !m.is_superseded() && m.created_at >= window_start)
            .collect();

        let mut patterns = build_clusters(&candidates, &self.config, now);
        patterns.retain(|p| p.confidence >= self.config.confidence_threshold);
        decay_patterns(&mut patterns, &self.config, now);
        patterns.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.cluster_id.cmp(&b.cluster_id))
        });

        Ok(patterns)
    }

    /// Creates a preference LTM record from `pattern`, tagged
    /// `pattern-detected` and `pattern:{type}`, with the member ids joined
    /// into `provenance.conversation_id` as the evidence chain. Refuses
    /// patterns that haven't reached `promotion_threshold` — callers that
    /// want to promote everything `detect` returned should filter by that
    /// threshold explicitly first.
    pub fn promote_to_preference(&self, pattern: &DetectedPattern) -> Result<MemoryRecord, PatternError> {
        if pattern.confidence < self.config.promotion_threshold {
            return Err(PatternError::BelowPromotionThreshold {
                confidence: pattern.confidence,
                threshold: self.config.promotion_threshold,
            });
        }

        let mut input = CreateMemoryInput::new(
            pattern.representative_content.clone(),
            MemoryType::Preference,
            Layer::Ltm,
            Provenance {
                source_type: SourceType::Distilled,
                conversation_id: Some(pattern.evidence_chain()),
            },
        );
        input.tags = vec![
            "pattern-detected".to_string(),
            format!("pattern:{}", pattern.pattern_type),
        ];
        input.importance = Importance::new(pattern.confidence);
        input.confidence = Confidence::new(pattern.confidence);

        let record = self.repository.create(input)?;
        tracing::info!(
            pattern_id = %pattern.cluster_id,
            memory_id = %record.id,
            occurrences = pattern.occurrences,
            confidence = pattern.confidence,
            "promoted recurring pattern to preference"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use substrate_storage::StorageEngine;
    use tempfile::TempDir;

    fn setup() -> (Arc<MemoryRepository>, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(StorageEngine::open_in_memory().unwrap());
        let repository = Arc::new(MemoryRepository::new(storage, dir.path().join("memories")).unwrap());
        (repository, dir)
    }

    fn seed(repository: &MemoryRepository, content: &str) {
        repository
            .create(CreateMemoryInput::new(content, MemoryType::Observation, Layer::Stm, Provenance::implicit("conv-1")))
            .unwrap();
    }

    #[test]
    fn detect_finds_recurring_cluster_and_promotes_it() {
        let (repository, _dir) = setup();
        seed(&repository, "the user always reviews pull requests before lunch");
        seed(&repository, "the user reviews pull requests every morning before lunch");
        seed(&repository, "user reviews pull requests before having lunch");

        let mut config = PatternDetectorConfig::default();
        config.promotion_threshold = 0.0;
        config.confidence_threshold = 0.0;
        let detector = PatternDetector::new(repository.clone(), config).unwrap();

        let patterns = detector.detect().unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].occurrences, 3);

        let promoted = detector.promote_to_preference(&patterns[0]).unwrap();
        assert_eq!(promoted.memory_type, MemoryType::Preference);
        assert_eq!(promoted.layer, Layer::Ltm);
        assert!(promoted.tags.iter().any(|t| t == "pattern-detected"));
        assert_eq!(promoted.provenance.conversation_id.as_ref().unwrap().split(',').count(), 3);
    }

    #[test]
    fn promotion_below_threshold_is_rejected() {
        let (repository, _dir) = setup();
        let mut config = PatternDetectorConfig::default();
        config.promotion_threshold = 0.9;
        let detector = PatternDetector::new(repository, config).unwrap();

        let low_confidence = DetectedPattern {
            cluster_id: uuid::Uuid::new_v4(),
            pattern_type: "observation".to_string(),
            member_ids: vec![uuid::Uuid::new_v4()],
            representative_content: "x".to_string(),
            confidence: 0.2,
            first_seen: chrono::Utc::now(),
            last_seen: chrono::Utc::now(),
            occurrences: 3,
        };

        let err = detector.promote_to_preference(&low_confidence).unwrap_err();
        assert!(matches!(err, PatternError::BelowPromotionThreshold { .. }));
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let (repository, _dir) = setup();
        let mut config = PatternDetectorConfig::default();
        config.min_occurrences = 1;
        assert!(PatternDetector::new(repository, config).is_err());
    }
}
