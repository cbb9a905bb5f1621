//! Confidence decay for patterns that stop recurring (C10 §4.10,
//! `decayPatterns`). A pattern not reinforced within its detection window
//! loses confidence geometrically per window elapsed since it was last seen,
//! and is dropped once it falls below the detector's confidence floor.

use chrono::{DateTime, Utc};
use substrate_core::config::PatternDetectorConfig;

use crate::pattern::DetectedPattern;

/// Applies decay in place and removes patterns that fall below
/// `config.confidence_threshold`. Patterns still within the window are left
/// untouched.
pub fn decay_patterns(patterns: &mut Vec<DetectedPattern>, config: &PatternDetectorConfig, now: DateTime<Utc>) {
    patterns.retain_mut(|pattern| {
        let age_ms = (now - pattern.last_seen).num_milliseconds().max(0) as u64;
        if age_ms <= config.window_ms {
            return true;
        }
        let windows_elapsed = age_ms as f64 / config.window_ms as f64;
        pattern.confidence *= config.daily_decay_factor.powf(windows_elapsed);
        pattern.confidence >= config.confidence_threshold
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn pattern(confidence: f64, last_seen: DateTime<Utc>) -> DetectedPattern {
        DetectedPattern {
            cluster_id: Uuid::new_v4(),
            pattern_type: "observation".to_string(),
            member_ids: vec![],
            representative_content: "x".to_string(),
            confidence,
            first_seen: last_seen,
            last_seen,
            occurrences: 3,
        }
    }

    #[test]
    fn patterns_within_window_are_untouched() {
        let config = PatternDetectorConfig::default();
        let now = Utc::now();
        let mut patterns = vec![pattern(0.8, now)];
        decay_patterns(&mut patterns, &config, now);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].confidence, 0.8);
    }

    #[test]
    fn stale_patterns_decay_and_are_dropped_below_threshold() {
        let mut config = PatternDetectorConfig::default();
        config.daily_decay_factor = 0.1;
        config.confidence_threshold = 0.5;
        let now = Utc::now();
        let last_seen = now - chrono::Duration::milliseconds((config.window_ms * 2) as i64);

        let mut patterns = vec![pattern(0.6, last_seen)];
        decay_patterns(&mut patterns, &config, now);
        assert!(patterns.is_empty());
    }

    #[test]
    fn stale_but_still_confident_patterns_survive() {
        let mut config = PatternDetectorConfig::default();
        config.daily_decay_factor = 0.99;
        config.confidence_threshold = 0.1;
        let now = Utc::now();
        let last_seen = now - chrono::Duration::milliseconds((config.window_ms as f64 * 1.1) as i64);

        let mut patterns = vec![pattern(0.9, last_seen)];
        decay_patterns(&mut patterns, &config, now);
        assert_eq!(patterns.len(), 1);
        assert!(patterns[0].confidence < 0.9);
    }
}
