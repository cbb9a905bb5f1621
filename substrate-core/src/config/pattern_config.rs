use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Tuning knobs for recurring-pattern detection and preference promotion (C10).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternDetectorConfig {
    /// Minimum cluster size before a pattern is considered recurring. Must be >= 2. Default: 3
    pub min_occurrences: u32,
    /// Width of the sliding window patterns are detected over, in
    /// milliseconds. Must be > 0. Default: 30 days
    pub window_ms: u64,
    /// Blended-similarity floor (0.7 * content Jaccard + 0.3 * topic token
    /// overlap) for clustering memories together. Default: 0.18
    pub similarity_threshold: f64,
    /// Confidence a cluster must reach to be reported at all. Default: 0.5
    pub confidence_threshold: f64,
    /// Confidence a cluster must reach before it is promoted to a
    /// preference long-term memory. Must be >= confidence_threshold. Default: 0.75
    pub promotion_threshold: f64,
    /// Multiplicative decay applied to confidence per day without
    /// reinforcement. Default: 0.98
    pub daily_decay_factor: f64,
}

impl Default for PatternDetectorConfig {
    fn default() -> Self {
        Self {
            min_occurrences: 3,
            window_ms: 30 * 24 * 60 * 60 * 1000,
            similarity_threshold: 0.18,
            confidence_threshold: 0.5,
            promotion_threshold: 0.75,
            daily_decay_factor: 0.98,
        }
    }
}

impl PatternDetectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_occurrences < 2 {
            return Err(ConfigError("min_occurrences must be >= 2".into()));
        }
        if self.window_ms == 0 {
            return Err(ConfigError("window_ms must be > 0".into()));
        }
        for (name, v) in [
            ("similarity_threshold", self.similarity_threshold),
            ("confidence_threshold", self.confidence_threshold),
            ("promotion_threshold", self.promotion_threshold),
            ("daily_decay_factor", self.daily_decay_factor),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(ConfigError(format!("{name} must be in [0, 1]")));
            }
        }
        if self.promotion_threshold < self.confidence_threshold {
            return Err(ConfigError(
                "promotion_threshold must be >= confidence_threshold".into(),
            ));
        }
        Ok(())
    }
}
