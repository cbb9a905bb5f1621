use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Tuning knobs for embedding storage and reindexing (C4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReindexConfig {
    /// Records embedded per batch during a reindex. Default: 64
    pub batch_size: usize,
    /// Fraction of a batch spot-checked against the prior provider's
    /// vectors for sanity. Default: 0.05
    pub validation_sample_rate: f64,
    /// Minimum cosine similarity a sampled pair must clear to pass
    /// validation. Default: 0.9
    pub min_validation_similarity: f64,
}

impl Default for ReindexConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            validation_sample_rate: 0.05,
            min_validation_similarity: 0.9,
        }
    }
}

impl ReindexConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError("batch_size must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.validation_sample_rate) {
            return Err(ConfigError("validation_sample_rate must be in [0, 1]".into()));
        }
        if !(0.0..=1.0).contains(&self.min_validation_similarity) {
            return Err(ConfigError(
                "min_validation_similarity must be in [0, 1]".into(),
            ));
        }
        Ok(())
    }
}
