use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Tuning knobs for the STM -> LTM consolidation pipeline (C9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    /// How often the scheduler triggers a run, in milliseconds. Default: 6h
    pub interval_ms: u64,
    /// Maximum candidates selected per run. Default: 200
    pub max_candidates_per_run: usize,
    /// Minimum age a short-term memory must reach before it is eligible. Default: 1h
    pub min_candidate_age_ms: u64,
    /// Retries allowed for a candidate before it is abandoned. Default: 3
    pub max_retries: u32,
    /// Upper bound on distilled output tokens per cluster, enforced before
    /// the distillation provider is called. Default: 512
    pub max_output_tokens: usize,
    /// Whether to run HDBSCAN pre-clustering ahead of distillation, instead
    /// of treating every selected candidate as one cluster.
    pub enable_pre_clustering: bool,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            interval_ms: 6 * 60 * 60 * 1000,
            max_candidates_per_run: 200,
            min_candidate_age_ms: 60 * 60 * 1000,
            max_retries: 3,
            max_output_tokens: 512,
            enable_pre_clustering: true,
        }
    }
}

impl ConsolidationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms == 0 {
            return Err(ConfigError("interval_ms must be > 0".into()));
        }
        if self.max_candidates_per_run == 0 {
            return Err(ConfigError("max_candidates_per_run must be > 0".into()));
        }
        if self.max_output_tokens == 0 {
            return Err(ConfigError("max_output_tokens must be > 0".into()));
        }
        Ok(())
    }
}
