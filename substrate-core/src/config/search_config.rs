use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// How BM25 and vector result sets are combined into one ranked list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FusionPolicy {
    /// Linear combination of normalized BM25 and vector scores, plus an
    /// importance boost.
    WeightedSum {
        /// Default: 0.3
        bm25_weight: f64,
        /// Default: 0.7
        vector_weight: f64,
        /// Default: 0.1
        importance_boost: f64,
    },
    /// Reciprocal rank fusion: `1 / (k + rank)` summed per source.
    Rrf {
        /// Default: 60
        k: u32,
    },
}

impl Default for FusionPolicy {
    fn default() -> Self {
        FusionPolicy::WeightedSum {
            bm25_weight: 0.3,
            vector_weight: 0.7,
            importance_boost: 0.1,
        }
    }
}

/// Tuning knobs for hybrid search (C8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridSearchConfig {
    pub fusion: FusionPolicy,
    /// Results returned from hybrid search. Default: 10
    pub result_limit: usize,
    /// Candidates pulled from each of BM25 and vector search before fusion. Default: 20
    pub per_source_limit: usize,
}

impl Default for HybridSearchConfig {
    fn default() -> Self {
        Self {
            fusion: FusionPolicy::default(),
            result_limit: 10,
            per_source_limit: 20,
        }
    }
}

impl HybridSearchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.result_limit == 0 {
            return Err(ConfigError("result_limit must be > 0".into()));
        }
        if self.per_source_limit == 0 {
            return Err(ConfigError("per_source_limit must be > 0".into()));
        }
        match &self.fusion {
            FusionPolicy::WeightedSum {
                bm25_weight,
                vector_weight,
                importance_boost,
            } => {
                for (name, w) in [
                    ("bm25_weight", bm25_weight),
                    ("vector_weight", vector_weight),
                    ("importance_boost", importance_boost),
                ] {
                    if !(0.0..=1.0).contains(w) {
                        return Err(ConfigError(format!("{name} must be in [0, 1]")));
                    }
                }
            }
            FusionPolicy::Rrf { k } => {
                if *k == 0 {
                    return Err(ConfigError("rrf k must be > 0".into()));
                }
            }
        }
        Ok(())
    }
}
