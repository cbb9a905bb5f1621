use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::circuit_breaker_config::CircuitBreakerConfig;
use super::consolidation_config::ConsolidationConfig;
use super::error::ConfigError;
use super::pattern_config::PatternDetectorConfig;
use super::reindex_config::ReindexConfig;
use super::search_config::HybridSearchConfig;

/// Top-level configuration for the memory service, assembled from defaults
/// and overridden by environment variables at `initialize()` time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub embedding_provider: String,
    pub embedding_model: String,
    pub search: HybridSearchConfig,
    pub consolidation: ConsolidationConfig,
    pub reindex: ReindexConfig,
    pub patterns: PatternDetectorConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./memory.db"),
            data_dir: PathBuf::from("./memory"),
            embedding_provider: "onnx".to_string(),
            embedding_model: "all-MiniLM-L6-v2".to_string(),
            search: HybridSearchConfig::default(),
            consolidation: ConsolidationConfig::default(),
            reindex: ReindexConfig::default(),
            patterns: PatternDetectorConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Layered resolution: compiled defaults, then an optional project TOML
    /// file (if `path` exists), then `MEMORY_*` environment variables,
    /// highest priority last.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            Self::from_toml_file(path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a `ServiceConfig` from a TOML file, layered over defaults so
    /// the file only needs to specify the fields it overrides.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("reading {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError(format!("invalid config TOML: {e}")))
    }

    /// Starts from defaults and layers environment overrides on top, mirroring
    /// the `MEMORY_*` variables named in the service's deployment contract.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let config = self;
        if let Ok(v) = env::var("MEMORY_DB_PATH") {
            config.db_path = PathBuf::from(v);
        }
        if let Ok(v) = env::var("MEMORY_DATA_DIR") {
            config.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("MEMORY_EMBEDDING_PROVIDER") {
            config.embedding_provider = v;
        }
        if let Ok(v) = env::var("MEMORY_EMBEDDING_MODEL") {
            config.embedding_model = v;
        }
        if let Ok(v) = env::var("MEMORY_CONSOLIDATION_INTERVAL_MS") {
            config.consolidation.interval_ms = v
                .parse()
                .map_err(|_| ConfigError("MEMORY_CONSOLIDATION_INTERVAL_MS must be a u64".into()))?;
        }
        if let Ok(v) = env::var("MEMORY_REINDEX_BATCH_SIZE") {
            config.reindex.batch_size = v
                .parse()
                .map_err(|_| ConfigError("MEMORY_REINDEX_BATCH_SIZE must be a usize".into()))?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.search.validate()?;
        self.consolidation.validate()?;
        self.reindex.validate()?;
        self.patterns.validate()?;
        self.circuit_breaker.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_cleanly() {
        assert!(ServiceConfig::default().validate().is_ok());
    }

    #[test]
    fn toml_file_overrides_only_the_fields_it_sets() {
        let config = ServiceConfig::from_toml_str(r#"embedding_provider = "openai""#).unwrap();
        assert_eq!(config.embedding_provider, "openai");
        assert_eq!(config.embedding_model, ServiceConfig::default().embedding_model);
    }

    #[test]
    fn malformed_toml_is_rejected() {
        assert!(ServiceConfig::from_toml_str("not = [valid").is_err());
    }
}
