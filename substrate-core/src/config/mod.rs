pub mod circuit_breaker_config;
pub mod consolidation_config;
pub mod error;
pub mod pattern_config;
pub mod reindex_config;
pub mod search_config;
pub mod service_config;

pub use circuit_breaker_config::CircuitBreakerConfig;
pub use consolidation_config::ConsolidationConfig;
pub use error::ConfigError;
pub use pattern_config::PatternDetectorConfig;
pub use reindex_config::ReindexConfig;
pub use search_config::{FusionPolicy, HybridSearchConfig};
pub use service_config::ServiceConfig;
