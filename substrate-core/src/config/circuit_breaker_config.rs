use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Tuning knobs for the circuit breaker wrapped around embedding and
/// distillation providers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the breaker opens. Default: 5
    pub failure_threshold: u32,
    /// How long the breaker stays open before allowing a trial call, in
    /// milliseconds. Default: 30s
    pub cooldown_ms: u64,
    /// Per-call timeout enforced around the wrapped provider, in
    /// milliseconds. Default: 10s
    pub call_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_ms: 30_000,
            call_timeout_ms: 10_000,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError("failure_threshold must be > 0".into()));
        }
        if self.cooldown_ms == 0 {
            return Err(ConfigError("cooldown_ms must be > 0".into()));
        }
        if self.call_timeout_ms == 0 {
            return Err(ConfigError("call_timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}
