use thiserror::Error;

/// An invariant violated at config construction time.
#[derive(Debug, Error)]
#[error("invalid config: {0}")]
pub struct ConfigError(pub String);
