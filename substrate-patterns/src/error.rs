use thiserror::Error;

/// Failures from pattern detection and promotion.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error(transparent)]
    Repository(#[from] substrate_core::errors::RepositoryError),

    #[error("invalid pattern detector config: {0}")]
    InvalidConfig(#[from] substrate_core::config::ConfigError),

    #[error("pattern confidence {confidence:.3} is below the promotion threshold {threshold:.3}")]
    BelowPromotionThreshold { confidence: f64, threshold: f64 },
}
