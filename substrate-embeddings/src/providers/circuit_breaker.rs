//! Circuit breaker wrapped around an [`EmbeddingProvider`] so a flaky or
//! slow provider can't stall the pipeline that calls it: consecutive
//! failures open the breaker, a per-call timeout bounds each attempt, and
//! the breaker stays open for a cooldown before trying again.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use substrate_core::config::CircuitBreakerConfig;
use substrate_core::errors::EmbeddingError;
use substrate_core::traits::{Clock, EmbeddingProvider, SystemClock};

#[derive(Debug, Clone, Copy, PartialEq)]
enum BreakerState {
    Closed,
    Open { opened_at: DateTime<Utc> },
    HalfOpen,
}

/// Wraps any [`EmbeddingProvider`] with failure counting, a cooldown window,
/// and a per-call timeout. Trips to `Open` after `failure_threshold`
/// consecutive failures; after `cooldown_ms` it allows one trial call
/// (`HalfOpen`) that closes the breaker on success or reopens it on failure.
pub struct CircuitBreakerProvider<P: EmbeddingProvider> {
    inner: P,
    config: CircuitBreakerConfig,
    clock: Box<dyn Clock>,
    state: Mutex<BreakerState>,
    consecutive_failures: AtomicU32,
}

impl<P: EmbeddingProvider> CircuitBreakerProvider<P> {
    pub fn new(inner: P, config: CircuitBreakerConfig) -> Self {
        Self::with_clock(inner, config, Box::new(SystemClock))
    }

    pub fn with_clock(inner: P, config: CircuitBreakerConfig, clock: Box<dyn Clock>) -> Self {
        Self {
            inner,
            config,
            clock,
            state: Mutex::new(BreakerState::Closed),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    /// `Err` means the breaker rejected the call outright without touching
    /// the wrapped provider.
    fn admit(&self) -> Result<(), EmbeddingError> {
        let mut state = self.state.lock().expect("circuit breaker mutex poisoned");
        match *state {
            BreakerState::Closed | BreakerState::HalfOpen => Ok(()),
            BreakerState::Open { opened_at } => {
                let elapsed = self.clock.now().signed_duration_since(opened_at);
                if elapsed.num_milliseconds() >= self.config.cooldown_ms as i64 {
                    *state = BreakerState::HalfOpen;
                    Ok(())
                } else {
                    Err(EmbeddingError::ProviderUnavailable {
                        provider: self.inner.provider_id().to_string(),
                        reason: "circuit breaker open".to_string(),
                    })
                }
            }
        }
    }

    fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        *self.state.lock().expect("circuit breaker mutex poisoned") = BreakerState::Closed;
    }

    fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.lock().expect("circuit breaker mutex poisoned");
        if matches!(*state, BreakerState::HalfOpen) || failures >= self.config.failure_threshold {
            *state = BreakerState::Open {
                opened_at: self.clock.now(),
            };
        }
    }

    /// Read-only view of breaker state for [`EmbeddingProvider::is_available`]:
    /// reports the cooldown as already elapsed without transitioning to
    /// `HalfOpen` the way [`Self::admit`] does on an actual call.
    fn peek_available(&self) -> bool {
        match *self.state.lock().expect("circuit breaker mutex poisoned") {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open { opened_at } => {
                let elapsed = self.clock.now().signed_duration_since(opened_at);
                elapsed.num_milliseconds() >= self.config.cooldown_ms as i64
            }
        }
    }

    async fn call_with_timeout(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let timeout = Duration::from_millis(self.config.call_timeout_ms);
        match tokio::time::timeout(timeout, self.inner.embed(text)).await {
            Ok(result) => result,
            Err(_) => Err(EmbeddingError::ProviderUnavailable {
                provider: self.inner.provider_id().to_string(),
                reason: format!("call exceeded {}ms timeout", self.config.call_timeout_ms),
            }),
        }
    }
}

#[async_trait]
impl<P: EmbeddingProvider> EmbeddingProvider for CircuitBreakerProvider<P> {
    fn provider_id(&self) -> &str {
        self.inner.provider_id()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn version(&self) -> u32 {
        self.inner.version()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.admit()?;
        match self.call_with_timeout(text).await {
            Ok(vector) => {
                self.record_success();
                Ok(vector)
            }
            Err(e) => {
                self.record_failure();
                Err(e)
            }
        }
    }

    fn is_available(&self) -> bool {
        self.peek_available() && self.inner.is_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};
    use substrate_core::traits::Clock;

    struct FixedClock(StdMutex<DateTime<Utc>>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    impl FixedClock {
        fn advance(&self, millis: i64) {
            let mut guard = self.0.lock().unwrap();
            *guard += chrono::Duration::milliseconds(millis);
        }
    }

    struct FlakyProvider {
        fail_count: AtomicU32,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyProvider {
        fn provider_id(&self) -> &str {
            "flaky"
        }
        fn model_id(&self) -> &str {
            "flaky-model"
        }
        fn dimensions(&self) -> usize {
            4
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if self.fail_count.load(Ordering::SeqCst) > 0 {
                self.fail_count.fetch_sub(1, Ordering::SeqCst);
                Err(EmbeddingError::EmbeddingFailed {
                    reason: "simulated failure".to_string(),
                })
            } else {
                Ok(vec![0.1, 0.2, 0.3, 0.4])
            }
        }
    }

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 2,
            cooldown_ms: 1_000,
            call_timeout_ms: 5_000,
        }
    }

    #[tokio::test]
    async fn opens_after_consecutive_failures_and_rejects_fast() {
        let clock = Arc::new(FixedClock(StdMutex::new(Utc::now())));
        let provider = CircuitBreakerProvider::with_clock(
            FlakyProvider {
                fail_count: AtomicU32::new(10),
            },
            config(),
            Box::new(FixedClockRef(clock.clone())),
        );

        assert!(provider.embed("a").await.is_err());
        assert!(provider.embed("b").await.is_err());

        let err = provider.embed("c").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::ProviderUnavailable { reason, .. } if reason == "circuit breaker open"));
        assert!(!provider.is_available());
    }

    #[tokio::test]
    async fn half_open_trial_closes_breaker_on_success() {
        let clock = Arc::new(FixedClock(StdMutex::new(Utc::now())));
        let provider = CircuitBreakerProvider::with_clock(
            FlakyProvider {
                fail_count: AtomicU32::new(2),
            },
            config(),
            Box::new(FixedClockRef(clock.clone())),
        );

        assert!(provider.embed("a").await.is_err());
        assert!(provider.embed("b").await.is_err());
        assert!(provider.embed("c").await.is_err());

        clock.advance(1_001);

        let result = provider.embed("d").await;
        assert!(result.is_ok());

        assert!(provider.embed("e").await.is_ok());
    }

    struct FixedClockRef(Arc<FixedClock>);

    impl Clock for FixedClockRef {
        fn now(&self) -> DateTime<Utc> {
            self.0.now()
        }
    }
}
