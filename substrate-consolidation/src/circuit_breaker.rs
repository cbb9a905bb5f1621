//! Circuit breaker wrapped around a [`DistillationProvider`], mirroring the
//! one `substrate-embeddings` wraps around embedding providers: consecutive
//! failures open the breaker, a per-call timeout bounds each attempt, and
//! it stays open for a cooldown before allowing a trial call through.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use substrate_core::config::CircuitBreakerConfig;
use substrate_core::errors::ConsolidationError;
use substrate_core::traits::{Clock, DistillationOutcome, DistillationProvider, DistillationRequest, SystemClock};

#[derive(Debug, Clone, Copy, PartialEq)]
enum BreakerState {
    Closed,
    Open { opened_at: DateTime<Utc> },
    HalfOpen,
}

pub struct CircuitBreakerDistiller<P: DistillationProvider> {
    inner: P,
    config: CircuitBreakerConfig,
    clock: Box<dyn Clock>,
    state: Mutex<BreakerState>,
    consecutive_failures: AtomicU32,
}

impl<P: DistillationProvider> CircuitBreakerDistiller<P> {
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

    fn admit(&self) -> Result<(), ConsolidationError> {
        let mut state = self.state.lock().expect("circuit breaker mutex poisoned");
        match *state {
            BreakerState::Closed | BreakerState::HalfOpen => Ok(()),
            BreakerState::Open { opened_at } => {
                let elapsed = self.clock.now().signed_duration_since(opened_at);
                if elapsed.num_milliseconds() >= self.config.cooldown_ms as i64 {
                    *state = BreakerState::HalfOpen;
                    Ok(())
                } else {
                    Err(ConsolidationError::DistillationFailed {
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
}

#[async_trait]
impl<P: DistillationProvider> DistillationProvider for CircuitBreakerDistiller<P> {
    fn provider_id(&self) -> &str {
        self.inner.provider_id()
    }

    async fn distill(&self, request: DistillationRequest) -> Result<Vec<DistillationOutcome>, ConsolidationError> {
        self.admit()?;
        let timeout = Duration::from_millis(self.config.call_timeout_ms);
        let result = match tokio::time::timeout(timeout, self.inner.distill(request)).await {
            Ok(result) => result,
            Err(_) => Err(ConsolidationError::DistillationFailed {
                reason: format!("call exceeded {}ms timeout", self.config.call_timeout_ms),
            }),
        };
        match &result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};

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

    struct FixedClockRef(Arc<FixedClock>);

    impl Clock for FixedClockRef {
        fn now(&self) -> DateTime<Utc> {
            self.0.now()
        }
    }

    struct FlakyDistiller {
        fail_count: AtomicU32,
    }

    #[async_trait]
    impl DistillationProvider for FlakyDistiller {
        fn provider_id(&self) -> &str {
            "flaky-llm"
        }
        async fn distill(&self, _request: DistillationRequest) -> Result<Vec<DistillationOutcome>, ConsolidationError> {
            if self.fail_count.load(Ordering::SeqCst) > 0 {
                self.fail_count.fetch_sub(1, Ordering::SeqCst);
                Err(ConsolidationError::DistillationFailed {
                    reason: "simulated".to_string(),
                })
            } else {
                Ok(vec![DistillationOutcome {
                    content: "distilled fact".to_string(),
                    confidence: 0.8,
                }])
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

    fn request() -> DistillationRequest {
        DistillationRequest {
            contents: vec!["a".to_string()],
            max_output_tokens: 200,
        }
    }

    #[tokio::test]
    async fn opens_after_consecutive_failures() {
        let clock = Arc::new(FixedClock(StdMutex::new(Utc::now())));
        let distiller = CircuitBreakerDistiller::with_clock(
            FlakyDistiller {
                fail_count: AtomicU32::new(10),
            },
            config(),
            Box::new(FixedClockRef(clock.clone())),
        );

        assert!(distiller.distill(request()).await.is_err());
        assert!(distiller.distill(request()).await.is_err());

        let err = distiller.distill(request()).await.unwrap_err();
        assert!(matches!(err, ConsolidationError::DistillationFailed { reason } if reason == "circuit breaker open"));
    }

    #[tokio::test]
    async fn half_open_trial_closes_on_success() {
        let clock = Arc::new(FixedClock(StdMutex::new(Utc::now())));
        let distiller = CircuitBreakerDistiller::with_clock(
            FlakyDistiller {
                fail_count: AtomicU32::new(2),
            },
            config(),
            Box::new(FixedClockRef(clock.clone())),
        );

        assert!(distiller.distill(request()).await.is_err());
        assert!(distiller.distill(request()).await.is_err());
        assert!(distiller.distill(request()).await.is_err());

        clock.advance(1_001);

        assert!(distiller.distill(request()).await.is_ok());
        assert!(distiller.distill(request()).await.is_ok());
    }
}
