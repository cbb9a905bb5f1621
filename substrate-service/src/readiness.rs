use std::sync::atomic::{AtomicBool, Ordering};

use substrate_core::errors::ServiceError;

/// Tracks whether [`crate::MemoryService::initialize`] has run. Every
/// surface operation checks this first and fails fast with
/// `MEMORY_NOT_READY` rather than touching storage in an unknown state.
#[derive(Debug, Default)]
pub(crate) struct Readiness(AtomicBool);

impl Readiness {
    pub fn mark_ready(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn mark_not_ready(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn require_ready(&self) -> Result<(), ServiceError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(ServiceError::NotReady {
                reason: "memory service has not completed initialize()".to_string(),
            })
        }
    }
}
