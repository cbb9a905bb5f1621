use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::ConsolidationError;

/// A cluster of short-term memories to be distilled into one or more
/// long-term memories.
pub struct DistillationRequest {
    pub contents: Vec<String>,
    /// Upper bound on distilled output tokens, enforced by the caller's
    /// token budgeter before this request is issued.
    pub max_output_tokens: usize,
}

/// One distilled long-term memory, prior to being written to the repository.
pub struct DistillationOutcome {
    pub content: String,
    pub confidence: f64,
}

/// Summarizes a cluster of memories into durable long-term content.
#[async_trait]
pub trait DistillationProvider: Send + Sync {
    fn provider_id(&self) -> &str;

    async fn distill(
        &self,
        request: DistillationRequest,
    ) -> Result<Vec<DistillationOutcome>, ConsolidationError>;
}

/// Lets a trait object be wrapped by anything generic over `P: DistillationProvider`
/// (the circuit breaker, in particular) without needing its own erasure path.
#[async_trait]
impl DistillationProvider for Arc<dyn DistillationProvider> {
    fn provider_id(&self) -> &str {
        (**self).provider_id()
    }

    async fn distill(&self, request: DistillationRequest) -> Result<Vec<DistillationOutcome>, ConsolidationError> {
        (**self).distill(request).await
    }
}
