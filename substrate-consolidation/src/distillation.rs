//! Stage 2: Distill (C9 §4.9). Hands a cluster's contents to the
//! distillation provider within the token budget; a provider error (e.g.
//! the response wasn't parseable as the expected structured output) is
//! surfaced to the caller, which marks the candidate `failed` rather than
//! aborting the run.

use substrate_core::errors::ConsolidationError;
use substrate_core::traits::{DistillationOutcome, DistillationProvider, DistillationRequest};

use crate::clustering::ClusterGroup;
use crate::token_budget::TokenBudgeter;

/// Distills one cluster into zero or more draft long-term memories.
pub async fn distill_cluster(
    provider: &dyn DistillationProvider,
    budgeter: &TokenBudgeter,
    cluster: &ClusterGroup,
    max_output_tokens: usize,
) -> Result<Vec<DistillationOutcome>, ConsolidationError> {
    let contents: Vec<String> = cluster.memories.iter().map(|m| m.content.clone()).collect();
    let (kept, dropped) = budgeter.fit_within_budget(&contents, max_output_tokens);
    if dropped > 0 {
        tracing::warn!(dropped, "dropped cluster contents exceeding the distillation token budget");
    }

    provider
        .distill(DistillationRequest {
            contents: kept.into_iter().map(str::to_string).collect(),
            max_output_tokens,
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use substrate_core::memory::{Confidence, Importance, Layer, MemoryRecord, MemoryType, Provenance};
    use uuid::Uuid;

    fn memory(content: &str) -> MemoryRecord {
        let now = Utc::now();
        MemoryRecord {
            id: Uuid::new_v4(),
            content: content.to_string(),
            memory_type: MemoryType::Observation,
            layer: Layer::Stm,
            importance: Importance::default(),
            confidence: Confidence::default(),
            tags: Default::default(),
            entities: Default::default(),
            provenance: Provenance::implicit("conv-1"),
            supersedes: None,
            superseded_by: None,
            created_at: now,
            updated_at: now,
            accessed_at: now,
            access_count: 0,
            checksum: "deadbeef".to_string(),
        }
    }

    struct EchoProvider;
    #[async_trait]
    impl DistillationProvider for EchoProvider {
        fn provider_id(&self) -> &str {
            "echo"
        }
        async fn distill(&self, request: DistillationRequest) -> Result<Vec<DistillationOutcome>, ConsolidationError> {
            Ok(vec![DistillationOutcome {
                content: request.contents.join(" / "),
                confidence: 0.8,
            }])
        }
    }

    struct MalformedProvider;
    #[async_trait]
    impl DistillationProvider for MalformedProvider {
        fn provider_id(&self) -> &str {
            "malformed"
        }
        async fn distill(&self, _request: DistillationRequest) -> Result<Vec<DistillationOutcome>, ConsolidationError> {
            Err(ConsolidationError::DistillationFailed {
                reason: "response was not valid JSON".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn distills_cluster_into_drafts() {
        let budgeter = TokenBudgeter::new();
        let cluster = ClusterGroup {
            memories: vec![memory("likes dark mode"), memory("uses vim bindings")],
        };
        let drafts = distill_cluster(&EchoProvider, &budgeter, &cluster, 512).await.unwrap();
        assert_eq!(drafts.len(), 1);
        assert!(drafts[0].content.contains("dark mode"));
    }

    #[tokio::test]
    async fn malformed_response_surfaces_as_error() {
        let budgeter = TokenBudgeter::new();
        let cluster = ClusterGroup {
            memories: vec![memory("some observation")],
        };
        let result = distill_cluster(&MalformedProvider, &budgeter, &cluster, 512).await;
        assert!(matches!(result, Err(ConsolidationError::DistillationFailed { .. })));
    }
}
