use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::EmbeddingError;

/// Produces vector embeddings for memory content and search queries.
///
/// Implementors are expected to be cheap to clone (an `Arc` wrapper is
/// typical) and safe to share across the scheduler's suspension points.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier used to key stored embeddings, e.g. `"onnx"` or `"openai"`.
    fn provider_id(&self) -> &str;

    /// The model identifier this provider currently embeds with.
    fn model_id(&self) -> &str;

    /// The dimensionality of vectors this provider produces.
    fn dimensions(&self) -> usize;

    /// Revision of this provider's embedding format, bumped when the same
    /// `(provider_id, model_id)` pair starts producing vectors that aren't
    /// comparable to earlier ones (e.g. a preprocessing change). Stored
    /// alongside each vector; defaults to `1` for providers that never
    /// revise in place.
    fn version(&self) -> u32 {
        1
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Batch form. Implementors without native batching may default to
    /// sequential `embed` calls.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Cheap, non-blocking readiness check — does not itself make a network
    /// call. A circuit-breaker-wrapped provider reports `false` while its
    /// breaker is open; a bare provider defaults to always-available.
    fn is_available(&self) -> bool {
        true
    }
}

/// Lets a trait object be wrapped by anything generic over `P: EmbeddingProvider`
/// (the circuit breaker, in particular) without needing its own erasure path.
#[async_trait]
impl EmbeddingProvider for Arc<dyn EmbeddingProvider> {
    fn provider_id(&self) -> &str {
        (**self).provider_id()
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    fn version(&self) -> u32 {
        (**self).version()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        (**self).embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        (**self).embed_batch(texts).await
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}
