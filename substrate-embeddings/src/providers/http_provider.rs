//! Remote HTTP embedding provider (C4): calls a cloud embedding API over
//! `reqwest`, with bounded retry and exponential backoff per attempt. Where
//! [`OnnxProvider`](super::onnx_provider::OnnxProvider) runs inference
//! locally, this provider is the network-bound counterpart for deployments
//! that route embedding through a hosted model instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use substrate_core::errors::EmbeddingError;
use substrate_core::traits::EmbeddingProvider;

/// Hosted embedding APIs this provider knows how to talk to. Each has its
/// own default endpoint and native dimensionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpApiModel {
    OpenAiTextEmbedding3Large,
    VoyageCode3,
}

impl HttpApiModel {
    fn default_endpoint(self) -> &'static str {
        match self {
            Self::OpenAiTextEmbedding3Large => "https://api.openai.com/v1/embeddings",
            Self::VoyageCode3 => "https://api.voyageai.com/v1/embeddings",
        }
    }

    fn model_name(self) -> &'static str {
        match self {
            Self::OpenAiTextEmbedding3Large => "text-embedding-3-large",
            Self::VoyageCode3 => "voyage-code-3",
        }
    }

    fn default_dimensions(self) -> usize {
        match self {
            Self::OpenAiTextEmbedding3Large => 3072,
            Self::VoyageCode3 => 2048,
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

/// Cloud API embedding provider. Trips `available` to `false` once a call
/// exhausts its retries, mirroring the local circuit breaker's open state
/// but scoped to this provider's own failure history rather than a shared
/// decorator — callers that want the cooldown/half-open behavior should
/// still wrap this in [`CircuitBreakerProvider`](super::circuit_breaker::CircuitBreakerProvider).
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    model: HttpApiModel,
    api_key: String,
    endpoint: String,
    dimensions: usize,
    max_retries: u32,
    available: AtomicBool,
}

impl HttpEmbeddingProvider {
    pub fn new(model: HttpApiModel, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: model.default_endpoint().to_string(),
            dimensions: model.default_dimensions(),
            model,
            api_key,
            max_retries: 3,
            available: AtomicBool::new(true),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn request_embeddings(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = EmbedRequest {
            model: self.model.model_name(),
            input: texts,
        };

        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(100 * 2u64.pow(attempt - 1));
                tokio::time::sleep(delay).await;
                tracing::debug!(attempt, "retrying HTTP embedding request");
            }

            match self.send_request(&body).await {
                Ok(embeddings) => return Ok(embeddings),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "HTTP embedding request failed");
                    last_err = Some(e);
                }
            }
        }

        self.available.store(false, Ordering::Relaxed);
        Err(last_err.unwrap_or_else(|| EmbeddingError::EmbeddingFailed {
            reason: "all retries exhausted".to_string(),
        }))
    }

    async fn send_request(&self, body: &EmbedRequest<'_>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| EmbeddingError::EmbeddingFailed {
                reason: format!("HTTP error: {e}"),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::EmbeddingFailed {
                reason: format!("API returned {status}: {text}"),
            });
        }

        let parsed: EmbedResponse = response.json().await.map_err(|e| EmbeddingError::EmbeddingFailed {
            reason: format!("JSON parse error: {e}"),
        })?;

        let dims = self.dimensions;
        Ok(parsed
            .data
            .into_iter()
            .map(|d| {
                let mut v = d.embedding;
                v.resize(dims, 0.0);
                v
            })
            .collect())
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn provider_id(&self) -> &str {
        "http"
    }

    fn model_id(&self) -> &str {
        self.model.model_name()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if !self.is_available() {
            return Err(EmbeddingError::ProviderUnavailable {
                provider: self.provider_id().to_string(),
                reason: "prior request exhausted retries".to_string(),
            });
        }
        let results = self.request_embeddings(vec![text.to_string()]).await?;
        results.into_iter().next().ok_or_else(|| EmbeddingError::EmbeddingFailed {
            reason: "empty response".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if !self.is_available() {
            return Err(EmbeddingError::ProviderUnavailable {
                provider: self.provider_id().to_string(),
                reason: "prior request exhausted retries".to_string(),
            });
        }
        self.request_embeddings(texts.to_vec()).await
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoints_and_dimensions_match_the_named_model() {
        let openai = HttpEmbeddingProvider::new(HttpApiModel::OpenAiTextEmbedding3Large, "key".to_string());
        assert_eq!(openai.dimensions(), 3072);
        assert_eq!(openai.model_id(), "text-embedding-3-large");

        let voyage = HttpEmbeddingProvider::new(HttpApiModel::VoyageCode3, "key".to_string());
        assert_eq!(voyage.dimensions(), 2048);
    }

    #[test]
    fn with_endpoint_overrides_the_default() {
        let provider = HttpEmbeddingProvider::new(HttpApiModel::OpenAiTextEmbedding3Large, "key".to_string())
            .with_endpoint("https://example.test/embeddings");
        assert_eq!(provider.endpoint, "https://example.test/embeddings");
    }

    #[tokio::test]
    async fn unreachable_endpoint_exhausts_retries_and_trips_unavailable() {
        let mut provider = HttpEmbeddingProvider::new(HttpApiModel::OpenAiTextEmbedding3Large, "key".to_string())
            .with_endpoint("http://127.0.0.1:1");
        provider.max_retries = 0;

        let err = provider.embed("hello").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::EmbeddingFailed { .. }));
        assert!(!provider.is_available());

        let second = provider.embed("hello").await.unwrap_err();
        assert!(matches!(second, EmbeddingError::ProviderUnavailable { .. }));
    }
}
