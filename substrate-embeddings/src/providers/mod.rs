pub mod circuit_breaker;
pub mod http_provider;
pub mod onnx_provider;
pub mod tfidf_fallback;

pub use circuit_breaker::CircuitBreakerProvider;
pub use http_provider::{HttpApiModel, HttpEmbeddingProvider};
pub use onnx_provider::OnnxProvider;
pub use tfidf_fallback::TfIdfFallback;
