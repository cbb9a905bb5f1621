//! Embedding Store & Reindex (C4): persists vectors keyed by
//! `(memory_id, provider, model)` and replaces them when the configured
//! provider changes, without touching the relational index or Markdown
//! mirror directly — all persistence goes through `substrate-storage`.

pub mod providers;
pub mod reindex;
pub mod store;

pub use providers::{CircuitBreakerProvider, HttpApiModel, HttpEmbeddingProvider, OnnxProvider, TfIdfFallback};
pub use reindex::ReindexRunner;
pub use store::EmbeddingStore;
