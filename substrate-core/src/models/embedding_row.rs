use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One stored embedding vector, keyed by the memory and provider/model that
/// produced it. A memory may have multiple rows across reindex generations
/// until old ones are pruned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRow {
    pub memory_id: Uuid,
    pub provider_id: String,
    pub model_id: String,
    pub version: u32,
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

impl EmbeddingRow {
    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }
}
