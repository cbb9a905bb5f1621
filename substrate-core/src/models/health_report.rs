use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Returned by the memory service's `healthCheck` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub db_connected: bool,
    pub memory_count: u64,
    pub embedding_provider: Option<String>,
    pub last_consolidation: Option<DateTime<Utc>>,
}
