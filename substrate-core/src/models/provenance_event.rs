use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An append-only audit log entry recorded alongside every repository
/// mutation, independent of the mutation itself ever being rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceEventKind {
    Created,
    Updated,
    Deleted,
    Superseded,
    Consolidated,
    Imported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceEvent {
    pub id: Uuid,
    pub memory_id: Uuid,
    pub kind: ProvenanceEventKind,
    pub detail: Option<String>,
    pub occurred_at: DateTime<Utc>,
}
