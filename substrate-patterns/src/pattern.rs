use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A recurring cluster of short-term memories the detector considers one
/// candidate preference, prior to promotion.
#[derive(Debug, Clone)]
pub struct DetectedPattern {
    /// Stable within one detection run; not persisted — a pattern only
    /// gets a durable identity once [`crate::promote_to_preference`] turns
    /// it into an LTM record.
    pub cluster_id: Uuid,
    /// Label used for the `pattern:{type}` tag. Derived from the most
    /// common [`substrate_core::memory::MemoryType`] among the cluster's
    /// members.
    pub pattern_type: String,
    /// Member memories, in detection order.
    pub member_ids: Vec<Uuid>,
    /// The longest member content, used as the promoted record's body —
    /// longer observations tend to carry the most context.
    pub representative_content: String,
    pub confidence: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub occurrences: usize,
}

impl DetectedPattern {
    /// Comma-joined member ids, in detection order — the evidence chain
    /// recorded as `provenance.conversation_id` on the promoted record.
    pub fn evidence_chain(&self) -> String {
        self.member_ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",")
    }
}
