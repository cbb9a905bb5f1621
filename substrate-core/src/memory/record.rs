use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::provenance::Provenance;
use super::scores::{Confidence, Importance};

/// The kind of content a memory holds. Drives default importance and which
/// consolidation and pattern-detection rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Fact,
    Preference,
    Decision,
    Episode,
    Observation,
    ActionItem,
}

impl MemoryType {
    pub const fn as_str(self) -> &'static str {
        match self {
            MemoryType::Fact => "fact",
            MemoryType::Preference => "preference",
            MemoryType::Decision => "decision",
            MemoryType::Episode => "episode",
            MemoryType::Observation => "observation",
            MemoryType::ActionItem => "action_item",
        }
    }
}

/// Which tier of the memory hierarchy a record currently lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Short-term memory: raw, unconsolidated, high churn.
    Stm,
    /// Long-term memory: the durable, consolidated or explicitly remembered tier.
    Ltm,
}

/// A single unit of remembered content, mirrored between the relational
/// index and a content-addressed Markdown file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: Uuid,
    pub content: String,
    pub memory_type: MemoryType,
    pub layer: Layer,
    pub importance: Importance,
    pub confidence: Confidence,
    /// Given order is preserved; duplicates are dropped at write time by
    /// [`dedup_preserve_order`], not here, so equality comparisons on an
    /// already-constructed record stay a straight `Vec` comparison.
    pub tags: Vec<String>,
    pub entities: Vec<String>,
    pub provenance: Provenance,
    /// The memory this one replaces, if it was produced by consolidation or an update.
    pub supersedes: Option<Uuid>,
    /// The memory that replaced this one, set once this record is retired.
    pub superseded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
    pub access_count: u64,
    /// SHA-256 of the serialized Markdown file, compared against the file on
    /// disk during reconciliation.
    pub checksum: String,
}

impl MemoryRecord {
    /// Whether this record has been superseded and should be excluded from
    /// fresh retrieval results by default.
    pub fn is_superseded(&self) -> bool {
        self.superseded_by.is_some()
    }

    /// Record a read: bumps `access_count` and refreshes `accessed_at`.
    ///
    /// Whether a read should mutate the record at all is an open question
    /// the spec left unresolved; this crate's answer is yes, bounded to
    /// these two fields, never `updated_at`.
    pub fn mark_accessed(&mut self, at: DateTime<Utc>) {
        self.accessed_at = at;
        self.access_count = self.access_count.saturating_add(1);
    }
}

/// Drops later duplicates while keeping first-seen order. Used wherever
/// caller-supplied tags/entities are accepted, since the on-disk and wire
/// contract is "given order, no duplicates" rather than a sorted set.
pub fn dedup_preserve_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::with_capacity(items.len());
    items.into_iter().filter(|item| seen.insert(item.clone())).collect()
}
