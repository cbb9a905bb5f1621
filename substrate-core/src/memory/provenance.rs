use serde::{Deserialize, Serialize};

/// How a memory came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// The user explicitly asked for this to be remembered.
    Explicit,
    /// Inferred from the course of a conversation without an explicit ask.
    Implicit,
    /// Produced by the consolidation pipeline from other memories.
    Distilled,
    /// Brought in from an external Markdown file via the ingestor.
    Imported,
}

/// Where a memory came from, attached at write time and immutable after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub source_type: SourceType,
    /// The conversation this memory was captured from, if any.
    pub conversation_id: Option<String>,
}

impl Provenance {
    pub fn explicit(conversation_id: impl Into<String>) -> Self {
        Self {
            source_type: SourceType::Explicit,
            conversation_id: Some(conversation_id.into()),
        }
    }

    pub fn implicit(conversation_id: impl Into<String>) -> Self {
        Self {
            source_type: SourceType::Implicit,
            conversation_id: Some(conversation_id.into()),
        }
    }

    pub fn distilled() -> Self {
        Self {
            source_type: SourceType::Distilled,
            conversation_id: None,
        }
    }

    pub fn imported() -> Self {
        Self {
            source_type: SourceType::Imported,
            conversation_id: None,
        }
    }
}
