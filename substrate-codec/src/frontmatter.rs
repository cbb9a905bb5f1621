use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use substrate_core::memory::{Confidence, Importance, Layer, MemoryRecord, MemoryType, Provenance, SourceType};

use crate::error::CodecError;

const FRONTMATTER_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct RawFrontmatter {
    id: Uuid,
    version: u32,
    #[serde(rename = "type")]
    memory_type: String,
    layer: String,
    importance: f64,
    confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    entities: Vec<String>,
    source: RawSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    supersedes: Option<Uuid>,
    #[serde(
        rename = "supersededBy",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    superseded_by: Option<Uuid>,
    #[serde(rename = "createdAt")]
    created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    updated_at: DateTime<Utc>,
    #[serde(rename = "accessedAt")]
    accessed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawSource {
    #[serde(rename = "type")]
    source_type: String,
    #[serde(
        rename = "conversationId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    conversation_id: Option<String>,
    #[serde(
        rename = "messageId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    message_id: Option<String>,
}

/// A parsed Markdown file, typed but independent of [`MemoryRecord`]'s
/// in-repository shape — `message_id` in particular has no home on the
/// record itself, only on the provenance event produced alongside a write.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub id: Uuid,
    pub content: String,
    pub memory_type: MemoryType,
    pub layer: Layer,
    pub importance: Importance,
    pub confidence: Confidence,
    pub tags: Vec<String>,
    pub entities: Vec<String>,
    pub provenance: Provenance,
    pub message_id: Option<String>,
    pub supersedes: Option<Uuid>,
    pub superseded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
}

pub fn serialize(record: &MemoryRecord, message_id: Option<&str>) -> Result<String, CodecError> {
    let raw = RawFrontmatter {
        id: record.id,
        version: FRONTMATTER_VERSION,
        memory_type: record.memory_type.as_str().to_string(),
        layer: layer_str(record.layer).to_string(),
        importance: record.importance.value(),
        confidence: record.confidence.value(),
        tags: record.tags.clone(),
        entities: record.entities.clone(),
        source: RawSource {
            source_type: source_type_str(record.provenance.source_type).to_string(),
            conversation_id: record.provenance.conversation_id.clone(),
            message_id: message_id.map(str::to_string),
        },
        supersedes: record.supersedes,
        superseded_by: record.superseded_by,
        created_at: record.created_at,
        updated_at: record.updated_at,
        accessed_at: record.accessed_at,
    };

    let yaml = serde_yaml::to_string(&raw).map_err(|e| CodecError::SerializeFailed {
        reason: e.to_string(),
    })?;
    let yaml = yaml.trim_end();

    Ok(format!("---\n{yaml}\n---\n\n{}\n", record.content))
}

pub fn parse(text: &str) -> Result<FileRecord, CodecError> {
    let Some(after_open) = text.strip_prefix("---\n") else {
        return Err(CodecError::MissingFrontmatter);
    };
    let Some(close_idx) = after_open.find("\n---\n") else {
        return Err(CodecError::MissingFrontmatter);
    };
    let yaml_str = &after_open[..close_idx];
    let rest = &after_open[close_idx + "\n---\n".len()..];
    let content = rest.strip_prefix('\n').unwrap_or(rest).trim_end_matches('\n').to_string();

    let raw: RawFrontmatter =
        serde_yaml::from_str(yaml_str).map_err(|e| CodecError::InvalidFrontmatter {
            reason: e.to_string(),
        })?;

    if content.trim().is_empty() {
        return Err(CodecError::InvalidFrontmatter {
            reason: "content body is empty".to_string(),
        });
    }

    Ok(FileRecord {
        id: raw.id,
        content,
        memory_type: parse_memory_type(&raw.memory_type)?,
        layer: parse_layer(&raw.layer)?,
        importance: Importance::new(raw.importance),
        confidence: Confidence::new(raw.confidence),
        tags: raw.tags,
        entities: raw.entities,
        provenance: Provenance {
            source_type: parse_source_type(&raw.source.source_type)?,
            conversation_id: raw.source.conversation_id,
        },
        message_id: raw.source.message_id,
        supersedes: raw.supersedes,
        superseded_by: raw.superseded_by,
        created_at: raw.created_at,
        updated_at: raw.updated_at,
        accessed_at: raw.accessed_at,
    })
}

fn layer_str(layer: Layer) -> &'static str {
    match layer {
        Layer::Stm => "stm",
        Layer::Ltm => "ltm",
    }
}

fn parse_layer(s: &str) -> Result<Layer, CodecError> {
    match s {
        "stm" => Ok(Layer::Stm),
        "ltm" => Ok(Layer::Ltm),
        other => Err(CodecError::InvalidFrontmatter {
            reason: format!("unknown layer '{other}'"),
        }),
    }
}

fn parse_memory_type(s: &str) -> Result<MemoryType, CodecError> {
    match s {
        "fact" => Ok(MemoryType::Fact),
        "preference" => Ok(MemoryType::Preference),
        "decision" => Ok(MemoryType::Decision),
        "episode" => Ok(MemoryType::Episode),
        "observation" => Ok(MemoryType::Observation),
        "action_item" => Ok(MemoryType::ActionItem),
        other => Err(CodecError::InvalidFrontmatter {
            reason: format!("unknown memory type '{other}'"),
        }),
    }
}

fn source_type_str(s: SourceType) -> &'static str {
    match s {
        SourceType::Explicit => "explicit",
        SourceType::Implicit => "implicit",
        SourceType::Distilled => "distilled",
        SourceType::Imported => "imported",
    }
}

fn parse_source_type(s: &str) -> Result<SourceType, CodecError> {
    match s {
        "explicit" => Ok(SourceType::Explicit),
        "implicit" => Ok(SourceType::Implicit),
        "distilled" => Ok(SourceType::Distilled),
        "imported" => Ok(SourceType::Imported),
        other => Err(CodecError::InvalidFrontmatter {
            reason: format!("unknown source type '{other}'"),
        }),
    }
}
