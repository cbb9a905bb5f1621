//! Markdown codec (C1): turns a [`MemoryRecord`] into the on-disk Markdown
//! file format described by the service's external interface, and back.
//!
//! Nothing here touches SQLite or the filesystem directly — [`substrate_repository`]
//! owns the atomic write; this crate only knows how to turn bytes into a
//! record and a record into bytes.

mod error;
mod filename;
mod frontmatter;

pub use error::CodecError;
pub use filename::build_file_name;
pub use frontmatter::FileRecord;

use sha2::{Digest, Sha256};
use substrate_core::memory::MemoryRecord;

/// Serialize a memory record to the full Markdown file body (frontmatter +
/// blank line + content). `message_id` is carried only in the frontmatter;
/// it has no home on `MemoryRecord` itself — the repository attaches it to
/// the provenance event for the same write.
pub fn serialize(record: &MemoryRecord, message_id: Option<&str>) -> Result<String, CodecError> {
    frontmatter::serialize(record, message_id)
}

/// Parse a Markdown file's contents back into a [`FileRecord`].
pub fn parse(text: &str) -> Result<FileRecord, CodecError> {
    frontmatter::parse(text)
}

/// SHA-256 of the full serialized file, as a lowercase hex string.
pub fn checksum(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use substrate_core::memory::{Confidence, Importance, Layer, MemoryType, Provenance};
    use uuid::Uuid;

    fn sample() -> MemoryRecord {
        let now = Utc::now();
        MemoryRecord {
            id: Uuid::new_v4(),
            content: "the user prefers dark mode in all editors".to_string(),
            memory_type: MemoryType::Preference,
            layer: Layer::Ltm,
            importance: Importance::new(0.7),
            confidence: Confidence::new(0.9),
            tags: vec!["ui".to_string(), "preference".to_string()],
            entities: Vec::new(),
            provenance: Provenance::explicit("conv-42"),
            supersedes: None,
            superseded_by: None,
            created_at: now,
            updated_at: now,
            accessed_at: now,
            access_count: 0,
            checksum: String::new(),
        }
    }

    #[test]
    fn round_trips_through_serialize_and_parse() {
        let record = sample();
        let text = serialize(&record, Some("msg-1")).unwrap();
        let parsed = parse(&text).unwrap();
        assert_eq!(parsed.id, record.id);
        assert_eq!(parsed.content, record.content);
        assert_eq!(parsed.memory_type, record.memory_type);
        assert_eq!(parsed.layer, record.layer);
        assert_eq!(parsed.tags, record.tags);
        assert_eq!(parsed.message_id.as_deref(), Some("msg-1"));
    }

    #[test]
    fn checksum_is_deterministic() {
        let record = sample();
        let text = serialize(&record, None).unwrap();
        assert_eq!(checksum(&text), checksum(&text));
        assert_eq!(checksum(&text).len(), 64);
    }

    #[test]
    fn missing_frontmatter_is_rejected() {
        let err = parse("no frontmatter here").unwrap_err();
        assert!(matches!(err, CodecError::MissingFrontmatter));
    }

    #[test]
    fn invalid_frontmatter_is_rejected() {
        let text = "---\nthis: [is, not, ] valid: yaml: -\n---\n\nbody";
        assert!(parse(text).is_err());
    }

    #[test]
    fn serialize_is_deterministic() {
        let record = sample();
        let a = serialize(&record, None).unwrap();
        let b = serialize(&record, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn omits_empty_optional_fields() {
        let record = sample();
        let text = serialize(&record, None).unwrap();
        assert!(!text.contains("messageId"));
        assert!(!text.contains("supersedes:"));
    }

    proptest! {
        #[test]
        fn round_trip_preserves_content_and_scores(
            body in "[a-zA-Z0-9][a-zA-Z0-9 ]{0,79}",
            importance in 0.0f64..1.0,
            confidence in 0.0f64..1.0,
        ) {
            let mut record = sample();
            record.content = body;
            record.importance = Importance::new(importance);
            record.confidence = Confidence::new(confidence);

            let text = serialize(&record, None).unwrap();
            let parsed = parse(&text).unwrap();

            prop_assert_eq!(parsed.content, record.content);
            prop_assert!((parsed.importance.value() - record.importance.value()).abs() < 1e-9);
            prop_assert!((parsed.confidence.value() - record.confidence.value()).abs() < 1e-9);
        }
    }
}
