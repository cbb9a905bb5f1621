use thiserror::Error;

/// Failures from serializing or parsing a memory's Markdown file.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("file has no YAML frontmatter block")]
    MissingFrontmatter,

    #[error("invalid frontmatter: {reason}")]
    InvalidFrontmatter { reason: String },

    #[error("failed to serialize frontmatter: {reason}")]
    SerializeFailed { reason: String },
}
