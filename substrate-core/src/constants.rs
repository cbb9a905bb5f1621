/// Current relational index schema version. Bump alongside a new migration.
pub const SCHEMA_VERSION: i64 = 1;

/// FTS5 snippet markers wrapping matched terms in BM25 results.
pub const SNIPPET_START_MARKER: &str = ">>>";
pub const SNIPPET_END_MARKER: &str = "<<<";

/// Token window radius used when building a BM25 snippet around a match.
pub const SNIPPET_WINDOW_TOKENS: usize = 32;

/// Deterministic tie-break order for hybrid search: score, then vector
/// score, then BM25 score, then memory id.
pub const HYBRID_TIE_BREAK_FIELDS: [&str; 4] =
    ["score", "vector_score", "bm25_score", "memory_id"];

/// Default page size for `MemoryRepository::list` when the caller doesn't
/// specify one.
pub const DEFAULT_LIST_PAGE_SIZE: usize = 50;
