//! Query Parser, BM25 Retriever, Vector Retriever, and Hybrid Search
//! (C5-C8): turns a raw query into safe FTS5 syntax, runs lexical and
//! semantic retrieval concurrently, and fuses the two into one ranked list.

pub mod bm25;
pub mod hybrid;
pub mod query_parser;
pub mod vector;

pub use bm25::{Bm25Result, Bm25Retriever, Bm25SearchOptions};
pub use hybrid::{HybridResult, HybridSearch, HybridSearchFilter, ScoreBreakdown};
pub use query_parser::parse_query;
pub use vector::{VectorResult, VectorRetriever, VectorSearchOptions};
