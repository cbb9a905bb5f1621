//! BM25 Retriever (C6): FTS5 MATCH ordered by `rank`, with min-max score
//! normalization and snippet extraction. `query` is expected to already be
//! sanitized by [`crate::query_parser::parse_query`].

use std::sync::Arc;

use substrate_core::errors::SearchError;
use substrate_core::memory::{Layer, MemoryRecord, MemoryType, SourceType};
use substrate_storage::{ListFilter, StorageEngine};

use crate::query_parser::parse_query;

/// One BM25 hit with its raw rank and a normalized `[0, 1]` score.
#[derive(Debug, Clone)]
pub struct Bm25Result {
    pub memory: MemoryRecord,
    pub raw_rank: f64,
    pub score: f64,
    pub snippet: String,
}

/// Filters and limit shared by a single BM25 search call.
#[derive(Debug, Clone, Default)]
pub struct Bm25SearchOptions {
    pub memory_type: Option<MemoryType>,
    pub layer: Option<Layer>,
    pub source_type: Option<SourceType>,
    pub limit: usize,
    /// Applied after normalization: results are min-max scaled first, then
    /// filtered.
    pub min_score: Option<f64>,
}

impl Bm25SearchOptions {
    fn filter(&self) -> ListFilter {
        ListFilter {
            memory_type: self.memory_type,
            layer: self.layer,
            source_type: self.source_type,
        }
    }
}

pub struct Bm25Retriever {
    storage: Arc<StorageEngine>,
}

impl Bm25Retriever {
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    /// Runs `raw_query` (pre-sanitization) through FTS5 and returns results
    /// ordered by normalized score descending. An empty parsed query yields
    /// an empty result set rather than an unconstrained scan.
    pub fn search(&self, raw_query: &str, options: &Bm25SearchOptions) -> Result<Vec<Bm25Result>, SearchError> {
        let parsed = parse_query(raw_query);
        if parsed.is_empty() {
            return Ok(Vec::new());
        }

        let limit = if options.limit == 0 { 20 } else { options.limit };
        let hits = self
            .storage
            .search_fts5(&parsed, &options.filter(), limit)
            .map_err(|e| SearchError::SearchFailed { reason: e.to_string() })?;

        if hits.is_empty() {
            return Ok(Vec::new());
        }

        // FTS5 rank is more-negative-is-better; map the most negative value
        // in this result set to 1.0 and the least negative to 0.0.
        let min_rank = hits.iter().map(|h| h.raw_rank).fold(f64::INFINITY, f64::min);
        let max_rank = hits.iter().map(|h| h.raw_rank).fold(f64::NEG_INFINITY, f64::max);
        let spread = max_rank - min_rank;

        let mut results: Vec<Bm25Result> = hits
            .into_iter()
            .map(|hit| {
                let score = if spread.abs() < f64::EPSILON {
                    1.0
                } else {
                    (max_rank - hit.raw_rank) / spread
                };
                Bm25Result {
                    memory: hit.memory,
                    raw_rank: hit.raw_rank,
                    score,
                    snippet: hit.snippet,
                }
            })
            .collect();

        if let Some(min_score) = options.min_score {
            results.retain(|r| r.score >= min_score);
        }

        Ok(results)
    }
}
