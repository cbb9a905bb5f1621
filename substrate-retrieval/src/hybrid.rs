//! Hybrid Search (C8): runs BM25 and vector retrieval concurrently over the
//! same query, fuses the two ranked sets by a configurable policy, and
//! applies a deterministic tie-break so repeated searches are stable.

use std::collections::HashMap;
use std::sync::Arc;

use substrate_core::config::{FusionPolicy, HybridSearchConfig};
use substrate_core::errors::SearchError;
use substrate_core::memory::{Layer, MemoryRecord, MemoryType};
use substrate_core::traits::EmbeddingProvider;
use substrate_storage::StorageEngine;
use uuid::Uuid;

use crate::bm25::{Bm25Retriever, Bm25SearchOptions};
use crate::vector::{VectorRetriever, VectorSearchOptions};

/// Filters shared by both sides of a hybrid search.
#[derive(Debug, Clone, Default)]
pub struct HybridSearchFilter {
    pub memory_type: Option<MemoryType>,
    pub layer: Option<Layer>,
    /// Floor applied to the fused score after ranking, and passed down to
    /// each side's own per-source threshold so neither retriever wastes a
    /// candidate slot on a hit that could never clear it post-fusion.
    pub min_score: Option<f64>,
}

/// One fused hit. `bm25_score`/`vector_score` are `None` when that side
/// didn't return this memory at all (as opposed to scoring it zero).
#[derive(Debug, Clone)]
pub struct HybridResult {
    pub memory: MemoryRecord,
    pub score: f64,
    pub bm25_score: Option<f64>,
    pub vector_score: Option<f64>,
    /// Weights actually applied to this result; `(0.0, 0.0, 0.0)` under RRF,
    /// which has no per-term weights to report.
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreBreakdown {
    pub bm25_weight: f64,
    pub vector_weight: f64,
    pub importance_boost: f64,
}

pub struct HybridSearch {
    bm25: Bm25Retriever,
    vector: VectorRetriever,
    config: HybridSearchConfig,
}

impl HybridSearch {
    pub fn new(storage: Arc<StorageEngine>, provider: Arc<dyn EmbeddingProvider>, config: HybridSearchConfig) -> Self {
        Self {
            bm25: Bm25Retriever::new(storage.clone()),
            vector: VectorRetriever::new(storage, provider),
            config,
        }
    }

    pub async fn search(
        &self,
        query: &str,
        filter: &HybridSearchFilter,
    ) -> Result<Vec<HybridResult>, SearchError> {
        let trimmed = query.trim();
        let candidate_cap = (self.config.result_limit * 3).max(self.config.per_source_limit);

        let bm25_options = Bm25SearchOptions {
            memory_type: filter.memory_type,
            layer: filter.layer,
            source_type: None,
            limit: candidate_cap,
            min_score: filter.min_score,
        };
        let vector_options = VectorSearchOptions {
            memory_type: filter.memory_type,
            layer: filter.layer,
            provider_filter: None,
            limit: candidate_cap,
            min_similarity: filter.min_score,
        };

        let (bm25_res, vector_res) = tokio::join!(
            async { self.bm25.search(trimmed, &bm25_options) },
            self.vector.search(trimmed, &vector_options),
        );

        let (bm25_hits, vector_hits) = match (bm25_res, vector_res) {
            (Ok(b), Ok(v)) => (b, v),
            (Ok(b), Err(ve)) => {
                tracing::warn!(error = %ve, "vector retriever failed, degrading to BM25-only");
                (b, Vec::new())
            }
            (Err(be), Ok(v)) => {
                tracing::warn!(error = %be, "BM25 retriever failed, degrading to vector-only");
                (Vec::new(), v)
            }
            (Err(be), Err(ve)) => {
                return Err(SearchError::SearchFailed {
                    reason: format!("both retrievers failed: bm25={be}, vector={ve}"),
                });
            }
        };

        let mut union: HashMap<Uuid, Candidate> = HashMap::new();
        for (rank, hit) in bm25_hits.into_iter().enumerate() {
            union.insert(
                hit.memory.id,
                Candidate {
                    memory: hit.memory,
                    bm25_score: Some(hit.score),
                    bm25_rank: Some(rank + 1),
                    vector_score: None,
                    vector_rank: None,
                },
            );
        }
        for (rank, hit) in vector_hits.into_iter().enumerate() {
            union
                .entry(hit.memory.id)
                .and_modify(|c| {
                    c.vector_score = Some(hit.similarity);
                    c.vector_rank = Some(rank + 1);
                })
                .or_insert_with(|| Candidate {
                    memory: hit.memory.clone(),
                    bm25_score: None,
                    bm25_rank: None,
                    vector_score: Some(hit.similarity),
                    vector_rank: Some(rank + 1),
                });
        }

        let mut results: Vec<HybridResult> = union.into_values().map(|c| self.fuse(c)).collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.vector_score
                        .unwrap_or(0.0)
                        .partial_cmp(&a.vector_score.unwrap_or(0.0))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| {
                    b.bm25_score
                        .unwrap_or(0.0)
                        .partial_cmp(&a.bm25_score.unwrap_or(0.0))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.memory.id.cmp(&b.memory.id))
        });

        if let Some(min_score) = filter.min_score {
            results.retain(|r| r.score >= min_score);
        }
        results.truncate(self.config.result_limit);
        Ok(results)
    }

    fn fuse(&self, candidate: Candidate) -> HybridResult {
        let (score, breakdown) = match &self.config.fusion {
            FusionPolicy::WeightedSum {
                bm25_weight,
                vector_weight,
                importance_boost,
            } => {
                let total = (bm25_weight + vector_weight).max(f64::EPSILON);
                let (wb, wv) = (bm25_weight / total, vector_weight / total);
                let importance = candidate.memory.importance.value().min(1.0);
                let score = candidate.bm25_score.unwrap_or(0.0) * wb
                    + candidate.vector_score.unwrap_or(0.0) * wv
                    + importance * importance_boost;
                (
                    score.clamp(0.0, 1.0),
                    ScoreBreakdown {
                        bm25_weight: wb,
                        vector_weight: wv,
                        importance_boost: *importance_boost,
                    },
                )
            }
            FusionPolicy::Rrf { k } => {
                let k = *k as f64;
                let mut score = 0.0;
                if let Some(rank) = candidate.bm25_rank {
                    score += 1.0 / (k + rank as f64);
                }
                if let Some(rank) = candidate.vector_rank {
                    score += 1.0 / (k + rank as f64);
                }
                (score.clamp(0.0, 1.0), ScoreBreakdown::default())
            }
        };

        HybridResult {
            memory: candidate.memory,
            score,
            bm25_score: candidate.bm25_score,
            vector_score: candidate.vector_score,
            breakdown,
        }
    }
}

struct Candidate {
    memory: MemoryRecord,
    bm25_score: Option<f64>,
    bm25_rank: Option<usize>,
    vector_score: Option<f64>,
    vector_rank: Option<usize>,
}
