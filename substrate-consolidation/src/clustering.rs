//! Optional pre-clustering ahead of distillation (C9 §4.9 stage 2,
//! gated by [`ConsolidationConfig::enable_pre_clustering`]). When disabled,
//! every selected candidate is its own single-member cluster; when enabled,
//! candidates are grouped by HDBSCAN over their freshly-embedded content so
//! one distillation call can summarize several related observations at
//! once.

use hdbscan::{Hdbscan, HdbscanHyperParams};
use substrate_core::memory::MemoryRecord;
use substrate_core::traits::EmbeddingProvider;

const MIN_CLUSTER_SIZE: usize = 2;

/// A group of candidates to be distilled together.
pub struct ClusterGroup {
    pub memories: Vec<MemoryRecord>,
}

/// Groups `candidates` into clusters. Embedding failures for individual
/// candidates fall back to a singleton cluster for that candidate rather
/// than failing the whole run.
pub async fn build_clusters(
    candidates: Vec<MemoryRecord>,
    embedder: Option<&dyn EmbeddingProvider>,
    enable_pre_clustering: bool,
) -> Vec<ClusterGroup> {
    if !enable_pre_clustering || candidates.len() < MIN_CLUSTER_SIZE {
        return candidates.into_iter().map(|m| ClusterGroup { memories: vec![m] }).collect();
    }

    let Some(embedder) = embedder else {
        return candidates.into_iter().map(|m| ClusterGroup { memories: vec![m] }).collect();
    };

    let mut embedded = Vec::with_capacity(candidates.len());
    let mut singletons = Vec::new();
    for memory in candidates {
        match embedder.embed(&memory.content).await {
            Ok(vector) => embedded.push((memory, vector)),
            Err(e) => {
                tracing::warn!(memory_id = %memory.id, error = %e, "pre-clustering embed failed, falling back to singleton");
                singletons.push(memory);
            }
        }
    }

    if embedded.len() < MIN_CLUSTER_SIZE {
        let mut groups: Vec<ClusterGroup> = embedded.into_iter().map(|(m, _)| ClusterGroup { memories: vec![m] }).collect();
        groups.extend(singletons.into_iter().map(|m| ClusterGroup { memories: vec![m] }));
        return groups;
    }

    let features: Vec<Vec<f32>> = embedded.iter().map(|(_, v)| v.clone()).collect();
    let hyper_params = HdbscanHyperParams::builder().min_cluster_size(MIN_CLUSTER_SIZE).min_samples(1).build();
    let clusterer = Hdbscan::new(&features, hyper_params);

    let labels = match clusterer.cluster() {
        Ok(labels) => labels,
        Err(_) => {
            tracing::warn!("hdbscan clustering failed, treating every candidate as noise");
            let mut groups: Vec<ClusterGroup> =
                embedded.into_iter().map(|(m, _)| ClusterGroup { memories: vec![m] }).collect();
            groups.extend(singletons.into_iter().map(|m| ClusterGroup { memories: vec![m] }));
            return groups;
        }
    };

    let mut by_label: std::collections::HashMap<i32, Vec<MemoryRecord>> = std::collections::HashMap::new();
    for ((memory, _), label) in embedded.into_iter().zip(labels.into_iter()) {
        if label < 0 {
            singletons.push(memory);
        } else {
            by_label.entry(label).or_default().push(memory);
        }
    }

    let mut groups: Vec<ClusterGroup> = by_label.into_values().map(|memories| ClusterGroup { memories }).collect();
    groups.extend(singletons.into_iter().map(|m| ClusterGroup { memories: vec![m] }));
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use substrate_core::errors::EmbeddingError;
    use substrate_core::memory::{Confidence, Importance, Layer, MemoryType, Provenance};
    use chrono::Utc;
    use uuid::Uuid;

    fn memory(content: &str) -> MemoryRecord {
        let now = Utc::now();
        MemoryRecord {
            id: Uuid::new_v4(),
            content: content.to_string(),
            memory_type: MemoryType::Observation,
            layer: Layer::Stm,
            importance: Importance::default(),
            confidence: Confidence::default(),
            tags: Default::default(),
            entities: Default::default(),
            provenance: Provenance::implicit("conv-1"),
            supersedes: None,
            superseded_by: None,
            created_at: now,
            updated_at: now,
            accessed_at: now,
            access_count: 0,
            checksum: "deadbeef".to_string(),
        }
    }

    struct EchoEmbedder;
    #[async_trait]
    impl EmbeddingProvider for EchoEmbedder {
        fn provider_id(&self) -> &str {
            "echo"
        }
        fn model_id(&self) -> &str {
            "v1"
        }
        fn dimensions(&self) -> usize {
            2
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if text.contains("dark") {
                Ok(vec![1.0, 0.0])
            } else {
                Ok(vec![0.0, 1.0])
            }
        }
    }

    #[tokio::test]
    async fn disabled_pre_clustering_yields_singletons() {
        let candidates = vec![memory("a"), memory("b")];
        let groups = build_clusters(candidates, None, false).await;
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.memories.len() == 1));
    }

    #[tokio::test]
    async fn single_candidate_is_always_a_singleton() {
        let groups = build_clusters(vec![memory("only one")], Some(&EchoEmbedder), true).await;
        assert_eq!(groups.len(), 1);
    }
}
