//! Greedy recurring-cluster detection (C10 §4.10): groups memories by a
//! blended similarity of their content and topic tokens, then scores each
//! cluster's confidence from its frequency, recency, and internal
//! consistency.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use substrate_core::config::PatternDetectorConfig;
use substrate_core::memory::{MemoryRecord, MemoryType};
use uuid::Uuid;

use crate::normalize::{content_tokens, jaccard};
use crate::pattern::DetectedPattern;

/// Weight given to content-token Jaccard in the blended similarity; the
/// remainder (`1.0 - CONTENT_WEIGHT`) goes to tag overlap.
const CONTENT_WEIGHT: f64 = 0.7;

struct ClusterAccumulator {
    members: Vec<usize>,
    content_union: BTreeSet<String>,
    tag_union: BTreeSet<String>,
}

fn blended_similarity(
    content_a: &BTreeSet<String>,
    tags_a: &[String],
    content_b: &BTreeSet<String>,
    tags_b: &[String],
) -> f64 {
    let tags_a: BTreeSet<String> = tags_a.iter().cloned().collect();
    let tags_b: BTreeSet<String> = tags_b.iter().cloned().collect();
    CONTENT_WEIGHT * jaccard(content_a, content_b) + (1.0 - CONTENT_WEIGHT) * jaccard(&tags_a, &tags_b)
}

/// Greedily assigns each memory to the first existing cluster whose
/// aggregate token set clears `config.similarity_threshold`, or starts a
/// new cluster. Clusters below `config.min_occurrences` are dropped before
/// scoring.
pub fn build_clusters(memories: &[MemoryRecord], config: &PatternDetectorConfig, now: DateTime<Utc>) -> Vec<DetectedPattern> {
    let tokens: Vec<BTreeSet<String>> = memories.iter().map(|m| content_tokens(&m.content)).collect();
    let mut clusters: Vec<ClusterAccumulator> = Vec::new();

    for (idx, memory) in memories.iter().enumerate() {
        let best = clusters
            .iter()
            .enumerate()
            .map(|(ci, cluster)| {
                (
                    ci,
                    blended_similarity(&tokens[idx], &memory.tags, &cluster.content_union, &cluster.tag_union),
                )
            })
            .filter(|(_, score)| *score >= config.similarity_threshold)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        match best {
            Some((ci, _)) => {
                clusters[ci].members.push(idx);
                clusters[ci].content_union.extend(tokens[idx].iter().cloned());
                clusters[ci].tag_union.extend(memory.tags.iter().cloned());
            }
            None => clusters.push(ClusterAccumulator {
                members: vec![idx],
                content_union: tokens[idx].clone(),
                tag_union: memory.tags.iter().cloned().collect(),
            }),
        }
    }

    clusters
        .into_iter()
        .filter(|c| c.members.len() >= config.min_occurrences as usize)
        .map(|c| score_cluster(&c, memories, &tokens, config, now))
        .collect()
}

fn score_cluster(
    cluster: &ClusterAccumulator,
    memories: &[MemoryRecord],
    tokens: &[BTreeSet<String>],
    config: &PatternDetectorConfig,
    now: DateTime<Utc>,
) -> DetectedPattern {
    let members: Vec<&MemoryRecord> = cluster.members.iter().map(|&i| &memories[i]).collect();

    let first_seen = members.iter().map(|m| m.created_at).min().unwrap_or(now);
    let last_seen = members.iter().map(|m| m.created_at).max().unwrap_or(now);
    let occurrences = members.len();

    let frequency_factor = (occurrences as f64 / (config.min_occurrences as f64 * 2.0)).min(1.0);

    let age_ms = (now - last_seen).num_milliseconds().max(0) as f64;
    let recency_factor = (1.0 - age_ms / config.window_ms as f64).clamp(0.0, 1.0);

    let consistency_factor = mean_pairwise_jaccard(&cluster.members, tokens);

    let confidence = (frequency_factor * recency_factor * consistency_factor).clamp(0.0, 1.0);

    let pattern_type = dominant_memory_type(&members).as_str().to_string();
    let representative_content = members
        .iter()
        .max_by_key(|m| m.content.len())
        .map(|m| m.content.clone())
        .unwrap_or_default();

    DetectedPattern {
        cluster_id: Uuid::new_v4(),
        pattern_type,
        member_ids: members.iter().map(|m| m.id).collect(),
        representative_content,
        confidence,
        first_seen,
        last_seen,
        occurrences,
    }
}

/// Average Jaccard similarity between every distinct pair of members,
/// a proxy for how tightly the cluster actually hangs together. A
/// singleton cluster (can't happen once `min_occurrences >= 2` is
/// enforced) would report perfect consistency.
fn mean_pairwise_jaccard(member_indices: &[usize], tokens: &[BTreeSet<String>]) -> f64 {
    if member_indices.len() < 2 {
        return 1.0;
    }
    let mut total = 0.0;
    let mut pairs = 0usize;
    for i in 0..member_indices.len() {
        for j in (i + 1)..member_indices.len() {
            total += jaccard(&tokens[member_indices[i]], &tokens[member_indices[j]]);
            pairs += 1;
        }
    }
    if pairs == 0 {
        1.0
    } else {
        total / pairs as f64
    }
}

fn dominant_memory_type(members: &[&MemoryRecord]) -> MemoryType {
    let mut counts: Vec<(MemoryType, usize)> = Vec::new();
    for m in members {
        if let Some(entry) = counts.iter_mut().find(|(t, _)| *t == m.memory_type) {
            entry.1 += 1;
        } else {
            counts.push((m.memory_type, 1));
        }
    }
    counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(t, _)| t)
        .unwrap_or(MemoryType::Observation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use substrate_core::memory::{Confidence, Importance, Layer, Provenance};

    fn memory(content: &str, age_days: i64) -> MemoryRecord {
        let now = Utc::now();
        MemoryRecord {
            id: Uuid::new_v4(),
            content: content.to_string(),
            memory_type: MemoryType::Observation,
            layer: Layer::Stm,
            importance: Importance::default(),
            confidence: Confidence::default(),
            tags: Vec::new(),
            entities: Vec::new(),
            provenance: Provenance::implicit("conv-1"),
            supersedes: None,
            superseded_by: None,
            created_at: now - chrono::Duration::days(age_days),
            updated_at: now,
            accessed_at: now,
            access_count: 0,
            checksum: "deadbeef".to_string(),
        }
    }

    #[test]
    fn recurring_content_forms_one_cluster_above_min_occurrences() {
        let config = PatternDetectorConfig::default();
        let memories = vec![
            memory("the user always reviews pull requests before lunch", 1),
            memory("the user reviews pull requests every morning before lunch", 2),
            memory("user reviews pull requests before having lunch", 3),
            memory("completely unrelated note about vacation plans", 1),
        ];

        let patterns = build_clusters(&memories, &config, Utc::now());
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].occurrences, 3);
        assert!(patterns[0].confidence > 0.0);
    }

    #[test]
    fn clusters_below_min_occurrences_are_dropped() {
        let config = PatternDetectorConfig::default();
        let memories = vec![memory("a one-off note about something rare", 1), memory("totally different content here", 1)];

        let patterns = build_clusters(&memories, &config, Utc::now());
        assert!(patterns.is_empty());
    }

    #[test]
    fn stale_clusters_score_lower_recency() {
        let config = PatternDetectorConfig::default();
        let fresh = vec![
            memory("the user always reviews pull requests before lunch", 0),
            memory("the user reviews pull requests every morning before lunch", 0),
            memory("user reviews pull requests before having lunch", 0),
        ];
        let stale = vec![
            memory("the user always reviews pull requests before lunch", 29),
            memory("the user reviews pull requests every morning before lunch", 29),
            memory("user reviews pull requests before having lunch", 29),
        ];

        let fresh_confidence = build_clusters(&fresh, &config, Utc::now())[0].confidence;
        let stale_confidence = build_clusters(&stale, &config, Utc::now())[0].confidence;
        assert!(fresh_confidence > stale_confidence);
    }
}
