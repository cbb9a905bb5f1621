//! Content normalization shared by clustering and topic extraction: lowercase,
//! strip punctuation, drop stopwords and tokens too short to be meaningful.

use std::collections::BTreeSet;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "if", "then", "than", "so", "to", "of", "in", "on",
    "for", "with", "at", "by", "from", "as", "is", "was", "were", "are", "be", "been", "being",
    "this", "that", "these", "those", "it", "its", "they", "them", "their", "he", "she", "his",
    "her", "you", "your", "i", "we", "us", "our", "has", "have", "had", "do", "does", "did",
    "will", "would", "should", "could", "can", "about", "into", "over", "under", "again",
    "further", "because", "while", "where", "when", "what", "which", "who", "whom", "not", "no",
];

/// Lowercased, punctuation-stripped, stopword-filtered token set. Used as
/// the basis for Jaccard similarity between two memories' content.
pub fn content_tokens(content: &str) -> BTreeSet<String> {
    let stop: BTreeSet<&str> = STOPWORDS.iter().copied().collect();
    content
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() >= 3 && !stop.contains(w.as_str()))
        .collect()
}

/// Jaccard similarity between two token sets: `|A ∩ B| / |A ∪ B|`, `1.0`
/// for two empty sets (vacuously identical), `0.0` when only one is empty.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_and_lowercases() {
        let tokens = content_tokens("The User's Editor: Dark-Mode, always!");
        assert!(tokens.contains("user"));
        assert!(tokens.contains("editor"));
        assert!(tokens.contains("dark"));
        assert!(tokens.contains("mode"));
        assert!(tokens.contains("always"));
        assert!(!tokens.contains("the"));
    }

    #[test]
    fn drops_short_and_stop_tokens() {
        let tokens = content_tokens("it is a to be");
        assert!(tokens.is_empty());
    }

    #[test]
    fn jaccard_of_identical_sets_is_one() {
        let a = content_tokens("dark mode preference");
        let b = content_tokens("dark mode preference");
        assert_eq!(jaccard(&a, &b), 1.0);
    }

    #[test]
    fn jaccard_of_disjoint_sets_is_zero() {
        let a = content_tokens("dark mode editor");
        let b = content_tokens("lunch schedule friday");
        assert_eq!(jaccard(&a, &b), 0.0);
    }

    #[test]
    fn jaccard_of_two_empty_sets_is_one() {
        let a = content_tokens("it is");
        let b = content_tokens("a to");
        assert_eq!(jaccard(&a, &b), 1.0);
    }
}
