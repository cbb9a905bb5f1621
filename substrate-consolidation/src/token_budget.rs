//! Enforces the distillation token budget (C9 §4.9 stage 2) before a
//! cluster's contents are handed to the distillation provider.

use tiktoken_rs::CoreBPE;

/// Wraps the `cl100k_base` tokenizer used to estimate request size.
pub struct TokenBudgeter {
    bpe: CoreBPE,
}

impl TokenBudgeter {
    pub fn new() -> Self {
        Self {
            bpe: tiktoken_rs::cl100k_base().expect("failed to load cl100k_base tokenizer"),
        }
    }

    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Greedily includes as many `contents` (in order) as fit within
    /// `max_output_tokens * INPUT_TO_OUTPUT_RATIO` input tokens. Dropped
    /// entries are reported so the caller can log what was excluded rather
    /// than silently truncating.
    pub fn fit_within_budget<'a>(&self, contents: &'a [String], max_output_tokens: usize) -> (Vec<&'a str>, usize) {
        const INPUT_TO_OUTPUT_RATIO: usize = 4;
        let budget = max_output_tokens.saturating_mul(INPUT_TO_OUTPUT_RATIO).max(1);

        let mut kept = Vec::with_capacity(contents.len());
        let mut used = 0usize;
        let mut dropped = 0usize;
        for content in contents {
            let tokens = self.count(content);
            if used + tokens > budget && !kept.is_empty() {
                dropped += 1;
                continue;
            }
            used += tokens;
            kept.push(content.as_str());
        }
        (kept, dropped)
    }
}

impl Default for TokenBudgeter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_at_least_one_content_even_over_budget() {
        let budgeter = TokenBudgeter::new();
        let contents = vec!["a".repeat(5000)];
        let (kept, dropped) = budgeter.fit_within_budget(&contents, 1);
        assert_eq!(kept.len(), 1);
        assert_eq!(dropped, 0);
    }

    #[test]
    fn drops_entries_once_budget_is_exceeded() {
        let budgeter = TokenBudgeter::new();
        let contents: Vec<String> = (0..50).map(|i| format!("memory entry number {i} with some words")).collect();
        let (kept, dropped) = budgeter.fit_within_budget(&contents, 8);
        assert!(kept.len() < contents.len());
        assert_eq!(kept.len() + dropped, contents.len());
    }
}
