//! Query Parser (C5): turns a raw user query into a safe FTS5 `MATCH`
//! expression. Never trusts raw input near the FTS5 grammar — operators and
//! punctuation that would otherwise carry syntactic meaning are stripped.

use regex::Regex;
use std::sync::OnceLock;

const UNSAFE_CHARS: &[char] = &[
    '{', '}', '(', ')', '^', ':', '+', '-', '~', '@', '#', '$', '%', '&', '|', '\\', '!', '<', '>', '=', '[', ']',
];

fn fts5_operator(token: &str) -> bool {
    matches!(token.to_ascii_uppercase().as_str(), "AND" | "OR" | "NOT" | "NEAR")
}

fn quoted_phrase_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([^"]*)""#).unwrap())
}

/// Parse `raw` into a sanitized FTS5 `MATCH` expression. An empty result
/// means "no query" — the caller should treat it as zero hits rather than
/// run an unconstrained scan.
pub fn parse_query(raw: &str) -> String {
    let mut phrases: Vec<String> = Vec::new();
    for capture in quoted_phrase_re().captures_iter(raw) {
        let phrase = capture[1].trim();
        if !phrase.is_empty() && !phrases.iter().any(|p| p == phrase) {
            phrases.push(phrase.to_string());
        }
    }
    let remainder = quoted_phrase_re().replace_all(raw, " ");

    let mut tokens: Vec<String> = Vec::new();
    for word in remainder.split_whitespace() {
        let is_prefix = word.ends_with('*');
        let core: String = word
            .trim_end_matches('*')
            .chars()
            .filter(|c| !UNSAFE_CHARS.contains(c))
            .collect();

        if core.is_empty() {
            continue;
        }
        if fts5_operator(&core) {
            continue;
        }
        if is_prefix {
            if core.chars().count() >= 2 {
                tokens.push(format!("{core}*"));
            }
            // Orphan `*` tokens (nothing, or a single char, before the star) are dropped.
        } else {
            tokens.push(core);
        }
    }

    let mut parts: Vec<String> = phrases.iter().map(|p| format!("\"{p}\"")).collect();
    parts.extend(tokens);
    parts.join(" ")
}
