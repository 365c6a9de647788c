//! Keyword extraction and overlap similarity
//!
//! Shared by the search-event dedup in the recorder and the query expansion
//! in the scoring pipeline.

use std::collections::HashSet;

/// Tokens dropped before keyword matching. Single-character tokens are
/// dropped regardless.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "i",
    "in", "is", "it", "its", "me", "my", "of", "on", "or", "our", "so", "that", "the", "their",
    "them", "they", "this", "to", "was", "we", "were", "will", "with", "you", "your",
];

/// Lowercase, split on non-alphanumeric boundaries, strip stopwords and
/// single-character tokens, dedup preserving first-seen order.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut keywords = Vec::new();

    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
    {
        if STOPWORDS.contains(&token) {
            continue;
        }
        if seen.insert(token.to_string()) {
            keywords.push(token.to_string());
        }
    }

    keywords
}

/// Keyword-overlap similarity: intersection size over the larger keyword-set
/// size. Empty sets never match.
pub fn keyword_similarity(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let set_a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = b.iter().map(String::as_str).collect();

    let intersection = set_a.intersection(&set_b).count();
    let max_len = set_a.len().max(set_b.len());

    intersection as f64 / max_len as f64
}
