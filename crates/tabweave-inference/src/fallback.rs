//! Deterministic substitutes used when the AI capability is absent or fails.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

use tabweave_core::defaults;

use crate::types::ExtractedMetadata;

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her",
        "was", "one", "our", "out", "has", "have", "been", "from", "this", "that", "with",
        "they", "will", "would", "there", "their", "what", "about", "which", "when", "your",
        "more", "also", "into", "than", "then", "them", "these", "those", "some", "such",
        "only", "other", "were", "where", "while", "here", "just", "over", "very", "each",
        "how", "its", "who", "may", "should", "could", "does", "did", "our", "use", "using",
        "used", "get", "page", "click", "sign", "log", "menu", "home", "privacy", "cookie",
        "cookies", "terms", "http", "https", "www",
    ]
    .into_iter()
    .collect()
});

static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{L}][\p{L}\p{N}'-]*").expect("valid word pattern"));

static ENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\p{Lu}[\p{L}\p{N}&.-]*(?:[ \t]+\p{Lu}[\p{L}\p{N}&.-]*)*")
        .expect("valid entity pattern")
});

/// First `max_words` whitespace-separated words of `text`.
pub fn naive_summary(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Terms ranked by count descending, ties by first appearance.
fn ranked_by_count(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (position, item) in items.enumerate() {
        let entry = counts.entry(item).or_insert((0, position));
        entry.0 += 1;
    }
    let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|(_, (ca, pa)), (_, (cb, pb))| cb.cmp(ca).then(pa.cmp(pb)));
    ranked.into_iter().map(|(term, _)| term).collect()
}

/// Manual term-frequency extraction over the title and text.
///
/// Keywords are the most frequent non-stop-words, entities the most frequent
/// capitalized phrases, topics the leading keywords. The document type is
/// left as `other` for the caller to refine from the URL.
pub fn extract_by_frequency(title: &str, text: &str) -> ExtractedMetadata {
    let corpus = format!("{}\n{}", title, text);

    let words = WORD_RE
        .find_iter(&corpus)
        .map(|m| m.as_str().to_lowercase().trim_matches(['\'', '-']).to_string())
        .filter(|w| w.chars().count() >= defaults::TOKEN_MIN_LEN)
        .filter(|w| !STOP_WORDS.contains(w.as_str()));
    let keywords: Vec<String> = ranked_by_count(words)
        .into_iter()
        .take(defaults::FALLBACK_KEYWORD_COUNT)
        .collect();

    let phrases = ENTITY_RE
        .find_iter(&corpus)
        .map(|m| m.as_str().trim_end_matches(['.', '-']).to_string())
        .filter(|p| {
            let lower = p.to_lowercase();
            p.chars().count() >= defaults::TOKEN_MIN_LEN && !STOP_WORDS.contains(lower.as_str())
        });
    let entities: Vec<String> = ranked_by_count(phrases)
        .into_iter()
        .take(defaults::FALLBACK_ENTITY_COUNT)
        .collect();

    let topics = keywords
        .iter()
        .take(defaults::FALLBACK_TOPIC_COUNT)
        .cloned()
        .collect();

    ExtractedMetadata {
        keywords,
        entities,
        topics,
        document_type: Default::default(),
    }
}
