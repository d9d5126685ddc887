//! Labeled-section parsers for model responses.
//!
//! Parsers never fail: a missing or malformed section falls back to its
//! default (empty list, `other`, score 0, `unrelated`, empty reason).

use once_cell::sync::Lazy;
use regex::Regex;
use std::str::FromStr;

use tabweave_core::{DocumentType, RelationshipType};

use crate::types::{ExtractedMetadata, SimilarityJudgment};

/// Maximum items kept per list section.
const MAX_SECTION_ITEMS: usize = 10;

static SCORE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?|\.\d+").expect("valid score pattern"));

/// Value of the first line labeled `label` (case-insensitive), with markdown
/// emphasis and list markers stripped from the line start.
fn section<'a>(response: &'a str, label: &str) -> Option<&'a str> {
    let label = label.to_lowercase();
    response.lines().find_map(|line| {
        let trimmed = line
            .trim()
            .trim_start_matches(['-', '*', '#', ' '])
            .trim_start();
        let (head, rest) = trimmed.split_once(':')?;
        let head = head.trim().trim_matches('*').trim().to_lowercase();
        (head == label).then(|| rest.trim().trim_start_matches('*').trim())
    })
}

fn list_section(response: &str, label: &str) -> Vec<String> {
    let Some(value) = section(response, label) else {
        return Vec::new();
    };
    let mut seen = std::collections::HashSet::new();
    value
        .split(',')
        .map(|item| item.trim().trim_matches(['"', '\'', '.', '[', ']']).trim())
        .filter(|item| !item.is_empty() && !item.eq_ignore_ascii_case("none"))
        .filter(|item| seen.insert(item.to_lowercase()))
        .take(MAX_SECTION_ITEMS)
        .map(str::to_string)
        .collect()
}

/// Parse a KEYWORDS / ENTITIES / TOPICS / TYPE response.
pub fn parse_extraction(response: &str) -> ExtractedMetadata {
    let document_type = section(response, "TYPE")
        .and_then(|value| value.split(|c: char| c == ',' || c == '(').next())
        .and_then(|token| DocumentType::from_str(token.trim().trim_matches('.')).ok())
        .unwrap_or_default();

    ExtractedMetadata {
        keywords: list_section(response, "KEYWORDS"),
        entities: list_section(response, "ENTITIES"),
        topics: list_section(response, "TOPICS"),
        document_type,
    }
}

/// Parse a SIMILARITY_SCORE / RELATIONSHIP_TYPE / REASON response.
pub fn parse_similarity(response: &str) -> SimilarityJudgment {
    let score = section(response, "SIMILARITY_SCORE")
        .and_then(|value| SCORE_RE.find(value))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0);

    let relationship_type = section(response, "RELATIONSHIP_TYPE")
        .and_then(|value| {
            value
                .split_whitespace()
                .next()
                .map(|t| t.trim_matches(|c: char| !c.is_ascii_alphabetic()))
        })
        .and_then(|token| RelationshipType::from_str(token).ok())
        .filter(|t| {
            matches!(
                t,
                RelationshipType::Similar
                    | RelationshipType::Complementary
                    | RelationshipType::Sequential
                    | RelationshipType::Unrelated
            )
        })
        .unwrap_or(RelationshipType::Unrelated);

    let reason = section(response, "REASON").unwrap_or_default().to_string();

    SimilarityJudgment::new(score, relationship_type, reason)
}
