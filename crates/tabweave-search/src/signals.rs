//! Per-candidate signal functions. Every signal is in `[0, 1]` and a
//! missing input yields 0 rather than an error.

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use uuid::Uuid;

use tabweave_core::{defaults, jaccard, shared_terms, NavigationEvent, Relationship, TabDocument};

use crate::text_index::TextIndex;

/// Query text for the current tab: the title repeated for a title boost,
/// plus the enriched fields when requested and available.
pub fn build_query(current: &TabDocument, include_enrichment: bool) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for _ in 0..defaults::QUERY_TITLE_REPEAT {
        parts.push(&current.title);
    }
    if include_enrichment && current.is_enriched() {
        if let Some(summary) = current.summary() {
            parts.push(summary);
        }
        let repeated = [
            (current.keywords(), defaults::QUERY_KEYWORD_REPEAT),
            (current.entities(), defaults::QUERY_ENTITY_REPEAT),
            (current.topics(), defaults::QUERY_TOPIC_REPEAT),
        ];
        for (terms, times) in repeated {
            for _ in 0..times {
                parts.extend(terms.iter().map(String::as_str));
            }
        }
    }
    parts.join(" ")
}

/// BM25 of `query` against the candidate, scaled into `[0, 1]`.
pub fn text_score(index: &TextIndex, query: &str, candidate: Uuid, k1: f64, b: f64) -> f64 {
    (index.bm25(query, candidate, k1, b) / defaults::BM25_NORMALIZER).clamp(0.0, 1.0)
}

fn overlap_score(a: &[String], b: &[String], divisor: f64, cap: f64) -> f64 {
    let common = shared_terms(a, b).len() as f64;
    (jaccard(a, b) + (common / divisor).min(cap)).clamp(0.0, 1.0)
}

/// Entity Jaccard plus a capped overlap-count bonus. Zero unless at least
/// one side is enriched.
pub fn entity_overlap(current: &TabDocument, candidate: &TabDocument) -> f64 {
    if !current.is_enriched() && !candidate.is_enriched() {
        return 0.0;
    }
    overlap_score(
        current.entities(),
        candidate.entities(),
        defaults::ENTITY_OVERLAP_DIVISOR,
        defaults::ENTITY_OVERLAP_CAP,
    )
}

pub fn topic_overlap(current: &TabDocument, candidate: &TabDocument) -> f64 {
    if !current.is_enriched() && !candidate.is_enriched() {
        return 0.0;
    }
    overlap_score(
        current.topics(),
        candidate.topics(),
        defaults::TOPIC_OVERLAP_DIVISOR,
        defaults::TOPIC_OVERLAP_CAP,
    )
}

/// Raw strength, or the semantic score when an enriched relationship's
/// judgment is higher. Never the sum of the two.
pub fn relationship_signal(relationship: Option<&Relationship>) -> f64 {
    let Some(relationship) = relationship else {
        return 0.0;
    };
    let semantic = relationship.metadata.semantic_score.unwrap_or(0.0);
    let value = if relationship.ai_enriched && semantic > 0.0 {
        relationship.strength.max(semantic)
    } else {
        relationship.strength
    };
    value.clamp(0.0, 1.0)
}

/// How often recent navigations out of the current tab landed on the
/// candidate, saturating at ten.
pub fn behavioral_score(events_from_current: &[NavigationEvent], candidate: Uuid) -> f64 {
    let landed = events_from_current
        .iter()
        .filter(|e| e.destination.id == candidate)
        .count();
    (landed as f64 / defaults::COUNT_SATURATION).min(1.0)
}

pub fn access_frequency(candidate: &TabDocument) -> f64 {
    (candidate.access_count as f64 / defaults::COUNT_SATURATION).min(1.0)
}

/// Truncate to the start of the minute.
pub fn floor_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(TimeDelta::minutes(1)).unwrap_or(ts)
}

fn whole_minutes_between(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
    (floor_to_minute(a) - floor_to_minute(b)).num_minutes().abs() as f64
}

/// Linear decay to zero over a day since the candidate was last accessed.
pub fn recency(last_accessed: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let minutes = whole_minutes_between(now, last_accessed);
    (1.0 - minutes / defaults::RECENCY_WINDOW_MINUTES).clamp(0.0, 1.0)
}

/// Quadratic decay over a half-hour window between two access times.
pub fn temporal_proximity(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
    let minutes = whole_minutes_between(a, b);
    if minutes >= defaults::TEMPORAL_WINDOW_MINUTES {
        return 0.0;
    }
    let linear = 1.0 - minutes / defaults::TEMPORAL_WINDOW_MINUTES;
    linear * linear
}
