//! Scoring modes and their signal weights.
//!
//! The mode depends on the working set as a whole: as soon as any tab has
//! completed enrichment, every candidate is scored in hybrid mode.

use serde::{Deserialize, Serialize};
use tracing::debug;

use tabweave_core::{defaults, TabDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMode {
    /// No enrichment anywhere: text and behavior only.
    Lite,
    /// At least one enriched tab: entity/topic/relationship signals apply.
    Hybrid,
}

impl ScoringMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringMode::Lite => "lite",
            ScoringMode::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for ScoringMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weight of every signal. A signal unused by a mode carries weight 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalWeights {
    pub text: f64,
    pub cosine: f64,
    /// Lite mode only: mean of entity and topic overlap.
    pub ai_bonus: f64,
    pub entity: f64,
    pub topic: f64,
    pub relationship: f64,
    pub behavioral: f64,
    pub access: f64,
    pub recency: f64,
    pub temporal: f64,
    /// Same-domain bonus, zero in both modes.
    pub domain: f64,
}

impl SignalWeights {
    pub fn lite() -> Self {
        Self {
            text: defaults::LITE_WEIGHT_TEXT,
            cosine: defaults::LITE_WEIGHT_COSINE,
            ai_bonus: defaults::LITE_WEIGHT_AI_BONUS,
            entity: 0.0,
            topic: 0.0,
            relationship: 0.0,
            behavioral: defaults::LITE_WEIGHT_BEHAVIORAL,
            access: defaults::LITE_WEIGHT_ACCESS,
            recency: defaults::LITE_WEIGHT_RECENCY,
            temporal: defaults::LITE_WEIGHT_TEMPORAL,
            domain: defaults::DOMAIN_MATCH_WEIGHT,
        }
    }

    pub fn hybrid() -> Self {
        Self {
            text: defaults::HYBRID_WEIGHT_TEXT,
            cosine: defaults::HYBRID_WEIGHT_COSINE,
            ai_bonus: 0.0,
            entity: defaults::HYBRID_WEIGHT_ENTITY,
            topic: defaults::HYBRID_WEIGHT_TOPIC,
            relationship: defaults::HYBRID_WEIGHT_RELATIONSHIP,
            behavioral: defaults::HYBRID_WEIGHT_BEHAVIORAL,
            access: 0.0,
            recency: 0.0,
            temporal: 0.0,
            domain: defaults::DOMAIN_MATCH_WEIGHT,
        }
    }

    pub fn for_mode(mode: ScoringMode) -> Self {
        match mode {
            ScoringMode::Lite => Self::lite(),
            ScoringMode::Hybrid => Self::hybrid(),
        }
    }

    pub fn total(&self) -> f64 {
        self.text
            + self.cosine
            + self.ai_bonus
            + self.entity
            + self.topic
            + self.relationship
            + self.behavioral
            + self.access
            + self.recency
            + self.temporal
            + self.domain
    }
}

/// Hybrid when any document in the working set is enriched.
pub fn select_mode<'a>(docs: impl IntoIterator<Item = &'a TabDocument>) -> ScoringMode {
    let mut total = 0usize;
    let mut enriched = 0usize;
    for doc in docs {
        total += 1;
        if doc.is_enriched() {
            enriched += 1;
        }
    }
    let mode = if enriched > 0 {
        ScoringMode::Hybrid
    } else {
        ScoringMode::Lite
    };
    debug!(
        scoring_mode = mode.as_str(),
        candidate_count = total,
        enriched_count = enriched,
        "Scoring mode selected"
    );
    mode
}
