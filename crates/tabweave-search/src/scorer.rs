//! Hybrid scorer: one additive weighted score per candidate tab.
//!
//! Every signal lookup that fails is logged and counted as zero, so scoring
//! itself never fails. Ordering is total: score descending, then tab handle
//! ascending, then document id.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, trace, warn};
use uuid::Uuid;

use tabweave_core::{defaults, shared_terms, NavigationEvent, NavigationEventRepository, TabDocument};
use tabweave_graph::{RelationshipGraph, WorkflowMiner, WorkflowPrediction};

use crate::shared::SharedTextIndex;
use crate::signals;
use crate::text_index::TextIndex;
use crate::weights::{select_mode, ScoringMode, SignalWeights};

/// Configuration for the hybrid scorer.
#[derive(Debug, Clone)]
pub struct ScorerConfig {
    pub k1: f64,
    pub b: f64,
    /// Maximum scored candidates returned.
    pub limit: usize,
    /// Multiplier on workflow prediction confidence, added after weighting.
    pub workflow_bonus_weight: f64,
    /// Navigation events from the current tab examined for behavior.
    pub behavioral_window: usize,
    /// Index terms attached to each explanation.
    pub explanation_terms: usize,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            k1: defaults::BM25_K1,
            b: defaults::BM25_B,
            limit: defaults::SUGGESTION_LIMIT,
            workflow_bonus_weight: defaults::WORKFLOW_BONUS_WEIGHT,
            behavioral_window: defaults::BEHAVIORAL_EVENT_WINDOW,
            explanation_terms: defaults::EXPLANATION_TOP_TERMS,
        }
    }
}

impl ScorerConfig {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_bm25(mut self, k1: f64, b: f64) -> Self {
        self.k1 = k1;
        self.b = b;
        self
    }
}

/// Raw value of every signal for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub mode: ScoringMode,
    pub text: f64,
    pub cosine: f64,
    pub ai_bonus: f64,
    pub entity_overlap: f64,
    pub topic_overlap: f64,
    pub relationship: f64,
    pub behavioral: f64,
    pub access_frequency: f64,
    pub recency: f64,
    pub temporal_proximity: f64,
    pub domain_bonus: f64,
    /// Sum of weighted signals, before the workflow bonus.
    pub weighted: f64,
    pub workflow_bonus: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredCandidate {
    pub document: TabDocument,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub top_terms: Vec<String>,
    pub shared_entities: Vec<String>,
    pub shared_topics: Vec<String>,
    /// Set when the workflow miner predicted this candidate.
    pub workflow_justification: Option<String>,
}

/// Per-request state shared by every candidate.
struct ScoringContext<'a> {
    current: &'a TabDocument,
    index: Arc<TextIndex>,
    mode: ScoringMode,
    weights: SignalWeights,
    query: String,
    events: Vec<NavigationEvent>,
    prediction: Option<WorkflowPrediction>,
    now: DateTime<Utc>,
}

pub struct HybridScorer {
    index: SharedTextIndex,
    graph: Arc<RelationshipGraph>,
    miner: Arc<WorkflowMiner>,
    navigation: Arc<dyn NavigationEventRepository>,
    config: ScorerConfig,
}

impl HybridScorer {
    pub fn new(
        index: SharedTextIndex,
        graph: Arc<RelationshipGraph>,
        miner: Arc<WorkflowMiner>,
        navigation: Arc<dyn NavigationEventRepository>,
    ) -> Self {
        Self::with_config(index, graph, miner, navigation, ScorerConfig::default())
    }

    pub fn with_config(
        index: SharedTextIndex,
        graph: Arc<RelationshipGraph>,
        miner: Arc<WorkflowMiner>,
        navigation: Arc<dyn NavigationEventRepository>,
        config: ScorerConfig,
    ) -> Self {
        Self {
            index,
            graph,
            miner,
            navigation,
            config,
        }
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// The top candidates with a positive score.
    #[instrument(skip(self, current, candidates), fields(
        subsystem = "search",
        component = "hybrid_scorer",
        op = "score",
        doc_id = %current.id,
        candidate_count = candidates.len(),
    ))]
    pub async fn score(
        &self,
        current: &TabDocument,
        candidates: &[TabDocument],
        now: DateTime<Utc>,
    ) -> Vec<ScoredCandidate> {
        let start = Instant::now();
        let mut scored = self.score_all(current, candidates, now).await;
        scored.retain(|c| c.score > 0.0);
        scored.truncate(self.config.limit);
        debug!(
            result_count = scored.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Scoring complete"
        );
        scored
    }

    /// Every candidate (except the current tab itself), fully ordered,
    /// including those that scored zero.
    pub async fn score_all(
        &self,
        current: &TabDocument,
        candidates: &[TabDocument],
        now: DateTime<Utc>,
    ) -> Vec<ScoredCandidate> {
        let ctx = self.context(current, candidates, now).await;
        let mut scored = Vec::with_capacity(candidates.len());
        for candidate in candidates.iter().filter(|c| c.id != current.id) {
            scored.push(self.score_candidate(&ctx, candidate).await);
        }
        scored.sort_by(compare_scored);
        scored
    }

    async fn context<'a>(
        &self,
        current: &'a TabDocument,
        candidates: &[TabDocument],
        now: DateTime<Utc>,
    ) -> ScoringContext<'a> {
        let mode = select_mode(std::iter::once(current).chain(candidates));
        let query = signals::build_query(current, mode == ScoringMode::Hybrid);

        let events = self
            .navigation
            .list_from_source(current.id, self.config.behavioral_window)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Navigation lookup failed, behavioral signal disabled");
                Vec::new()
            });

        let prediction = self
            .miner
            .predict_next_tab(current.id)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Workflow prediction failed, no workflow bonus");
                None
            });

        ScoringContext {
            current,
            index: self.index.snapshot().await,
            mode,
            weights: SignalWeights::for_mode(mode),
            query,
            events,
            prediction,
            now,
        }
    }

    async fn score_candidate(&self, ctx: &ScoringContext<'_>, candidate: &TabDocument) -> ScoredCandidate {
        let current = ctx.current;
        let w = &ctx.weights;

        let text = signals::text_score(&ctx.index, &ctx.query, candidate.id, self.config.k1, self.config.b);
        let cosine = ctx.index.cosine_similarity(current.id, candidate.id);
        let entity_overlap = signals::entity_overlap(current, candidate);
        let topic_overlap = signals::topic_overlap(current, candidate);
        let behavioral = signals::behavioral_score(&ctx.events, candidate.id);

        let (ai_bonus, relationship, access_frequency, recency, temporal_proximity) = match ctx.mode {
            ScoringMode::Lite => (
                (entity_overlap + topic_overlap) / 2.0,
                0.0,
                signals::access_frequency(candidate),
                signals::recency(candidate.last_accessed_at, ctx.now),
                signals::temporal_proximity(current.last_accessed_at, candidate.last_accessed_at),
            ),
            ScoringMode::Hybrid => {
                let relationship = match self.graph.between(current.id, candidate.id).await {
                    Ok(found) => signals::relationship_signal(found.as_ref()),
                    Err(e) => {
                        warn!(error = %e, candidate_id = %candidate.id, "Relationship lookup failed");
                        0.0
                    }
                };
                (0.0, relationship, 0.0, 0.0, 0.0)
            }
        };

        let same_domain = !current.domain.is_empty() && current.domain == candidate.domain;
        let domain_bonus = if same_domain { w.domain } else { 0.0 };

        let weighted = w.text * text
            + w.cosine * cosine
            + w.ai_bonus * ai_bonus
            + w.entity * entity_overlap
            + w.topic * topic_overlap
            + w.relationship * relationship
            + w.behavioral * behavioral
            + w.access * access_frequency
            + w.recency * recency
            + w.temporal * temporal_proximity
            + domain_bonus;

        let predicted = ctx
            .prediction
            .as_ref()
            .filter(|p| p.candidate.id == candidate.id);
        let workflow_bonus = predicted
            .map(|p| self.config.workflow_bonus_weight * p.confidence)
            .unwrap_or(0.0);

        let breakdown = ScoreBreakdown {
            mode: ctx.mode,
            text,
            cosine,
            ai_bonus,
            entity_overlap,
            topic_overlap,
            relationship,
            behavioral,
            access_frequency,
            recency,
            temporal_proximity,
            domain_bonus,
            weighted,
            workflow_bonus,
        };
        trace!(candidate_id = %candidate.id, ?breakdown, "Candidate scored");

        ScoredCandidate {
            score: weighted + workflow_bonus,
            top_terms: ctx.index.top_terms(candidate.id, self.config.explanation_terms),
            shared_entities: shared_terms(current.entities(), candidate.entities()),
            shared_topics: shared_terms(current.topics(), candidate.topics()),
            workflow_justification: predicted.map(|p| p.justification.clone()),
            document: candidate.clone(),
            breakdown,
        }
    }
}

fn handle_rank(doc: &TabDocument) -> i64 {
    doc.tab_handle.unwrap_or(i64::MAX)
}

/// Score descending, then tab handle ascending, then id ascending.
pub fn compare_scored(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| handle_rank(&a.document).cmp(&handle_rank(&b.document)))
        .then_with(|| a.document.id.cmp(&b.document.id))
}

/// Ids of the given scored candidates, in order.
pub fn scored_ids(scored: &[ScoredCandidate]) -> Vec<Uuid> {
    scored.iter().map(|c| c.document.id).collect()
}
