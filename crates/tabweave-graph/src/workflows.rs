//! Workflow mining over the navigation log.
//!
//! Patterns are re-derived from the full event window on every pass and
//! upserted by URL chain; nothing is mutated incrementally between passes.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use tabweave_core::{
    chain_key, defaults, workflow_confidence, NavigationEventRepository, OccurrenceWindow,
    PatternType, Result, TabDocument, TabDocumentRepository, WorkflowPattern, WorkflowRepository,
};

/// Tunables for sequence extraction and pattern materialization.
#[derive(Debug, Clone)]
pub struct MinerConfig {
    pub min_len: usize,
    pub max_len: usize,
    /// How far back navigation events are replayed.
    pub window: Duration,
    /// Largest allowed gap between consecutive steps of one sequence.
    pub contiguity_gap: Duration,
    pub min_frequency: u32,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            min_len: defaults::WORKFLOW_MIN_LEN,
            max_len: defaults::WORKFLOW_MAX_LEN,
            window: Duration::days(defaults::WORKFLOW_WINDOW_DAYS),
            contiguity_gap: Duration::minutes(defaults::WORKFLOW_CONTIGUITY_GAP_MINUTES),
            min_frequency: defaults::WORKFLOW_MIN_FREQUENCY,
        }
    }
}

impl MinerConfig {
    pub fn with_lengths(mut self, min_len: usize, max_len: usize) -> Self {
        self.min_len = min_len.max(2);
        self.max_len = max_len.max(self.min_len);
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn with_contiguity_gap(mut self, gap: Duration) -> Self {
        self.contiguity_gap = gap;
        self
    }
}

/// One contiguous slice of the navigation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSequence {
    /// Destination URLs, in navigation order.
    pub sequence: Vec<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// A predicted next tab.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowPrediction {
    pub candidate: TabDocument,
    pub confidence: f64,
    pub pattern: WorkflowPattern,
    pub justification: String,
}

pub struct WorkflowMiner {
    navigation: Arc<dyn NavigationEventRepository>,
    workflows: Arc<dyn WorkflowRepository>,
    documents: Arc<dyn TabDocumentRepository>,
    config: MinerConfig,
}

impl WorkflowMiner {
    pub fn new(
        navigation: Arc<dyn NavigationEventRepository>,
        workflows: Arc<dyn WorkflowRepository>,
        documents: Arc<dyn TabDocumentRepository>,
    ) -> Self {
        Self::with_config(navigation, workflows, documents, MinerConfig::default())
    }

    pub fn with_config(
        navigation: Arc<dyn NavigationEventRepository>,
        workflows: Arc<dyn WorkflowRepository>,
        documents: Arc<dyn TabDocumentRepository>,
        config: MinerConfig,
    ) -> Self {
        Self {
            navigation,
            workflows,
            documents,
            config,
        }
    }

    /// Every contiguous slice of the windowed log with length in
    /// `[min_len, max_len]` whose consecutive steps are within the gap.
    #[instrument(skip(self), fields(subsystem = "graph", component = "workflows", op = "extract_sequences"))]
    pub async fn extract_sequences(&self, now: DateTime<Utc>) -> Result<Vec<CandidateSequence>> {
        let mut events = self.navigation.list_since(now - self.config.window).await?;
        events.sort_by_key(|e| e.timestamp);

        let mut candidates = Vec::new();
        for len in self.config.min_len..=self.config.max_len {
            if len > events.len() {
                break;
            }
            for slice in events.windows(len) {
                let contiguous = slice
                    .windows(2)
                    .all(|pair| pair[1].timestamp - pair[0].timestamp <= self.config.contiguity_gap);
                if !contiguous {
                    continue;
                }
                candidates.push(CandidateSequence {
                    sequence: slice.iter().map(|e| e.destination.url.clone()).collect(),
                    start: slice[0].timestamp,
                    end: slice[len - 1].timestamp,
                });
            }
        }
        debug!(
            event_count = events.len(),
            result_count = candidates.len(),
            "Candidate sequences extracted"
        );
        Ok(candidates)
    }

    /// Group candidate sequences by URL chain and materialize every group
    /// seen at least `min_frequency` times. Returns the patterns of this pass,
    /// most frequent first.
    #[instrument(skip(self), fields(subsystem = "graph", component = "workflows", op = "detect_workflows"))]
    pub async fn detect_workflows(&self, now: DateTime<Utc>) -> Result<Vec<WorkflowPattern>> {
        let candidates = self.extract_sequences(now).await?;

        let mut groups: HashMap<String, (Vec<String>, Vec<OccurrenceWindow>)> = HashMap::new();
        for candidate in candidates {
            let key = chain_key(&candidate.sequence);
            groups
                .entry(key)
                .or_insert_with(|| (candidate.sequence.clone(), Vec::new()))
                .1
                .push(OccurrenceWindow {
                    start: candidate.start,
                    end: candidate.end,
                });
        }

        let mut patterns: Vec<WorkflowPattern> = groups
            .into_values()
            .filter(|(_, occurrences)| occurrences.len() as u32 >= self.config.min_frequency)
            .map(|(sequence, mut occurrences)| {
                occurrences.sort_by_key(|o| o.start);
                build_pattern(sequence, occurrences)
            })
            .collect();
        patterns.sort_by(|a, b| {
            b.frequency
                .cmp(&a.frequency)
                .then_with(|| a.chain_key().cmp(&b.chain_key()))
        });

        for pattern in &patterns {
            self.workflows.upsert(pattern).await?;
        }
        info!(result_count = patterns.len(), "Workflow detection complete");
        Ok(patterns)
    }

    /// Predict the next tab after `doc_id` from the strongest matching
    /// pattern. The prediction resolves only to an open tab with exactly the
    /// predicted URL.
    #[instrument(skip(self), fields(subsystem = "graph", component = "workflows", op = "predict_next_tab"))]
    pub async fn predict_next_tab(&self, doc_id: Uuid) -> Result<Option<WorkflowPrediction>> {
        let Some(current) = self.documents.get(doc_id).await? else {
            return Ok(None);
        };

        let best = self
            .workflows
            .list_all()
            .await?
            .into_iter()
            .filter_map(|pattern| {
                let next = pattern.next_after(&current.url)?.to_string();
                Some((pattern, next))
            })
            .min_by(|(a, _), (b, _)| {
                b.confidence
                    .total_cmp(&a.confidence)
                    .then_with(|| b.frequency.cmp(&a.frequency))
                    .then_with(|| b.sequence.len().cmp(&a.sequence.len()))
                    .then_with(|| a.chain_key().cmp(&b.chain_key()))
            });
        let Some((pattern, next_url)) = best else {
            return Ok(None);
        };

        let candidate = self
            .documents
            .list_active()
            .await?
            .into_iter()
            .find(|d| d.url == next_url && d.id != current.id);
        let Some(candidate) = candidate else {
            debug!(chain_key = %pattern.chain_key(), skip_reason = "predicted_tab_not_open", "No workflow prediction");
            return Ok(None);
        };

        Ok(Some(WorkflowPrediction {
            candidate,
            confidence: pattern.confidence,
            justification: format!("You visited this sequence {} times", pattern.frequency),
            pattern,
        }))
    }
}

fn build_pattern(sequence: Vec<String>, occurrences: Vec<OccurrenceWindow>) -> WorkflowPattern {
    let frequency = occurrences.len() as u32;
    let avg_interval_ms = if occurrences.len() < 2 {
        0
    } else {
        let total: i64 = occurrences
            .windows(2)
            .map(|pair| (pair[1].start - pair[0].end).num_milliseconds())
            .sum();
        total / (occurrences.len() as i64 - 1)
    };
    let last_occurrence = occurrences
        .iter()
        .map(|o| o.end)
        .max()
        .unwrap_or_default();
    WorkflowPattern {
        sequence,
        frequency,
        occurrences,
        last_occurrence,
        avg_interval_ms,
        confidence: workflow_confidence(frequency),
        pattern_type: PatternType::Sequential,
    }
}
