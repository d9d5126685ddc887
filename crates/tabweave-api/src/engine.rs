//! The tabweave engine: one handle over storage, the text index, the
//! relationship graph, the workflow miner, the scorer and the enrichment
//! pipeline.
//!
//! Suggestion requests never fail and never wait for enrichment. Every
//! state-changing call clears the suggestion cache.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use tabweave_core::{
    defaults, normalize_url, url_hash, DocumentRef, Error, NavigationEvent, NavigationTrigger,
    RelationshipType, Result, Stats, TabDocument, TabHandle, TabSnapshot, TabSource,
    TextExtractor,
};
use tabweave_db::Database;
use tabweave_graph::{DecaySweep, GraphConfig, MinerConfig, RelatedTab, RelationshipGraph, WorkflowMiner};
use tabweave_inference::ContentAnalyzer;
use tabweave_jobs::{BulkState, BulkStatus, EnrichmentPipeline, ObservedTab, PipelineConfig, Priority};
use tabweave_search::{
    select_mode, HybridScorer, ScoreBreakdown, ScoredCandidate, ScorerConfig, ScoringMode,
    SharedTextIndex,
};

use crate::suggestion_cache::SuggestionCache;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub graph: GraphConfig,
    pub miner: MinerConfig,
    pub scorer: ScorerConfig,
    pub pipeline: PipelineConfig,
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            graph: GraphConfig::default(),
            miner: MinerConfig::default(),
            scorer: ScorerConfig::default(),
            pipeline: PipelineConfig::default(),
            cache_ttl: Duration::from_secs(defaults::SUGGESTION_CACHE_TTL_SECS),
            cache_capacity: defaults::SUGGESTION_CACHE_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_graph(mut self, graph: GraphConfig) -> Self {
        self.graph = graph;
        self
    }
}

/// One entry of a suggestion list.
#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub doc_id: Uuid,
    pub tab_handle: Option<TabHandle>,
    pub title: String,
    pub url: String,
    pub domain: String,
    /// `None` for tabs in the unranked tail.
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<ScoreBreakdown>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub top_terms: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shared_entities: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shared_topics: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_justification: Option<String>,
}

impl Suggestion {
    fn ranked(candidate: ScoredCandidate) -> Self {
        let ScoredCandidate {
            document,
            score,
            breakdown,
            top_terms,
            shared_entities,
            shared_topics,
            workflow_justification,
        } = candidate;
        Self {
            score: Some(score),
            breakdown: Some(breakdown),
            top_terms,
            shared_entities,
            shared_topics,
            workflow_justification,
            ..Self::unranked(&document)
        }
    }

    fn unranked(doc: &TabDocument) -> Self {
        Self {
            doc_id: doc.id,
            tab_handle: doc.tab_handle,
            title: doc.title.clone(),
            url: doc.url.clone(),
            domain: doc.domain.clone(),
            score: None,
            breakdown: None,
            top_terms: Vec::new(),
            shared_entities: Vec::new(),
            shared_topics: Vec::new(),
            workflow_justification: None,
        }
    }
}

/// Ranked suggestions followed by every other open tab, unranked.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Suggestions {
    /// Document of the requesting tab, when it is known.
    pub current: Option<Uuid>,
    pub mode: Option<ScoringMode>,
    /// Number of leading items that carry a score.
    pub ranked: usize,
    pub items: Vec<Suggestion>,
}

impl Suggestions {
    fn assemble(
        current: Option<Uuid>,
        mode: Option<ScoringMode>,
        scored: Vec<ScoredCandidate>,
        candidates: &[TabDocument],
    ) -> Self {
        let ranked_ids: HashSet<Uuid> = scored.iter().map(|c| c.document.id).collect();
        let mut tail: Vec<&TabDocument> = candidates
            .iter()
            .filter(|d| !ranked_ids.contains(&d.id))
            .collect();
        tail.sort_by_key(|d| (d.tab_handle.unwrap_or(TabHandle::MAX), d.id));

        let ranked = scored.len();
        let items = scored
            .into_iter()
            .map(Suggestion::ranked)
            .chain(tail.into_iter().map(Suggestion::unranked))
            .collect();
        Self {
            current,
            mode,
            ranked,
            items,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    #[serde(flatten)]
    pub storage: Stats,
    /// Documents currently in the text index.
    pub index_documents: usize,
    pub bulk_status: BulkStatus,
    pub queued: usize,
    pub paused: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MaintenanceReport {
    pub decay: DecaySweep,
    /// Workflow patterns materialized or refreshed.
    pub workflows: usize,
}

pub struct TabWeave {
    db: Database,
    index: SharedTextIndex,
    graph: Arc<RelationshipGraph>,
    miner: Arc<WorkflowMiner>,
    scorer: HybridScorer,
    pipeline: Arc<EnrichmentPipeline>,
    cache: SuggestionCache,
}

impl TabWeave {
    /// Wire the engine over `db`. Loads the persisted text index; a
    /// corrupt index blob is an error, never silently replaced.
    pub async fn new(
        db: Database,
        tabs: Arc<dyn TabSource>,
        extractor: Arc<dyn TextExtractor>,
        analyzer: ContentAnalyzer,
        config: EngineConfig,
    ) -> Result<Self> {
        let index = SharedTextIndex::load(db.kv.as_ref()).await?;
        let graph = Arc::new(RelationshipGraph::with_config(
            db.relationships.clone(),
            db.documents.clone(),
            config.graph.clone(),
        ));
        let miner = Arc::new(WorkflowMiner::with_config(
            db.navigation.clone(),
            db.workflows.clone(),
            db.documents.clone(),
            config.miner.clone(),
        ));
        let scorer = HybridScorer::with_config(
            index.clone(),
            graph.clone(),
            miner.clone(),
            db.navigation.clone(),
            config.scorer.clone(),
        );
        let pipeline = Arc::new(
            EnrichmentPipeline::new(
                db.clone(),
                tabs,
                extractor,
                analyzer,
                index.clone(),
                graph.clone(),
                config.pipeline.clone(),
            )
            .await?,
        );

        info!(
            subsystem = "api",
            indexed = index.snapshot().await.len(),
            "Engine ready"
        );
        Ok(Self {
            db,
            index,
            graph,
            miner,
            scorer,
            pipeline,
            cache: SuggestionCache::new(config.cache_capacity, config.cache_ttl),
        })
    }

    pub fn pipeline(&self) -> &Arc<EnrichmentPipeline> {
        &self.pipeline
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Ranked suggestions for the tab `handle`, followed by the remaining
    /// open tabs in handle order. Never fails: a storage failure yields an
    /// empty list and an unknown current tab yields every open tab unranked.
    #[instrument(skip(self, now), fields(subsystem = "api", component = "engine", op = "get_suggestions", tab_handle = handle))]
    pub async fn get_suggestions(&self, handle: TabHandle, now: DateTime<Utc>) -> Suggestions {
        let open = match self.db.documents.list_active().await {
            Ok(docs) => docs,
            Err(e) => {
                error!(error = %e, "Failed to list open tabs for suggestions");
                return Suggestions::default();
            }
        };
        if let Some(cached) = self.cache.get(handle, open.len()).await {
            debug!("Suggestion cache hit");
            return cached;
        }

        let (current, candidates): (Vec<TabDocument>, Vec<TabDocument>) = open
            .iter()
            .cloned()
            .partition(|d| d.tab_handle == Some(handle));

        let suggestions = match current.first() {
            Some(current) => {
                let scored = self.scorer.score(current, &candidates, now).await;
                let mode = select_mode(std::iter::once(current).chain(candidates.iter()));
                Suggestions::assemble(Some(current.id), Some(mode), scored, &candidates)
            }
            None => {
                debug!("Current tab unknown, returning open tabs unranked");
                Suggestions::assemble(None, None, Vec::new(), &candidates)
            }
        };
        debug!(
            result_count = suggestions.items.len(),
            ranked = suggestions.ranked,
            "Suggestions computed"
        );

        self.cache.insert(handle, open.len(), suggestions.clone()).await;
        suggestions
    }

    /// Log a tab switch and strengthen the navigation relationship.
    #[instrument(skip(self, now), fields(subsystem = "api", component = "engine", op = "record_navigation"))]
    pub async fn record_navigation(
        &self,
        from: TabHandle,
        to: TabHandle,
        trigger: NavigationTrigger,
        now: DateTime<Utc>,
    ) -> Result<NavigationEvent> {
        if from == to {
            return Err(Error::InvalidInput(format!(
                "navigation from tab {} to itself",
                from
            )));
        }
        let source = self.document_for(from).await?;
        let destination = self.document_for(to).await?;

        let event = NavigationEvent::new(
            DocumentRef::from(&source),
            DocumentRef::from(&destination),
            trigger,
            now,
        );
        self.db.navigation.append(event.clone()).await?;
        let relationship = self
            .graph
            .create_or_strengthen(source.id, destination.id, RelationshipType::Navigation, now)
            .await?;
        self.cache.clear().await;

        debug!(
            source = %source.id,
            destination = %destination.id,
            strength = relationship.strength,
            "Navigation recorded"
        );
        Ok(event)
    }

    /// Resolve a pushed tab to its document; see [`EnrichmentPipeline::observe_tab`].
    pub async fn observe_tab(&self, snapshot: &TabSnapshot, now: DateTime<Utc>) -> Result<ObservedTab> {
        let observed = self.pipeline.observe_tab(snapshot, now).await?;
        self.cache.clear().await;
        Ok(observed)
    }

    /// Apply a fresh snapshot for a tab. When the tab navigated to another
    /// URL the previous document is retired and the handle moves to the
    /// document for the new URL; a changed title is re-indexed.
    #[instrument(skip(self, snapshot, now), fields(subsystem = "api", component = "engine", op = "tab_updated", tab_handle = snapshot.handle))]
    pub async fn tab_updated(&self, snapshot: &TabSnapshot, now: DateTime<Utc>) -> Result<ObservedTab> {
        let hash = url_hash(&normalize_url(&snapshot.url));
        if let Some(mut previous) = self.db.documents.find_by_handle(snapshot.handle).await? {
            if previous.url_hash != hash {
                previous.is_active = false;
                previous.tab_handle = None;
                self.db.documents.update(&previous).await?;
                self.pipeline.forget(snapshot.handle).await;
                debug!(doc_id = %previous.id, "Tab navigated away, retired previous document");
            }
        }

        let title_before = self
            .db
            .documents
            .find_by_url_hash(&hash)
            .await?
            .map(|d| d.title);
        let observed = self.observe_tab(snapshot, now).await?;

        if title_before.is_some_and(|title| title != observed.document.title) {
            self.index.replace_document(&observed.document).await;
            self.index.persist(self.db.kv.as_ref()).await?;
        }
        Ok(observed)
    }

    /// Count an activation. A tab that still lacks content is queued in
    /// the priority lane once the bulk pass is over.
    pub async fn tab_activated(&self, handle: TabHandle, now: DateTime<Utc>) -> Result<TabDocument> {
        let mut doc = self.document_for(handle).await?;
        doc.touch(now);
        doc.is_active = true;
        self.db.documents.update(&doc).await?;

        let wants_content = !doc.is_enriched() || doc.needs_reindex;
        if wants_content && self.pipeline.bulk_state().await.status == BulkStatus::Completed {
            self.pipeline.enqueue_incremental(handle, Priority::High).await;
        }
        self.cache.clear().await;
        Ok(doc)
    }

    /// Mark the tab's document closed. The document is kept. Returns false
    /// for an unknown handle.
    pub async fn tab_closed(&self, handle: TabHandle) -> Result<bool> {
        let Some(mut doc) = self.db.documents.find_by_handle(handle).await? else {
            return Ok(false);
        };
        doc.is_active = false;
        doc.tab_handle = None;
        self.db.documents.update(&doc).await?;
        self.pipeline.forget(handle).await;
        self.cache.clear().await;
        debug!(doc_id = %doc.id, tab_handle = handle, "Tab closed");
        Ok(true)
    }

    /// Force re-enrichment of a tab through the priority lane.
    pub async fn invalidate_tab(&self, handle: TabHandle) -> Result<bool> {
        let mut doc = self.document_for(handle).await?;
        doc.needs_reindex = true;
        self.db.documents.update(&doc).await?;
        Ok(self.pipeline.enqueue_incremental(handle, Priority::High).await)
    }

    pub async fn enqueue_incremental(&self, handle: TabHandle, priority: Priority) -> Result<bool> {
        self.document_for(handle).await?;
        Ok(self.pipeline.enqueue_incremental(handle, priority).await)
    }

    pub async fn start_bulk(&self, now: DateTime<Utc>) -> Result<BulkState> {
        let state = self.pipeline.start_bulk(now).await?;
        self.cache.clear().await;
        Ok(state)
    }

    pub async fn pause_bulk(&self) -> Result<BulkState> {
        self.pipeline.pause_bulk().await
    }

    pub async fn resume_bulk(&self) -> Result<BulkState> {
        self.pipeline.resume_bulk().await
    }

    pub async fn related_tabs(&self, handle: TabHandle) -> Result<Vec<RelatedTab>> {
        let doc = self.document_for(handle).await?;
        self.graph
            .related_to(doc.id, defaults::RELATED_MIN_STRENGTH)
            .await
    }

    pub async fn stats(&self) -> Result<EngineStats> {
        let bulk = self.pipeline.bulk_state().await;
        Ok(EngineStats {
            storage: self.db.stats().await?,
            index_documents: self.index.snapshot().await.len(),
            bulk_status: bulk.status,
            queued: self.pipeline.queued().await,
            paused: self.pipeline.is_paused(),
        })
    }

    /// Decay relationships, then mine workflow patterns.
    #[instrument(skip(self, now), fields(subsystem = "api", component = "engine", op = "run_maintenance"))]
    pub async fn run_maintenance(&self, now: DateTime<Utc>) -> Result<MaintenanceReport> {
        let decay = self.graph.decay(now).await?;
        let patterns = self.miner.detect_workflows(now).await?;
        self.cache.clear().await;

        let report = MaintenanceReport {
            decay,
            workflows: patterns.len(),
        };
        info!(
            decayed = report.decay.decayed,
            deleted = report.decay.deleted,
            workflows = report.workflows,
            "Maintenance finished"
        );
        Ok(report)
    }

    /// Run maintenance now, then every `period`, until the task is aborted.
    pub fn spawn_maintenance(self: &Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            // The first tick completes immediately, so a fresh start does not
            // wait a whole period for decay and mining.
            let mut interval = tokio::time::interval(period.max(Duration::from_secs(1)));
            loop {
                interval.tick().await;
                if let Err(e) = engine.run_maintenance(Utc::now()).await {
                    error!(error = %e, "Scheduled maintenance failed");
                }
            }
        })
    }

    async fn document_for(&self, handle: TabHandle) -> Result<TabDocument> {
        self.db
            .documents
            .find_by_handle(handle)
            .await?
            .ok_or_else(|| Error::NotFound(format!("tab {}", handle)))
    }
}
