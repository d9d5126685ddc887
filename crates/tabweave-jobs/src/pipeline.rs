//! Enrichment orchestration: one bulk pass over the open tabs, then
//! per-tab incremental enrichment as tabs appear.
//!
//! Steps run one at a time. A priority-lane tab is processed before the
//! next bulk step; the normal lane waits until the bulk pass is no longer
//! running. Bulk progress is persisted after every step so a restart
//! resumes from the cursor, and pause/resume is a persisted flag checked
//! before each step.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use tabweave_core::{
    defaults, normalize_url, url_hash, Result, TabDocument, TabHandle, TabSnapshot, TabSource,
    TextExtractor,
};
use tabweave_db::{get_json, set_json, Database};
use tabweave_graph::RelationshipGraph;
use tabweave_inference::ContentAnalyzer;
use tabweave_search::SharedTextIndex;

use crate::enrich::{EnrichOutcome, SkipReason, TabEnricher};
use crate::pause::PauseState;
use crate::queue::{EnrichmentQueue, Priority, QueuedTab};
use crate::worker::EnrichmentEvent;

/// Timeouts and debounce for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub bulk_extract_timeout: Duration,
    pub incremental_extract_timeout: Duration,
    /// Minimum delay between a tab being queued and its enrichment.
    pub debounce: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bulk_extract_timeout: Duration::from_secs(defaults::BULK_EXTRACT_TIMEOUT_SECS),
            incremental_extract_timeout: Duration::from_secs(
                defaults::INCREMENTAL_EXTRACT_TIMEOUT_SECS,
            ),
            debounce: Duration::from_millis(defaults::INCREMENTAL_DEBOUNCE_MS),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `TABWEAVE_BULK_EXTRACT_TIMEOUT_SECS` | `10` | Extraction timeout during the bulk pass |
    /// | `TABWEAVE_INCREMENTAL_EXTRACT_TIMEOUT_SECS` | `5` | Extraction timeout for single tabs |
    /// | `TABWEAVE_DEBOUNCE_MS` | `2000` | Delay before a queued tab is enriched |
    pub fn from_env() -> Self {
        fn env_u64(key: &str, default: u64) -> u64 {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(default)
        }

        Self {
            bulk_extract_timeout: Duration::from_secs(env_u64(
                "TABWEAVE_BULK_EXTRACT_TIMEOUT_SECS",
                defaults::BULK_EXTRACT_TIMEOUT_SECS,
            )),
            incremental_extract_timeout: Duration::from_secs(env_u64(
                "TABWEAVE_INCREMENTAL_EXTRACT_TIMEOUT_SECS",
                defaults::INCREMENTAL_EXTRACT_TIMEOUT_SECS,
            )),
            debounce: Duration::from_millis(env_u64(
                "TABWEAVE_DEBOUNCE_MS",
                defaults::INCREMENTAL_DEBOUNCE_MS,
            )),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_extract_timeouts(mut self, bulk: Duration, incremental: Duration) -> Self {
        self.bulk_extract_timeout = bulk;
        self.incremental_extract_timeout = incremental;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BulkStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
}

impl BulkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkStatus::Idle => "idle",
            BulkStatus::Running => "running",
            BulkStatus::Paused => "paused",
            BulkStatus::Completed => "completed",
        }
    }
}

/// Persisted progress of the bulk pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BulkState {
    pub status: BulkStatus,
    /// Tab handles captured when the pass started, in processing order.
    pub queue: Vec<TabHandle>,
    /// Index of the next handle in `queue`.
    pub cursor: usize,
    pub enriched: usize,
    pub skipped: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BulkState {
    pub fn total(&self) -> usize {
        self.queue.len()
    }

    pub fn remaining(&self) -> usize {
        self.queue.len().saturating_sub(self.cursor)
    }
}

/// The document a snapshot resolved to.
#[derive(Debug, Clone)]
pub struct ObservedTab {
    pub document: TabDocument,
    /// False when an existing document for the same URL was re-attached.
    pub created: bool,
}

/// What one call to [`EnrichmentPipeline::process_next`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStep {
    Bulk {
        tab_handle: TabHandle,
        outcome: EnrichOutcome,
    },
    BulkCompleted,
    Incremental {
        tab_handle: TabHandle,
        outcome: EnrichOutcome,
    },
}

pub struct EnrichmentPipeline {
    db: Database,
    tabs: Arc<dyn TabSource>,
    enricher: TabEnricher,
    graph: Arc<RelationshipGraph>,
    index: SharedTextIndex,
    pause: PauseState,
    config: PipelineConfig,
    bulk: Mutex<BulkState>,
    queue: Mutex<EnrichmentQueue>,
    /// Held for the duration of a step so steps never overlap.
    step_lock: Mutex<()>,
    wake: Notify,
    events: broadcast::Sender<EnrichmentEvent>,
}

impl EnrichmentPipeline {
    /// Build the pipeline, restoring bulk progress and the pause flag.
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        db: Database,
        tabs: Arc<dyn TabSource>,
        extractor: Arc<dyn TextExtractor>,
        analyzer: ContentAnalyzer,
        index: SharedTextIndex,
        graph: Arc<RelationshipGraph>,
        config: PipelineConfig,
    ) -> Result<Self> {
        let pause = PauseState::load(db.kv.clone()).await?;
        let mut bulk = match get_json::<BulkState>(db.kv.as_ref(), defaults::BULK_STATE_KEY).await {
            Ok(state) => state.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Failed to parse persisted bulk state, starting fresh");
                BulkState::default()
            }
        };
        if bulk.status == BulkStatus::Running && pause.is_paused() {
            bulk.status = BulkStatus::Paused;
        }
        if bulk.status != BulkStatus::Idle {
            info!(
                status = bulk.status.as_str(),
                processed = bulk.cursor,
                total = bulk.total(),
                "Restored bulk enrichment state"
            );
        }

        let enricher = TabEnricher::new(
            db.documents.clone(),
            extractor,
            analyzer,
            index.clone(),
            db.kv.clone(),
        );
        let (events, _) = broadcast::channel(defaults::WORKER_EVENT_CAPACITY);

        Ok(Self {
            db,
            tabs,
            enricher,
            graph,
            index,
            pause,
            config,
            bulk: Mutex::new(bulk),
            queue: Mutex::new(EnrichmentQueue::new()),
            step_lock: Mutex::new(()),
            wake: Notify::new(),
            events,
        })
    }

    pub fn events(&self) -> broadcast::Receiver<EnrichmentEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: EnrichmentEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Resolves when new work has been queued or the bulk pass was
    /// started or resumed since the last wake-up.
    pub async fn wait_for_work(&self) {
        self.wake.notified().await;
    }

    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    pub async fn bulk_state(&self) -> BulkState {
        self.bulk.lock().await.clone()
    }

    pub async fn queued(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Resolve a snapshot to its document: re-attach the document that
    /// already exists for the normalized URL, or store a new lite one.
    #[instrument(skip(self, snapshot, now), fields(subsystem = "jobs", component = "pipeline", op = "observe", tab_handle = snapshot.handle))]
    pub async fn observe(&self, snapshot: &TabSnapshot, now: DateTime<Utc>) -> Result<ObservedTab> {
        let hash = url_hash(&normalize_url(&snapshot.url));
        if let Some(mut existing) = self.db.documents.find_by_url_hash(&hash).await? {
            existing.attach(snapshot, now);
            self.db.documents.update(&existing).await?;
            debug!(doc_id = %existing.id, "Re-attached existing document");
            return Ok(ObservedTab {
                document: existing,
                created: false,
            });
        }

        let document = TabDocument::lite(snapshot, now);
        self.db.documents.insert(document.clone()).await?;
        debug!(doc_id = %document.id, domain = %document.domain, "Created lite document");
        Ok(ObservedTab {
            document,
            created: true,
        })
    }

    /// Observe a tab outside the bulk pass. New documents are indexed by
    /// title right away; once the bulk pass has completed, documents that
    /// still need content are queued for incremental enrichment.
    pub async fn observe_tab(&self, snapshot: &TabSnapshot, now: DateTime<Utc>) -> Result<ObservedTab> {
        let observed = self.observe(snapshot, now).await?;
        if observed.created {
            self.index.replace_document(&observed.document).await;
            self.index.persist(self.db.kv.as_ref()).await?;
        }

        let doc = &observed.document;
        let wants_content = !doc.is_enriched() || doc.needs_reindex;
        if wants_content && self.bulk_state().await.status == BulkStatus::Completed {
            self.enqueue_incremental(snapshot.handle, Priority::Normal).await;
        }
        Ok(observed)
    }

    /// Start the bulk pass over the currently open tabs. Idempotent: a
    /// running or completed pass is left alone and a paused one resumes.
    #[instrument(skip(self, now), fields(subsystem = "jobs", component = "pipeline", op = "start_bulk"))]
    pub async fn start_bulk(&self, now: DateTime<Utc>) -> Result<BulkState> {
        let mut bulk = self.bulk.lock().await;
        match bulk.status {
            BulkStatus::Running | BulkStatus::Completed => {
                debug!(status = bulk.status.as_str(), "Bulk enrichment already started");
                return Ok(bulk.clone());
            }
            BulkStatus::Paused => {
                drop(bulk);
                return self.resume_bulk().await;
            }
            BulkStatus::Idle => {}
        }

        let tabs = self.tabs.open_tabs().await?;
        for tab in &tabs {
            self.observe(tab, now).await?;
        }

        let documents = self.db.documents.list_all().await?;
        self.index.rebuild(&documents).await;
        self.index.persist(self.db.kv.as_ref()).await?;

        *bulk = BulkState {
            status: BulkStatus::Running,
            queue: tabs.iter().map(|t| t.handle).collect(),
            started_at: Some(now),
            ..Default::default()
        };
        self.save_bulk(&bulk).await?;
        self.pause.resume().await?;

        info!(total = bulk.total(), documents = documents.len(), "Bulk enrichment started");
        self.emit(EnrichmentEvent::BulkStarted {
            total: bulk.total(),
        });
        self.wake.notify_one();
        Ok(bulk.clone())
    }

    /// Pause a running bulk pass. The step in progress finishes first.
    pub async fn pause_bulk(&self) -> Result<BulkState> {
        let mut bulk = self.bulk.lock().await;
        if bulk.status == BulkStatus::Running {
            bulk.status = BulkStatus::Paused;
            self.save_bulk(&bulk).await?;
            self.pause.pause().await?;
            info!(processed = bulk.cursor, total = bulk.total(), "Bulk enrichment paused");
            self.emit(EnrichmentEvent::BulkPaused {
                processed: bulk.cursor,
                total: bulk.total(),
            });
        }
        Ok(bulk.clone())
    }

    /// Resume a paused bulk pass from its cursor.
    pub async fn resume_bulk(&self) -> Result<BulkState> {
        let mut bulk = self.bulk.lock().await;
        if bulk.status == BulkStatus::Paused {
            bulk.status = BulkStatus::Running;
            self.save_bulk(&bulk).await?;
            self.pause.resume().await?;
            info!(processed = bulk.cursor, total = bulk.total(), "Bulk enrichment resumed");
            self.emit(EnrichmentEvent::BulkResumed {
                processed: bulk.cursor,
                total: bulk.total(),
            });
            self.wake.notify_one();
        }
        Ok(bulk.clone())
    }

    /// Queue a tab for incremental enrichment after the debounce delay.
    /// Returns false when it was already queued.
    pub async fn enqueue_incremental(&self, handle: TabHandle, priority: Priority) -> bool {
        let ready_at = Instant::now() + self.config.debounce;
        let queued = self.queue.lock().await.push(handle, priority, ready_at);
        if queued {
            debug!(tab_handle = handle, priority = ?priority, "Queued tab for enrichment");
            self.wake.notify_one();
        }
        queued
    }

    /// Drop a closed tab from the incremental queue.
    pub async fn forget(&self, handle: TabHandle) -> bool {
        self.queue.lock().await.remove(handle)
    }

    /// Run one step: a priority-lane tab, else a bulk step, else a
    /// normal-lane tab. Returns `None` when there is nothing to do.
    pub async fn process_next(&self) -> Result<Option<PipelineStep>> {
        let _step = self.step_lock.lock().await;

        let priority_waiting = self.queue.lock().await.peek_priority() == Some(Priority::High);
        if !priority_waiting {
            if let Some(step) = self.bulk_step().await? {
                return Ok(Some(step));
            }
        }

        let next = self.queue.lock().await.pop();
        match next {
            Some(item) => self.incremental_step(item).await.map(Some),
            None => Ok(None),
        }
    }

    /// Process steps until the pipeline has no runnable work.
    pub async fn run_until_idle(&self) -> Result<usize> {
        let mut steps = 0;
        while self.process_next().await?.is_some() {
            steps += 1;
        }
        Ok(steps)
    }

    async fn bulk_step(&self) -> Result<Option<PipelineStep>> {
        let next = {
            let bulk = self.bulk.lock().await;
            if bulk.status != BulkStatus::Running || self.pause.is_paused() {
                return Ok(None);
            }
            bulk.queue.get(bulk.cursor).copied()
        };

        let Some(handle) = next else {
            self.finish_bulk().await?;
            return Ok(Some(PipelineStep::BulkCompleted));
        };

        let outcome = self
            .enrich_handle(handle, self.config.bulk_extract_timeout)
            .await;

        let mut bulk = self.bulk.lock().await;
        bulk.cursor += 1;
        match outcome {
            EnrichOutcome::Enriched(_) => bulk.enriched += 1,
            EnrichOutcome::Skipped(_) => bulk.skipped += 1,
        }
        self.save_bulk(&bulk).await?;
        debug!(processed = bulk.cursor, total = bulk.total(), "Bulk step finished");

        Ok(Some(PipelineStep::Bulk {
            tab_handle: handle,
            outcome,
        }))
    }

    async fn finish_bulk(&self) -> Result<()> {
        let now = Utc::now();
        match self.db.documents.list_all().await {
            Ok(documents) => match self.graph.initialize_from_content(&documents, now).await {
                Ok(created) => self.refresh_semantics(created).await,
                Err(e) => warn!(error = %e, "Initial relationship pass failed"),
            },
            Err(e) => warn!(error = %e, "Failed to list documents for the relationship pass"),
        }

        let mut bulk = self.bulk.lock().await;
        bulk.status = BulkStatus::Completed;
        bulk.completed_at = Some(now);
        self.save_bulk(&bulk).await?;
        info!(
            enriched = bulk.enriched,
            skipped = bulk.skipped,
            "Bulk enrichment completed"
        );
        self.emit(EnrichmentEvent::BulkCompleted {
            enriched: bulk.enriched,
            skipped: bulk.skipped,
        });
        Ok(())
    }

    async fn incremental_step(&self, item: QueuedTab) -> Result<PipelineStep> {
        tokio::time::sleep_until(item.ready_at).await;

        let outcome = self
            .enrich_handle(item.handle, self.config.incremental_extract_timeout)
            .await;
        if let EnrichOutcome::Enriched(doc) = &outcome {
            match self.graph.connect_recent(doc, Utc::now()).await {
                Ok(created) => self.refresh_semantics(created).await,
                Err(e) => warn!(doc_id = %doc.id, error = %e, "Failed to connect enriched tab"),
            }
        }

        Ok(PipelineStep::Incremental {
            tab_handle: item.handle,
            outcome,
        })
    }

    /// Enrich one tab. Every failure is logged and reported as a skip so
    /// the caller can move on to the next tab.
    async fn enrich_handle(&self, handle: TabHandle, timeout: Duration) -> EnrichOutcome {
        let outcome = match self.tabs.get_tab(handle).await {
            Ok(Some(tab)) => match self.enricher.enrich(&tab, timeout, Utc::now()).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(tab_handle = handle, error = %e, "Failed to store enrichment");
                    EnrichOutcome::Skipped(SkipReason::Failed)
                }
            },
            Ok(None) => EnrichOutcome::Skipped(SkipReason::TabClosed),
            Err(e) => {
                warn!(tab_handle = handle, error = %e, "Failed to look up tab");
                EnrichOutcome::Skipped(SkipReason::TabClosed)
            }
        };

        match &outcome {
            EnrichOutcome::Enriched(doc) => self.emit(EnrichmentEvent::TabEnriched {
                doc_id: doc.id,
                tab_handle: handle,
            }),
            EnrichOutcome::Skipped(reason) => {
                debug!(tab_handle = handle, skip_reason = reason.as_str(), "Tab skipped");
                self.emit(EnrichmentEvent::TabSkipped {
                    tab_handle: handle,
                    reason: *reason,
                });
            }
        }
        outcome
    }

    async fn refresh_semantics(&self, created: usize) {
        match self
            .graph
            .enrich_with_semantics(self.enricher.analyzer())
            .await
        {
            Ok(sweep) => self.emit(EnrichmentEvent::RelationshipsRefreshed { created, sweep }),
            Err(e) => warn!(error = %e, "Semantic relationship sweep failed"),
        }
    }

    async fn save_bulk(&self, state: &BulkState) -> Result<()> {
        set_json(self.db.kv.as_ref(), defaults::BULK_STATE_KEY, state).await
    }
}

impl std::fmt::Debug for EnrichmentPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrichmentPipeline")
            .field("config", &self.config)
            .field("pause", &self.pause)
            .finish_non_exhaustive()
    }
}
