//! Background enrichment worker that drives the pipeline.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use tabweave_core::{defaults, Error, Result, TabHandle};
use tabweave_graph::EnrichmentSweep;

use crate::enrich::SkipReason;
use crate::pipeline::EnrichmentPipeline;

/// Configuration for the enrichment worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How long to wait for new work when the pipeline is idle.
    pub idle_poll: Duration,
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            idle_poll: Duration::from_millis(defaults::WORKER_IDLE_POLL_MS),
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `TABWEAVE_WORKER_ENABLED` | `true` | Enable/disable background enrichment |
    /// | `TABWEAVE_WORKER_POLL_MS` | `1000` | Idle wait between pipeline polls |
    pub fn from_env() -> Self {
        let enabled = std::env::var("TABWEAVE_WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let idle_poll_ms = std::env::var("TABWEAVE_WORKER_POLL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::WORKER_IDLE_POLL_MS);

        Self {
            idle_poll: Duration::from_millis(idle_poll_ms),
            enabled,
        }
    }

    pub fn with_idle_poll(mut self, idle_poll: Duration) -> Self {
        self.idle_poll = idle_poll;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Progress event emitted by the enrichment pipeline and its worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EnrichmentEvent {
    WorkerStarted,
    WorkerStopped,
    BulkStarted {
        total: usize,
    },
    BulkPaused {
        processed: usize,
        total: usize,
    },
    BulkResumed {
        processed: usize,
        total: usize,
    },
    BulkCompleted {
        enriched: usize,
        skipped: usize,
    },
    TabEnriched {
        doc_id: Uuid,
        tab_handle: TabHandle,
    },
    TabSkipped {
        tab_handle: TabHandle,
        reason: SkipReason,
    },
    /// A relationship refresh ran after new content arrived.
    RelationshipsRefreshed {
        created: usize,
        sweep: EnrichmentSweep,
    },
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<EnrichmentEvent>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signal the worker to shut down after the step in progress.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Signal shutdown and wait for the worker loop to exit.
    pub async fn stop(self) -> Result<()> {
        // The loop may already have exited (disabled worker).
        let _ = self.shutdown_tx.send(()).await;
        self.task
            .await
            .map_err(|e| Error::Internal(format!("Enrichment worker task failed: {}", e)))
    }

    pub fn events(&self) -> broadcast::Receiver<EnrichmentEvent> {
        self.event_rx.resubscribe()
    }
}

/// Runs pipeline steps until there is no work, then waits for a wake-up,
/// the idle poll, or shutdown.
pub struct EnrichmentWorker {
    pipeline: Arc<EnrichmentPipeline>,
    config: WorkerConfig,
}

impl EnrichmentWorker {
    pub fn new(pipeline: Arc<EnrichmentPipeline>, config: WorkerConfig) -> Self {
        Self { pipeline, config }
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.pipeline.events();

        let task = tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
            task,
        }
    }

    #[instrument(skip(self, shutdown_rx), fields(subsystem = "jobs", component = "worker"))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Enrichment worker is disabled, not starting");
            return;
        }

        info!(
            idle_poll_ms = self.config.idle_poll.as_millis() as u64,
            "Enrichment worker started"
        );
        self.pipeline.emit(EnrichmentEvent::WorkerStarted);

        loop {
            if shutdown_rx.try_recv().is_ok() {
                info!("Enrichment worker received shutdown signal");
                break;
            }

            match self.pipeline.process_next().await {
                Ok(Some(step)) => {
                    debug!(step = ?step, "Pipeline step finished");
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    error!(error = %e, "Pipeline step failed");
                }
            }

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Enrichment worker received shutdown signal");
                    break;
                }
                _ = self.pipeline.wait_for_work() => {}
                _ = sleep(self.config.idle_poll) => {}
            }
        }

        self.pipeline.emit(EnrichmentEvent::WorkerStopped);
        info!("Enrichment worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_tagged() {
        let json = serde_json::to_value(EnrichmentEvent::BulkStarted { total: 3 }).unwrap();
        assert_eq!(json["event"], "bulk_started");
        assert_eq!(json["total"], 3);

        let json = serde_json::to_value(EnrichmentEvent::TabSkipped {
            tab_handle: 9,
            reason: SkipReason::TooShort,
        })
        .unwrap();
        assert_eq!(json["reason"], "too_short");

        let json = serde_json::to_value(EnrichmentEvent::WorkerStopped).unwrap();
        assert_eq!(json, serde_json::json!({ "event": "worker_stopped" }));
    }

    #[test]
    fn test_config_builders() {
        let config = WorkerConfig::default()
            .with_idle_poll(Duration::from_millis(5))
            .with_enabled(false);
        assert_eq!(config.idle_poll, Duration::from_millis(5));
        assert!(!config.enabled);
    }
}
