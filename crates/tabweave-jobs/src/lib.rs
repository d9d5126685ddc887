//! # tabweave-jobs
//!
//! Background enrichment for tabweave.
//!
//! This crate provides:
//! - A resumable bulk pass over every open tab, with persisted pause/resume
//! - Debounced incremental enrichment with a priority lane
//! - The per-tab enrichment step: extract, clean, summarize, classify, index
//! - A background worker and progress events via broadcast channels
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tabweave_jobs::{EnrichmentPipeline, EnrichmentWorker, PipelineConfig, WorkerConfig};
//!
//! let pipeline = Arc::new(
//!     EnrichmentPipeline::new(db, tabs, extractor, analyzer, index, graph, PipelineConfig::from_env())
//!         .await?,
//! );
//! let handle = EnrichmentWorker::new(pipeline.clone(), WorkerConfig::from_env()).start();
//!
//! pipeline.start_bulk(chrono::Utc::now()).await?;
//!
//! let mut events = handle.events();
//! while let Ok(event) = events.recv().await {
//!     println!("Event: {:?}", event);
//! }
//!
//! handle.stop().await?;
//! ```

pub mod cleaning;
pub mod enrich;
pub mod pause;
pub mod pipeline;
pub mod queue;
pub mod worker;

// Re-export core types
pub use tabweave_core::*;

pub use cleaning::{clean_text, reading_time_minutes, word_count};
pub use enrich::{EnrichOutcome, SkipReason, TabEnricher};
pub use pause::PauseState;
pub use pipeline::{
    BulkState, BulkStatus, EnrichmentPipeline, ObservedTab, PipelineConfig, PipelineStep,
};
pub use queue::{EnrichmentQueue, Priority, QueuedTab};
pub use worker::{EnrichmentEvent, EnrichmentWorker, WorkerConfig, WorkerHandle};
