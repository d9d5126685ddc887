//! Core traits for tabweave abstractions.
//!
//! Storage and external capabilities sit behind these traits so that the
//! ranking core can run against SQLite-backed stores and against scripted
//! or browser-backed collaborators.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// DOCUMENT STORE TRAITS
// =============================================================================

/// Record store for tab documents, keyed by id with secondary lookups by
/// runtime handle and by url hash.
///
/// Implementations keep at most one document per runtime handle: storing a
/// document that claims a handle detaches the handle from any other document.
#[async_trait]
pub trait TabDocumentRepository: Send + Sync {
    /// Insert a new document. Fails if the id already exists.
    async fn insert(&self, doc: TabDocument) -> Result<Uuid>;

    /// Replace an existing document. Fails with `DocumentNotFound` if absent.
    async fn update(&self, doc: &TabDocument) -> Result<()>;

    /// Write enrichment results onto document `id`, re-reading it at write
    /// time. Lifecycle fields (handle, activity, access counters) keep their
    /// stored values. Nothing is written, and `None` is returned, when the
    /// document is gone, inactive, or no longer attached to `handle`.
    async fn update_content(
        &self,
        id: Uuid,
        handle: TabHandle,
        update: &ContentUpdate,
    ) -> Result<Option<TabDocument>>;

    async fn get(&self, id: Uuid) -> Result<Option<TabDocument>>;

    async fn find_by_handle(&self, handle: TabHandle) -> Result<Option<TabDocument>>;

    async fn find_by_url_hash(&self, url_hash: &str) -> Result<Option<TabDocument>>;

    async fn list_all(&self) -> Result<Vec<TabDocument>>;

    /// Documents whose tab is still open.
    async fn list_active(&self) -> Result<Vec<TabDocument>>;

    /// Enriched documents, most recently indexed first.
    async fn list_recently_indexed(&self, limit: usize) -> Result<Vec<TabDocument>>;

    async fn count(&self) -> Result<usize>;

    async fn count_indexed(&self) -> Result<usize>;
}

/// Append-only log of navigation events with a timestamp index.
#[async_trait]
pub trait NavigationEventRepository: Send + Sync {
    async fn append(&self, event: NavigationEvent) -> Result<()>;

    /// Events at or after `since`, oldest first.
    async fn list_since(&self, since: DateTime<Utc>) -> Result<Vec<NavigationEvent>>;

    /// The most recent `limit` events whose source is `doc_id`, newest first.
    async fn list_from_source(&self, doc_id: Uuid, limit: usize) -> Result<Vec<NavigationEvent>>;

    async fn count(&self) -> Result<usize>;
}

/// Record store for relationships keyed by canonical pair key.
#[async_trait]
pub trait RelationshipRepository: Send + Sync {
    async fn get(&self, pair_key: &str) -> Result<Option<Relationship>>;

    /// Insert or replace by `relationship.id`.
    async fn upsert(&self, relationship: &Relationship) -> Result<()>;

    /// Returns whether a row was removed.
    async fn delete(&self, pair_key: &str) -> Result<bool>;

    async fn list_all(&self) -> Result<Vec<Relationship>>;

    async fn list_unenriched(&self) -> Result<Vec<Relationship>>;

    async fn list_for_document(&self, doc_id: Uuid) -> Result<Vec<Relationship>>;

    async fn count(&self) -> Result<usize>;
}

/// Record store for workflow patterns keyed by URL chain.
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn upsert(&self, pattern: &WorkflowPattern) -> Result<()>;

    async fn get(&self, chain_key: &str) -> Result<Option<WorkflowPattern>>;

    async fn list_all(&self) -> Result<Vec<WorkflowPattern>>;

    async fn count(&self) -> Result<usize>;
}

/// Generic durable key-value store for blobs (index snapshot, pipeline state).
///
/// `set` either replaces the previous value entirely or fails leaving it intact.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

// =============================================================================
// BROWSER CAPABILITY TRAITS
// =============================================================================

/// Source of the currently open tabs.
#[async_trait]
pub trait TabSource: Send + Sync {
    async fn open_tabs(&self) -> Result<Vec<TabSnapshot>>;

    async fn get_tab(&self, handle: TabHandle) -> Result<Option<TabSnapshot>>;
}

/// Page text extraction. No latency guarantee; callers bound it with a timeout.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, tab: &TabSnapshot) -> Result<PageExtract>;
}

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for text generation (summaries, extraction, similarity judgments).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text given a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate text with system context.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Availability of an AI capability on this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable,
}

/// Creates generation sessions. Availability is checked once; callers branch
/// on the result instead of probing per call.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    async fn availability(&self) -> Availability;

    async fn create(&self) -> Result<Arc<dyn GenerationBackend>>;

    fn name(&self) -> &str;
}

/// Provider for devices without any AI capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCapability;

#[async_trait]
impl CapabilityProvider for NoCapability {
    async fn availability(&self) -> Availability {
        Availability::Unavailable
    }

    async fn create(&self) -> Result<Arc<dyn GenerationBackend>> {
        Err(crate::Error::CapabilityUnavailable(
            "no AI capability configured".to_string(),
        ))
    }

    fn name(&self) -> &str {
        "none"
    }
}
