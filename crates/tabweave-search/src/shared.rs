//! Shared, persistable handle to the text index.
//!
//! Readers take an `Arc` snapshot and never wait on a writer; writers mutate
//! a private copy (copy-on-write through `Arc::make_mut`) and publish it
//! wholesale, so a scorer never observes a half-applied update.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use tabweave_core::{defaults, KeyValueStore, Result, TabDocument};

use crate::text_index::{DocumentMetadata, TextIndex};

impl From<&TabDocument> for DocumentMetadata {
    fn from(doc: &TabDocument) -> Self {
        Self {
            title: doc.title.clone(),
            url: doc.url.clone(),
            domain: doc.domain.clone(),
        }
    }
}

#[derive(Clone, Default)]
pub struct SharedTextIndex {
    current: Arc<RwLock<Arc<TextIndex>>>,
}

impl SharedTextIndex {
    pub fn new(index: TextIndex) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(index))),
        }
    }

    /// The latest published index.
    pub async fn snapshot(&self) -> Arc<TextIndex> {
        self.current.read().await.clone()
    }

    /// Remove-then-re-add `doc` with its current index text.
    pub async fn replace_document(&self, doc: &TabDocument) {
        let text = doc.index_text();
        let mut guard = self.current.write().await;
        Arc::make_mut(&mut guard).add_document(doc.id, &text, DocumentMetadata::from(doc));
        debug!(doc_id = %doc.id, "Text index document replaced");
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        let mut guard = self.current.write().await;
        Arc::make_mut(&mut guard).remove_document(id)
    }

    /// Build a fresh index over `docs` and publish it in one step.
    #[instrument(skip(self, docs), fields(subsystem = "search", component = "text_index", op = "rebuild", candidate_count = docs.len()))]
    pub async fn rebuild(&self, docs: &[TabDocument]) {
        let mut index = TextIndex::new();
        for doc in docs {
            index.add_document(doc.id, &doc.index_text(), DocumentMetadata::from(doc));
        }
        *self.current.write().await = Arc::new(index);
        info!(result_count = docs.len(), "Text index rebuilt");
    }

    /// Write the current snapshot as one blob.
    pub async fn persist(&self, kv: &dyn KeyValueStore) -> Result<()> {
        let bytes = self.snapshot().await.serialize()?;
        kv.set(defaults::TEXT_INDEX_KEY, &bytes).await.map_err(|e| {
            error!(error = %e, "Failed to persist text index");
            e
        })
    }

    /// Load the persisted index, or start empty when none exists. A blob that
    /// fails to decode is an error; it is never silently replaced.
    pub async fn load(kv: &dyn KeyValueStore) -> Result<Self> {
        match kv.get(defaults::TEXT_INDEX_KEY).await? {
            Some(bytes) => {
                let index = TextIndex::deserialize(&bytes).map_err(|e| {
                    error!(error = %e, "Persisted text index is corrupt");
                    e
                })?;
                debug!(result_count = index.len(), "Text index loaded");
                Ok(Self::new(index))
            }
            None => Ok(Self::default()),
        }
    }
}

impl std::fmt::Debug for SharedTextIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedTextIndex").finish_non_exhaustive()
    }
}
