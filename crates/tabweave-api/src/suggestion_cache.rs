//! Short-lived cache of suggestion lists.
//!
//! Entries expire after a TTL and are also dropped when the number of open
//! tabs has changed since they were computed. State-changing engine calls
//! clear the whole cache.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use tabweave_core::TabHandle;

use crate::engine::Suggestions;

struct CachedSuggestions {
    stored_at: Instant,
    open_tabs: usize,
    suggestions: Suggestions,
}

pub struct SuggestionCache {
    entries: Mutex<LruCache<TabHandle, CachedSuggestions>>,
    ttl: Duration,
}

impl SuggestionCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Cached list for `handle`, if still fresh for `open_tabs` open tabs.
    pub async fn get(&self, handle: TabHandle, open_tabs: usize) -> Option<Suggestions> {
        let mut entries = self.entries.lock().await;
        let fresh = match entries.get(&handle) {
            Some(entry) => entry.open_tabs == open_tabs && entry.stored_at.elapsed() < self.ttl,
            None => return None,
        };
        if !fresh {
            entries.pop(&handle);
            debug!(tab_handle = handle, "Dropped stale suggestion cache entry");
            return None;
        }
        entries.get(&handle).map(|entry| entry.suggestions.clone())
    }

    pub async fn insert(&self, handle: TabHandle, open_tabs: usize, suggestions: Suggestions) {
        self.entries.lock().await.put(
            handle,
            CachedSuggestions {
                stored_at: Instant::now(),
                open_tabs,
                suggestions,
            },
        );
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
