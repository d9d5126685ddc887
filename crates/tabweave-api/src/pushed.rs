//! Tab registry fed by the browser extension.
//!
//! The extension pushes a snapshot for every open tab and, when it could
//! read the page, the extracted text. The registry serves both back to the
//! pipeline as its tab source and text extractor.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use tabweave_core::{Error, PageExtract, Result, TabHandle, TabSnapshot, TabSource, TextExtractor};

#[derive(Debug, Clone)]
struct PushedTab {
    snapshot: TabSnapshot,
    page: Option<PageExtract>,
}

#[derive(Debug, Default)]
pub struct PushedTabs {
    tabs: RwLock<BTreeMap<TabHandle, PushedTab>>,
}

impl PushedTabs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a snapshot. A page pushed earlier is kept unless the tab
    /// navigated to another URL.
    pub async fn upsert(&self, snapshot: TabSnapshot, page: Option<PageExtract>) {
        let mut tabs = self.tabs.write().await;
        let kept = match tabs.remove(&snapshot.handle) {
            Some(previous) if previous.snapshot.url == snapshot.url => previous.page,
            _ => None,
        };
        tabs.insert(
            snapshot.handle,
            PushedTab {
                snapshot,
                page: page.or(kept),
            },
        );
    }

    pub async fn remove(&self, handle: TabHandle) -> bool {
        self.tabs.write().await.remove(&handle).is_some()
    }

    pub async fn contains(&self, handle: TabHandle) -> bool {
        self.tabs.read().await.contains_key(&handle)
    }

    pub async fn len(&self) -> usize {
        self.tabs.read().await.len()
    }
}

#[async_trait]
impl TabSource for PushedTabs {
    async fn open_tabs(&self) -> Result<Vec<TabSnapshot>> {
        Ok(self
            .tabs
            .read()
            .await
            .values()
            .map(|t| t.snapshot.clone())
            .collect())
    }

    async fn get_tab(&self, handle: TabHandle) -> Result<Option<TabSnapshot>> {
        Ok(self.tabs.read().await.get(&handle).map(|t| t.snapshot.clone()))
    }
}

#[async_trait]
impl TextExtractor for PushedTabs {
    async fn extract(&self, tab: &TabSnapshot) -> Result<PageExtract> {
        self.tabs
            .read()
            .await
            .get(&tab.handle)
            .and_then(|t| t.page.clone())
            .ok_or_else(|| Error::Extraction(format!("no page text pushed for tab {}", tab.handle)))
    }
}
