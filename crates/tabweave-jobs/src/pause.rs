//! Bulk enrichment pause flag.
//!
//! Held in an atomic for the hot-path check and persisted to the key-value
//! store so a pause survives a restart.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tabweave_core::{defaults, KeyValueStore, Result};

/// Persisted pause state shape.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedPauseState {
    paused: bool,
}

#[derive(Clone)]
pub struct PauseState {
    paused: Arc<AtomicBool>,
    kv: Arc<dyn KeyValueStore>,
}

impl PauseState {
    /// Load the persisted flag. Missing or unreadable state means running.
    pub async fn load(kv: Arc<dyn KeyValueStore>) -> Result<Self> {
        let state = Self {
            paused: Arc::new(AtomicBool::new(false)),
            kv,
        };

        match state.kv.get(defaults::PAUSE_STATE_KEY).await? {
            Some(bytes) => match serde_json::from_slice::<PersistedPauseState>(&bytes) {
                Ok(persisted) => {
                    state.paused.store(persisted.paused, Ordering::SeqCst);
                    if persisted.paused {
                        info!("Bulk enrichment loaded as PAUSED from persisted state");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to parse persisted pause state, defaulting to running");
                }
            },
            None => debug!("No persisted pause state found, defaulting to running"),
        }

        Ok(state)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub async fn pause(&self) -> Result<()> {
        self.paused.store(true, Ordering::SeqCst);
        self.persist().await
    }

    pub async fn resume(&self) -> Result<()> {
        self.paused.store(false, Ordering::SeqCst);
        self.persist().await
    }

    async fn persist(&self) -> Result<()> {
        let state = PersistedPauseState {
            paused: self.paused.load(Ordering::SeqCst),
        };
        let bytes = serde_json::to_vec(&state)?;
        self.kv.set(defaults::PAUSE_STATE_KEY, &bytes).await?;
        debug!(paused = state.paused, "Pause state persisted");
        Ok(())
    }
}

impl std::fmt::Debug for PauseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PauseState")
            .field("paused", &self.is_paused())
            .finish()
    }
}
