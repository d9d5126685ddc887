//! One-time capability detection.
//!
//! The session is created once per pipeline and passed to whoever needs the
//! AI backend. Code branches on the variant; nothing probes for the
//! capability again per call.

use std::sync::Arc;
use tracing::{info, warn};

use tabweave_core::{Availability, CapabilityProvider, GenerationBackend};

#[derive(Clone)]
pub enum AiSession {
    Available(Arc<dyn GenerationBackend>),
    Unavailable,
}

impl AiSession {
    /// Check availability once and open a session if the capability exists.
    pub async fn detect(provider: &dyn CapabilityProvider) -> Self {
        match provider.availability().await {
            Availability::Available => match provider.create().await {
                Ok(backend) => {
                    info!(
                        subsystem = "inference",
                        provider = provider.name(),
                        model = backend.model_name(),
                        "AI capability available"
                    );
                    AiSession::Available(backend)
                }
                Err(e) => {
                    warn!(
                        subsystem = "inference",
                        provider = provider.name(),
                        error = %e,
                        "AI capability reported available but session creation failed, running text-only"
                    );
                    AiSession::Unavailable
                }
            },
            Availability::Unavailable => {
                info!(
                    subsystem = "inference",
                    provider = provider.name(),
                    "AI capability unavailable, running text-only"
                );
                AiSession::Unavailable
            }
        }
    }

    pub fn from_backend(backend: Arc<dyn GenerationBackend>) -> Self {
        AiSession::Available(backend)
    }

    pub fn is_available(&self) -> bool {
        matches!(self, AiSession::Available(_))
    }

    pub fn backend(&self) -> Option<&Arc<dyn GenerationBackend>> {
        match self {
            AiSession::Available(backend) => Some(backend),
            AiSession::Unavailable => None,
        }
    }
}

impl std::fmt::Debug for AiSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiSession::Available(backend) => {
                f.debug_tuple("Available").field(&backend.model_name()).finish()
            }
            AiSession::Unavailable => f.write_str("Unavailable"),
        }
    }
}
