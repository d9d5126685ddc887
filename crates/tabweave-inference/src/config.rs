//! Provider selection from the environment.

use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use tabweave_core::{defaults, CapabilityProvider, Error, NoCapability, Result};

#[cfg(feature = "ollama")]
use crate::ollama::{OllamaBackend, OllamaProvider};

/// Which AI capability provider to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    Ollama,
    Disabled,
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "disabled" | "none" | "off" => Ok(Self::Disabled),
            other => Err(Error::Config(format!("Unknown AI provider: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceConfig {
    pub provider: ProviderKind,
    pub base_url: String,
    pub model: String,
    /// Generation timeout; zero means none.
    pub timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            base_url: defaults::OLLAMA_URL.to_string(),
            model: defaults::GEN_MODEL.to_string(),
            timeout_secs: defaults::GEN_TIMEOUT_SECS,
        }
    }
}

impl InferenceConfig {
    /// Read `TABWEAVE_AI_PROVIDER`, `OLLAMA_BASE`, `OLLAMA_GEN_MODEL` and
    /// `OLLAMA_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let provider = match std::env::var("TABWEAVE_AI_PROVIDER") {
            Ok(value) if !value.trim().is_empty() => value.parse()?,
            _ => defaults.provider,
        };
        Ok(Self {
            provider,
            base_url: std::env::var("OLLAMA_BASE").unwrap_or(defaults.base_url),
            model: std::env::var("OLLAMA_GEN_MODEL").unwrap_or(defaults.model),
            timeout_secs: std::env::var("OLLAMA_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        })
    }

    pub fn build_provider(&self) -> Arc<dyn CapabilityProvider> {
        info!(provider = ?self.provider, model = %self.model, "Building AI capability provider");
        match self.provider {
            #[cfg(feature = "ollama")]
            ProviderKind::Ollama => Arc::new(OllamaProvider::new(OllamaBackend::with_config(
                self.base_url.clone(),
                self.model.clone(),
                self.timeout_secs,
            ))),
            #[cfg(not(feature = "ollama"))]
            ProviderKind::Ollama => {
                tracing::warn!("Built without the ollama feature, AI capability disabled");
                Arc::new(NoCapability)
            }
            ProviderKind::Disabled => Arc::new(NoCapability),
        }
    }
}
