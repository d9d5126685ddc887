//! Ollama generation backend and capability provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use tabweave_core::{
    defaults, Availability, CapabilityProvider, Error, GenerationBackend, Result,
};

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = defaults::OLLAMA_URL;

/// Default generation model.
pub const DEFAULT_GEN_MODEL: &str = defaults::GEN_MODEL;

/// Timeout for generation requests (seconds). Zero disables it.
pub const GEN_TIMEOUT_SECS: u64 = defaults::GEN_TIMEOUT_SECS;

/// `None` when `secs` is zero: generation may then run as long as the
/// server takes.
fn generation_timeout(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Ollama generation backend.
#[derive(Clone)]
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    gen_model: String,
    gen_timeout: Option<Duration>,
}

impl OllamaBackend {
    /// Create a new Ollama backend with default settings.
    pub fn new() -> Self {
        Self::with_config(
            DEFAULT_OLLAMA_URL.to_string(),
            DEFAULT_GEN_MODEL.to_string(),
            GEN_TIMEOUT_SECS,
        )
    }

    /// Create a new Ollama backend with custom configuration.
    ///
    /// A `gen_timeout_secs` of zero means generation requests never time out.
    pub fn with_config(base_url: String, gen_model: String, gen_timeout_secs: u64) -> Self {
        let gen_timeout = generation_timeout(gen_timeout_secs);
        let mut builder = Client::builder();
        if let Some(timeout) = gen_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().unwrap_or_default();

        let base_url = base_url.trim_end_matches('/').to_string();
        info!(
            "Initializing Ollama backend: url={}, gen={}, timeout_secs={}",
            base_url, gen_model, gen_timeout_secs
        );

        Self {
            client,
            base_url,
            gen_model,
            gen_timeout,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("OLLAMA_BASE").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
        let gen_model =
            std::env::var("OLLAMA_GEN_MODEL").unwrap_or_else(|_| DEFAULT_GEN_MODEL.to_string());
        let timeout = std::env::var("OLLAMA_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(GEN_TIMEOUT_SECS);

        Self::with_config(base_url, gen_model, timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn gen_timeout(&self) -> Option<Duration> {
        self.gen_timeout
    }

    /// Check that the Ollama server answers. Errors are reported as `false`.
    pub async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(defaults::HEALTH_CHECK_TIMEOUT_SECS))
            .send()
            .await;

        match response {
            Ok(resp) => {
                if resp.status().is_success() {
                    info!("Ollama health check passed");
                    Ok(true)
                } else {
                    warn!("Ollama health check failed: {}", resp.status());
                    Ok(false)
                }
            }
            Err(e) => {
                warn!("Ollama health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Generation through the `/api/chat` endpoint.
    async fn generate_internal(&self, system: &str, prompt: &str) -> Result<String> {
        let start = Instant::now();

        let mut messages = Vec::new();
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request = ChatRequest {
            model: self.gen_model.clone(),
            messages,
            stream: false,
        };

        let mut builder = self.client.post(format!("{}/api/chat", self.base_url));
        if let Some(timeout) = self.gen_timeout {
            builder = builder.timeout(timeout);
        }
        let response = builder
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let content = result.message.content;
        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            response_len = content.len(),
            duration_ms = elapsed,
            "Generation complete"
        );
        if elapsed > 30000 {
            warn!(
                duration_ms = elapsed,
                prompt_len = prompt.len(),
                slow = true,
                "Slow generation operation"
            );
        }
        Ok(content)
    }
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Chat API message for `/api/chat`.
#[derive(Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Request payload for the Ollama `/api/chat` endpoint.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

/// Response from the Ollama `/api/chat` endpoint.
#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    #[instrument(skip(self, system, prompt), fields(subsystem = "inference", component = "ollama", op = "generate", model = %self.gen_model, prompt_len = prompt.len()))]
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.generate_internal(system, prompt).await
    }

    fn model_name(&self) -> &str {
        &self.gen_model
    }
}

/// Capability provider backed by a local Ollama server. The server counts
/// as available when its health check passes.
pub struct OllamaProvider {
    backend: OllamaBackend,
}

impl OllamaProvider {
    pub fn new(backend: OllamaBackend) -> Self {
        Self { backend }
    }

    pub fn from_env() -> Self {
        Self::new(OllamaBackend::from_env())
    }
}

#[async_trait]
impl CapabilityProvider for OllamaProvider {
    async fn availability(&self) -> Availability {
        match self.backend.health_check().await {
            Ok(true) => Availability::Available,
            _ => Availability::Unavailable,
        }
    }

    async fn create(&self) -> Result<Arc<dyn GenerationBackend>> {
        Ok(Arc::new(self.backend.clone()))
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
