//! Mock generation backend for deterministic testing.
//!
//! Responses are scripted by prompt substring, so one backend can answer
//! summary, extraction and similarity prompts differently.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tabweave_inference::mock::MockGenerationBackend;
//!
//! let backend = MockGenerationBackend::new()
//!     .with_response_containing("SIMILARITY_SCORE", "SIMILARITY_SCORE: 0.9")
//!     .with_fixed_response("A short summary.");
//! ```

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use tabweave_core::{Availability, CapabilityProvider, Error, GenerationBackend, Result};

/// Mock generation backend for testing.
#[derive(Clone)]
pub struct MockGenerationBackend {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

#[derive(Debug, Clone)]
struct MockConfig {
    rules: Vec<(String, String)>,
    failing_on: Vec<String>,
    default_response: String,
    latency_ms: u64,
    always_fail: bool,
}

#[derive(Debug, Clone)]
pub struct MockCall {
    pub prompt: String,
    pub timestamp: std::time::Instant,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            failing_on: Vec::new(),
            default_response: "Mock response".to_string(),
            latency_ms: 0,
            always_fail: false,
        }
    }
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Response for prompts that match no rule.
    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_response = response.into();
        self
    }

    /// Answer `output` to any prompt containing `needle`. First match wins.
    pub fn with_response_containing(
        mut self,
        needle: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .rules
            .push((needle.into(), output.into()));
        self
    }

    /// Fail every prompt containing `needle`.
    pub fn failing_on(mut self, needle: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).failing_on.push(needle.into());
        self
    }

    /// Fail every call.
    pub fn always_failing(mut self) -> Self {
        Arc::make_mut(&mut self.config).always_fail = true;
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    pub fn get_calls(&self) -> Vec<MockCall> {
        self.call_log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.call_log.lock().map(|log| log.len()).unwrap_or(0)
    }

    /// Number of calls whose prompt contained `needle`.
    pub fn calls_containing(&self, needle: &str) -> usize {
        self.call_log
            .lock()
            .map(|log| log.iter().filter(|c| c.prompt.contains(needle)).count())
            .unwrap_or(0)
    }

    fn log_call(&self, prompt: &str) {
        if let Ok(mut log) = self.call_log.lock() {
            log.push(MockCall {
                prompt: prompt.to_string(),
                timestamp: std::time::Instant::now(),
            });
        }
    }
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.log_call(prompt);
        if self.config.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.config.latency_ms)).await;
        }

        if self.config.always_fail || self.config.failing_on.iter().any(|n| prompt.contains(n)) {
            return Err(Error::Inference("simulated failure".to_string()));
        }

        Ok(self
            .config
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| self.config.default_response.clone()))
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.generate(&format!("{}\n{}", system, prompt)).await
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

/// Capability provider handing out a mock backend.
pub struct MockProvider {
    backend: Option<MockGenerationBackend>,
    available: bool,
}

impl MockProvider {
    pub fn new(backend: MockGenerationBackend) -> Self {
        Self {
            backend: Some(backend),
            available: true,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            backend: None,
            available: false,
        }
    }

    /// Claims availability but fails to create a session.
    pub fn broken() -> Self {
        Self {
            backend: None,
            available: true,
        }
    }
}

#[async_trait]
impl CapabilityProvider for MockProvider {
    async fn availability(&self) -> Availability {
        if self.available {
            Availability::Available
        } else {
            Availability::Unavailable
        }
    }

    async fn create(&self) -> Result<Arc<dyn GenerationBackend>> {
        match &self.backend {
            Some(backend) => Ok(Arc::new(backend.clone())),
            None => Err(Error::CapabilityUnavailable("mock provider".to_string())),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
