//! # tabweave-inference
//!
//! AI capability abstraction for tabweave.
//!
//! This crate provides:
//! - One-time capability detection ([`AiSession`])
//! - Summaries, structured extraction and similarity judgments ([`ContentAnalyzer`])
//! - Prompt builders and labeled-section response parsers
//! - Deterministic fallbacks for when no capability exists
//! - Ollama implementation (default)
//!
//! # Feature Flags
//!
//! - `ollama` (default): Enable Ollama backend
//! - `mock`: Expose the scripted mock backend to downstream tests
//!
//! # Example
//!
//! ```rust,no_run
//! use tabweave_inference::{AiSession, ContentAnalyzer, InferenceConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let provider = InferenceConfig::from_env().unwrap().build_provider();
//!     let session = AiSession::detect(provider.as_ref()).await;
//!     let analyzer = ContentAnalyzer::new(session);
//!     let summary = analyzer.summarize("Title", "Some page text").await;
//! }
//! ```

pub mod analyzer;
pub mod config;
pub mod fallback;
pub mod parse;
pub mod prompts;
pub mod session;
pub mod types;

#[cfg(feature = "ollama")]
pub mod ollama;

// Mock inference backend for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use tabweave_core::*;

pub use analyzer::{truncate_chars, ContentAnalyzer};
pub use config::{InferenceConfig, ProviderKind};
pub use fallback::{extract_by_frequency, naive_summary};
pub use parse::{parse_extraction, parse_similarity};
pub use session::AiSession;
pub use types::{DocumentProfile, ExtractedMetadata, SimilarityJudgment};

#[cfg(feature = "ollama")]
pub use ollama::{OllamaBackend, OllamaProvider};
