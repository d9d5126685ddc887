//! # tabweave-search
//!
//! Text indexing and hybrid scoring for tabweave.
//!
//! This crate provides:
//! - [`TextIndex`]: an incremental BM25 index with n-grams and statistical
//!   stop-word filtering
//! - [`SharedTextIndex`]: a snapshot handle readers never block on, persisted
//!   as one blob
//! - [`HybridScorer`]: lite and hybrid weighted scoring with deterministic
//!   ordering and per-signal explanations
//!
//! ## Example
//!
//! ```rust,ignore
//! use tabweave_search::{HybridScorer, SharedTextIndex};
//!
//! let index = SharedTextIndex::load(db.kv.as_ref()).await?;
//! let scorer = HybridScorer::new(index, graph, miner, db.navigation.clone());
//! let ranked = scorer.score(&current, &open_tabs, chrono::Utc::now()).await;
//! ```

pub mod scorer;
pub mod shared;
pub mod signals;
pub mod text_index;
pub mod tokenizer;
pub mod weights;

// Re-export core types
pub use tabweave_core::*;

pub use scorer::{compare_scored, scored_ids, HybridScorer, ScoreBreakdown, ScoredCandidate, ScorerConfig};
pub use shared::SharedTextIndex;
pub use text_index::{DocumentMetadata, IndexedDocument, TextIndex};
pub use tokenizer::{is_ngram, ngrams, tokenize};
pub use weights::{select_mode, ScoringMode, SignalWeights};
