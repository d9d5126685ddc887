//! # tabweave-graph
//!
//! Relationship graph and workflow mining for tabweave.
//!
//! This crate provides:
//! - [`RelationshipGraph`]: pairwise strength with strengthening, semantic
//!   enrichment, pruning and time decay
//! - [`WorkflowMiner`]: repeated navigation sequences and next-tab prediction

pub mod relationships;
pub mod workflows;

pub use relationships::{DecaySweep, EnrichmentSweep, GraphConfig, RelatedTab, RelationshipGraph};
pub use workflows::{CandidateSequence, MinerConfig, WorkflowMiner, WorkflowPrediction};
