//! # tabweave-api
//!
//! The [`TabWeave`] engine facade and the HTTP surface the browser
//! extension talks to.
//!
//! This crate provides:
//! - Suggestions for the current tab, ranked then unranked, behind a
//!   short-lived cache
//! - Navigation recording, tab lifecycle updates and enrichment control
//! - Periodic maintenance (relationship decay and workflow mining)
//! - An axum router backed by a registry of extension-pushed tabs
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tabweave_api::{router, AppState, EngineConfig, PushedTabs, TabWeave};
//!
//! let tabs = Arc::new(PushedTabs::new());
//! let engine = TabWeave::new(db, tabs.clone(), tabs.clone(), analyzer, EngineConfig::default()).await?;
//! let app = router(AppState { engine: Arc::new(engine), tabs });
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod pushed;
pub mod routes;
pub mod suggestion_cache;

pub use config::AppConfig;
pub use engine::{EngineConfig, EngineStats, MaintenanceReport, Suggestion, Suggestions, TabWeave};
pub use error::ApiError;
pub use pushed::PushedTabs;
pub use routes::{router, AppState};
pub use suggestion_cache::SuggestionCache;
