//! # tabweave-core
//!
//! Core types, traits, and abstractions for tabweave.
//!
//! This crate provides the data model, the storage and capability traits,
//! and the constants that every other tabweave crate depends on.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod overlap;
pub mod traits;
pub mod url_utils;

// Re-export commonly used types
pub use error::{Error, Result};
pub use models::*;
pub use overlap::{jaccard, shared_terms};
pub use traits::*;
pub use url_utils::{detect_application, extract_domain, normalize_url, url_hash, Application};
