//! Error types for tabweave.

use thiserror::Error;

/// Result type alias using tabweave's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for tabweave operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Tab document not found
    #[error("Tab document not found: {0}")]
    DocumentNotFound(uuid::Uuid),

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// A capability (AI backend, text extraction) is not present on this device
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// Page text extraction failed or timed out
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Backing store failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// SQL query or connection failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for the "expected absence" family that batch sweeps skip over.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::DocumentNotFound(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
