//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Internal(tabweave_core::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    /// A write collided with a uniqueness constraint.
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<tabweave_core::Error> for ApiError {
    fn from(err: tabweave_core::Error) -> Self {
        match err {
            tabweave_core::Error::NotFound(msg) => ApiError::NotFound(msg),
            tabweave_core::Error::DocumentNotFound(id) => {
                ApiError::NotFound(format!("document {}", id))
            }
            tabweave_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            tabweave_core::Error::Database(e)
                if e.as_database_error()
                    .is_some_and(|db| db.is_unique_violation()) =>
            {
                ApiError::Conflict(e.to_string())
            }
            other => ApiError::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Internal(err) => {
                error!(error = %err, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
        };
        let message = self.to_string();

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
