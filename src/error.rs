use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::repository::RepositoryError;

/// ApiError
///
/// The application-wide error taxonomy. Every handler returns `Result<T, ApiError>`,
/// so no error escapes to a generic framework handler: each failure is mapped to a
/// status code and a JSON body of the form `{"error": "..."}` right here.
///
/// Internal failures (database, storage) are logged with their full cause and
/// surfaced to the caller as a generic message so nothing about the store or the
/// infrastructure leaks out.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed input (400).
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid credentials (401).
    #[error("{0}")]
    Unauthorized(String),

    /// Role, ownership, or sequence-gate failure (403).
    #[error("{0}")]
    Forbidden(String),

    /// Entity absent, or the caller lacks visibility. The two are deliberately
    /// conflated to avoid leaking which resources exist (404).
    #[error("{0}")]
    NotFound(String),

    /// Duplicate completion, enrollment, or registration (409).
    #[error("{0}")]
    Conflict(String),

    /// Storage layer failure (500); the underlying message stays server-side.
    #[error("storage error: {0}")]
    Storage(String),

    /// Unexpected repository failure (500). Unique-violation conflicts that a
    /// handler did not anticipate still map to 409 rather than 500.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            ApiError::Storage(_) => {
                tracing::error!(error = %self, "storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
            ApiError::Repository(RepositoryError::Conflict) => {
                (StatusCode::CONFLICT, "duplicate record".to_string())
            }
            ApiError::Repository(_) => {
                tracing::error!(error = %self, "repository failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}
