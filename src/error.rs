//! Error handling module
//!
//! Top-level error type and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::event_store::StoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Author not found: {0}")]
    AuthorNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            AppError::AuthorNotFound(author) => {
                (StatusCode::NOT_FOUND, "author_not_found", Some(author.clone()))
            }
            AppError::Store(StoreError::EventNotFound(id)) => {
                (StatusCode::NOT_FOUND, "event_not_found", Some(id.to_string()))
            }
            AppError::Store(e @ (StoreError::Unavailable(_) | StoreError::Timeout(_))) => {
                tracing::warn!("Storage unavailable: {:?}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable", None)
            }
            AppError::Store(e) => {
                tracing::error!("Storage error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", None)
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
