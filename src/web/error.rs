//! Shared API error type for web handlers.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    NotFound(&'static str),
    BadRequest(String),
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Log a database error and hide the details from the client.
pub fn db_error(err: anyhow::Error) -> ApiError {
    error!(error = ?err, "database error");
    ApiError::Internal
}

/// Map a missing row to a 404.
pub trait OptionNotFoundExt<T> {
    fn or_not_found(self, what: &'static str) -> Result<T, ApiError>;
}

impl<T> OptionNotFoundExt<T> for Option<T> {
    fn or_not_found(self, what: &'static str) -> Result<T, ApiError> {
        self.ok_or(ApiError::NotFound(what))
    }
}
