//! HTTP error responses
//!
//! Bodies are `{"error": "..."}`. Store and internal failures are reported
//! with a generic message; the detail only goes to the log.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Generic message for failed update callbacks
pub const UPDATE_FAILED: &str = "An error occurred while updating DNS record.";

/// Generic message for failed management requests
pub const REQUEST_FAILED: &str = "An error occurred while processing the request.";

/// An error rendered as a JSON response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Map a core error, using `generic` for anything not safe to show
    pub fn from_core(err: dyndns_core::Error, generic: &str) -> Self {
        use dyndns_core::Error;

        match err {
            Error::Conflict(_) => Self::new(StatusCode::CONFLICT, "Domain already exists."),
            Error::InvalidInput(msg) => Self::bad_request(msg),
            Error::NotFound(_) => Self::not_found("Not found."),
            e if e.is_retryable() => {
                tracing::warn!("Request failed with retryable error: {}", e);
                Self::new(StatusCode::SERVICE_UNAVAILABLE, generic)
            }
            e => {
                tracing::error!("Request failed: {}", e);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, generic)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
