//! API error taxonomy and its HTTP mapping.
//!
//! Internal detail is logged server-side; clients only ever see an opaque
//! message plus a 400/404/500 status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    /// Malformed client input.
    BadRequest(String),
    /// Referenced session absent.
    NotFound(String),
    /// Backend text did not parse into the expected shape.
    InvalidGenerationResponse(String),
    /// No backend endpoint variant succeeded.
    GenerationFailure(String),
    /// Storage backend query error.
    StorageFailure(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn invalid_generation(message: impl Into<String>) -> Self {
        ApiError::InvalidGenerationResponse(message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::InvalidGenerationResponse(detail) => {
                error!(target: "mathsprout_backend", %detail, "Model response failed validation");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to generate math problem. Please try again.".to_string(),
                )
            }
            ApiError::GenerationFailure(detail) => {
                error!(target: "mathsprout_backend", %detail, "Text generation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "The problem generator is unavailable. Please try again.".to_string(),
                )
            }
            ApiError::StorageFailure(detail) => {
                error!(target: "mathsprout_backend", %detail, "Storage backend error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A storage error occurred. Please try again.".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
