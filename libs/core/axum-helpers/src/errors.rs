use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

/// Standard error response body.
///
/// ```json
/// {
///   "error": "BadRequest",
///   "message": "Request validation failed",
///   "details": { "email": [ ... ] }
/// }
/// ```
#[derive(Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Optional structured details (e.g. validation field errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }
}

/// JSON 404 fallback handler.
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new("NotFound", "Resource not found")),
    )
}
