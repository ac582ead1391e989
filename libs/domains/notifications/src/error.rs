use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Preferences not found for {0}")]
    NotFound(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Provider error: {0}")]
    Provider(String),
}

pub type NotificationResult<T> = Result<T, NotificationError>;

impl From<stream_worker::StreamError> for NotificationError {
    fn from(err: stream_worker::StreamError) -> Self {
        Self::Queue(err.to_string())
    }
}

impl From<eyre::Report> for NotificationError {
    fn from(err: eyre::Report) -> Self {
        Self::Provider(err.to_string())
    }
}

impl IntoResponse for NotificationError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            NotificationError::InvalidInput(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_input", msg.clone())
            }
            NotificationError::NotFound(identity) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("Preferences not found for {}", identity),
            ),
            NotificationError::Queue(msg) => {
                tracing::warn!("Queue error: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "queue_unavailable",
                    "Notification queue is unavailable".to_string(),
                )
            }
            NotificationError::Template(msg) | NotificationError::Provider(msg) => {
                tracing::error!("Notification error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        (
            status,
            Json(json!({
                "error": {
                    "type": error_type,
                    "message": message
                }
            })),
        )
            .into_response()
    }
}
