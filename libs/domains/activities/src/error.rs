use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("Activity not found: {0}")]
    NotFound(String),

    #[error("Student is already signed up")]
    AlreadyRegistered { activity: String, email: String },

    #[error("Student is not signed up for this activity")]
    NotRegistered { activity: String, email: String },

    #[error("Activity is full")]
    CapacityReached { activity: String },
}

pub type ActivityResult<T> = Result<T, ActivityError>;

impl IntoResponse for ActivityError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            ActivityError::NotFound(name) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("Activity '{}' not found", name),
            ),
            ActivityError::AlreadyRegistered { activity, email } => (
                StatusCode::BAD_REQUEST,
                "already_registered",
                format!("{} is already signed up for {}", email, activity),
            ),
            ActivityError::NotRegistered { activity, email } => (
                StatusCode::BAD_REQUEST,
                "not_registered",
                format!("{} is not signed up for {}", email, activity),
            ),
            ActivityError::CapacityReached { activity } => (
                StatusCode::BAD_REQUEST,
                "capacity_reached",
                format!("{} has no remaining spots", activity),
            ),
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
