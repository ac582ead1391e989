use axum::response::{IntoResponse, Response};
use domain_activities::ActivityError;
use domain_notifications::NotificationError;
use thiserror::Error;

/// Error type for handlers that touch both domains.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Activity(#[from] ActivityError),

    #[error(transparent)]
    Notification(#[from] NotificationError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Activity(e) => e.into_response(),
            ApiError::Notification(e) => e.into_response(),
        }
    }
}
