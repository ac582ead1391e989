//! Announcement and batch email endpoints, plus mail service status.

use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use domain_notifications::{dispatcher::DispatchOutcome, NotificationCategory};
use serde::Deserialize;
use serde_json::{json, Value};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/announcements/new-activity/{name}",
            post(announce_new_activity),
        )
        .route("/announcements/batch-email", post(send_batch_email))
        .route("/email-service/status", get(email_service_status))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct AnnounceRequest {
    recipients: Option<Vec<String>>,
}

/// Announce a new activity.
///
/// POST /announcements/new-activity/{name}
///
/// Without an explicit recipient list, the announcement goes to every user
/// whose preferences allow new-activity notifications.
async fn announce_new_activity(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Option<Json<AnnounceRequest>>,
) -> Result<Json<Value>, ApiError> {
    let activity = state.activities.get(&name).await?;

    let recipients = match body.and_then(|Json(req)| req.recipients).filter(|r| !r.is_empty()) {
        Some(explicit) => explicit,
        None => {
            state
                .prefs
                .list_enabled(NotificationCategory::NewActivities)
                .await
        }
    };

    if recipients.is_empty() {
        return Ok(Json(json!({"message": "No recipients to send to"})));
    }

    let outcome = state
        .dispatcher
        .dispatch_new_activity_announcement(
            &recipients,
            &name,
            &activity.schedule,
            &activity.description,
            activity.max_participants,
        )
        .await;

    let response = match outcome {
        DispatchOutcome::Queued { recipients: count } => json!({
            "message": format!("Announcement emails queued for {} recipients", count),
            "activity": name,
            "recipients_count": count,
        }),
        DispatchOutcome::Skipped { reason } => json!({
            "message": format!("No announcement sent: {}", reason),
            "activity": name,
            "recipients_count": 0,
        }),
        DispatchOutcome::Failed { .. } => json!({
            "message": "Could not queue announcement emails (task queue unavailable)",
            "activity": name,
            "recipients_count": recipients.len(),
            "warning": "Email service may not be available",
        }),
    };

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct BatchEmailRequest {
    recipients: Vec<String>,
    subject: String,
    template_name: String,
    #[serde(default)]
    context: Value,
}

/// Send batch emails with a custom template.
///
/// POST /announcements/batch-email
///
/// Preferences do not gate this path; an empty recipient list is a 400.
async fn send_batch_email(
    State(state): State<AppState>,
    Json(request): Json<BatchEmailRequest>,
) -> Result<Json<Value>, ApiError> {
    let summary = state
        .dispatcher
        .dispatch_batch(
            &request.recipients,
            &request.subject,
            &request.template_name,
            request.context,
        )
        .await?;

    let mut response = json!({
        "message": format!("Batch emails queued for {} recipients", summary.queued),
        "recipients_count": summary.total,
        "queued": summary.queued,
        "failed": summary.failed,
    });
    if summary.failed > 0 {
        response["warning"] = json!("Email service may not be available");
    }

    Ok(Json(response))
}

/// Check whether the mail transport is configured
///
/// GET /email-service/status
async fn email_service_status(State(state): State<AppState>) -> Json<Value> {
    let message = if state.mail_configured {
        "Email service is configured"
    } else {
        "Email service is not configured. Set SMTP_USERNAME and SMTP_PASSWORD environment variables."
    };

    Json(json!({
        "enabled": state.mail_configured,
        "message": message,
    }))
}
