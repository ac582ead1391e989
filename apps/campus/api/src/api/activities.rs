//! Activity roster endpoints: view, signup, unregister.
//!
//! Roster mutations commit before any notification is dispatched; a queue
//! problem surfaces only as an advisory `warning` field on an otherwise
//! successful response.

use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use domain_activities::{Activity, ActivityResult};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/activities", get(list_activities))
        .route("/activities/{name}/signup", post(signup))
        .route("/activities/{name}/unregister", delete(unregister))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct EmailQuery {
    email: String,
}

/// List all activities with their participants
///
/// GET /activities
async fn list_activities(State(state): State<AppState>) -> Json<BTreeMap<String, Activity>> {
    Json(state.activities.list().await)
}

/// Sign a student up for an activity
///
/// POST /activities/{name}/signup?email=student@mergington.edu
async fn signup(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<EmailQuery>,
) -> ActivityResult<Json<Value>> {
    let activity = state.activities.add_participant(&name, &query.email).await?;

    // Fire-and-forget: the signup is already committed
    let outcome = state
        .dispatcher
        .dispatch_signup_confirmation(
            &query.email,
            &name,
            &activity.schedule,
            &activity.description,
            None,
        )
        .await;

    let mut body = json!({
        "message": format!("Signed up {} for {}", query.email, name)
    });
    if let Some(warning) = outcome.warning() {
        body["warning"] = json!(warning);
    }

    Ok(Json(body))
}

/// Unregister a student from an activity
///
/// DELETE /activities/{name}/unregister?email=student@mergington.edu
async fn unregister(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<EmailQuery>,
) -> ActivityResult<Json<Value>> {
    let activity = state
        .activities
        .remove_participant(&name, &query.email)
        .await?;

    let outcome = state
        .dispatcher
        .dispatch_unregister_confirmation(&query.email, &name, &activity.schedule, None)
        .await;

    let mut body = json!({
        "message": format!("Unregistered {} from {}", query.email, name)
    });
    if let Some(warning) = outcome.warning() {
        body["warning"] = json!(warning);
    }

    Ok(Json(body))
}
