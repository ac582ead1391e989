//! Email preference CRUD endpoints.

use crate::state::AppState;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use axum_helpers::ValidatedJson;
use domain_notifications::{NotificationError, NotificationPreferences, NotificationResult};
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/email-preferences", get(list_preferences))
        .route(
            "/email-preferences/{email}",
            get(get_preferences)
                .put(put_preferences)
                .delete(delete_preferences),
        )
        .with_state(state)
}

/// Get preferences for a user, materializing defaults on first read
///
/// GET /email-preferences/{email}
async fn get_preferences(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Json<NotificationPreferences> {
    Json(state.prefs.get(&email).await)
}

/// Replace preferences for a user (wholesale, no partial merge)
///
/// PUT /email-preferences/{email}
async fn put_preferences(
    State(state): State<AppState>,
    Path(email): Path<String>,
    ValidatedJson(prefs): ValidatedJson<NotificationPreferences>,
) -> NotificationResult<Json<Value>> {
    if email != prefs.email {
        return Err(NotificationError::InvalidInput(
            "Email in path must match email in preferences".to_string(),
        ));
    }

    state.prefs.put(prefs.clone()).await;

    Ok(Json(json!({
        "message": "Preferences updated successfully",
        "preferences": prefs
    })))
}

/// Delete preferences for a user
///
/// DELETE /email-preferences/{email}
async fn delete_preferences(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> NotificationResult<Json<Value>> {
    if state.prefs.delete(&email).await {
        Ok(Json(json!({"message": "Preferences deleted successfully"})))
    } else {
        Err(NotificationError::NotFound(email))
    }
}

/// List all stored preferences
///
/// GET /email-preferences
async fn list_preferences(
    State(state): State<AppState>,
) -> Json<BTreeMap<String, NotificationPreferences>> {
    Json(state.prefs.list_all().await)
}
