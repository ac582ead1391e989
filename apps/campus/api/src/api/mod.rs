//! HTTP route composition.

mod activities;
mod announcements;
mod preferences;

use crate::state::AppState;
use axum::Router;

/// Build the full API router with state applied.
pub fn routes(state: &AppState) -> Router {
    Router::new()
        .merge(activities::router(state.clone()))
        .merge(preferences::router(state.clone()))
        .merge(announcements::router(state.clone()))
}
