use domain_activities::ActivityStore;
use domain_notifications::{NotificationDispatcher, PreferenceStore};
use std::sync::Arc;

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub activities: Arc<ActivityStore>,
    pub prefs: Arc<dyn PreferenceStore>,
    pub dispatcher: NotificationDispatcher,
    /// Whether SMTP credentials were present at startup.
    pub mail_configured: bool,
}
