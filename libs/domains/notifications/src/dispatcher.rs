//! Notification dispatcher: the bridge between domain events and the
//! delivery channel.
//!
//! Every `dispatch_*` call evaluates preferences, resolves recipients,
//! builds an `EmailJob`, and submits it to the channel. The triggering
//! operation (a roster mutation, an admin request) has already committed;
//! nothing here may fail it. Channel trouble is converted into
//! `DispatchOutcome::Failed` and logged, never propagated.

use crate::error::{NotificationError, NotificationResult};
use crate::job::EmailJob;
use crate::preferences::NotificationCategory;
use crate::recipients::RecipientResolver;
use crate::store::PreferenceStore;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use stream_worker::JobQueue;
use tracing::{debug, info, warn};

/// Skip reason: the recipient opted out.
pub const SKIP_PREFERENCES: &str = "preferences";
/// Skip reason: every recipient of a broadcast was filtered out.
pub const SKIP_NO_RECIPIENTS: &str = "no eligible recipients";

/// Outcome of a dispatch attempt.
///
/// `Skipped` and `Failed` are normal results, not errors: a skip means
/// preferences gated the send, a failure means the channel rejected it.
/// Callers report their primary operation as successful either way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The job was accepted by the delivery channel.
    Queued { recipients: usize },
    /// Preferences gated the send; the channel was never contacted.
    Skipped { reason: String },
    /// The channel rejected the submission.
    Failed { reason: String },
}

impl DispatchOutcome {
    fn skipped(reason: &str) -> Self {
        Self::Skipped {
            reason: reason.to_string(),
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued { .. })
    }

    /// Advisory warning for HTTP responses when the channel was down.
    pub fn warning(&self) -> Option<String> {
        match self {
            Self::Failed { .. } => {
                Some("Email service may not be available".to_string())
            }
            _ => None,
        }
    }
}

/// Per-recipient aggregation for batch sends.
#[derive(Debug, Clone, Serialize)]
pub struct BatchDispatchSummary {
    pub total: usize,
    pub queued: usize,
    pub failed: usize,
}

/// Orchestrates preference evaluation, recipient resolution, and channel
/// submission for every notification-producing event.
#[derive(Clone)]
pub struct NotificationDispatcher {
    prefs: Arc<dyn PreferenceStore>,
    resolver: RecipientResolver,
    queue: Arc<dyn JobQueue<EmailJob>>,
    portal_url: String,
}

impl NotificationDispatcher {
    pub fn new(prefs: Arc<dyn PreferenceStore>, queue: Arc<dyn JobQueue<EmailJob>>) -> Self {
        let resolver = RecipientResolver::new(prefs.clone());
        Self {
            prefs,
            resolver,
            queue,
            portal_url: std::env::var("PORTAL_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
        }
    }

    /// Override the portal URL included in announcement emails.
    pub fn with_portal_url(mut self, url: impl Into<String>) -> Self {
        self.portal_url = url.into();
        self
    }

    pub fn resolver(&self) -> &RecipientResolver {
        &self.resolver
    }

    /// Confirmation after a successful signup.
    pub async fn dispatch_signup_confirmation(
        &self,
        identity: &str,
        activity_name: &str,
        schedule: &str,
        description: &str,
        display_name: Option<&str>,
    ) -> DispatchOutcome {
        if !self
            .prefs
            .should_send(identity, NotificationCategory::SignupConfirmation)
            .await
        {
            debug!(identity = %identity, "Signup confirmation skipped by preferences");
            return DispatchOutcome::skipped(SKIP_PREFERENCES);
        }

        let cc = self.resolver.resolve_cc(identity).await;

        let job = EmailJob::new(
            Some(NotificationCategory::SignupConfirmation),
            vec![identity.to_string()],
            format!("Confirmed: {} Registration", activity_name),
            "signup_confirmation",
        )
        .with_cc(cc)
        .with_context(json!({
            "student_name": display_name,
            "activity_name": activity_name,
            "schedule": schedule,
            "description": description,
        }));

        self.enqueue(job).await
    }

    /// Confirmation after a successful unregistration.
    pub async fn dispatch_unregister_confirmation(
        &self,
        identity: &str,
        activity_name: &str,
        schedule: &str,
        display_name: Option<&str>,
    ) -> DispatchOutcome {
        if !self
            .prefs
            .should_send(identity, NotificationCategory::UnregisterConfirmation)
            .await
        {
            debug!(identity = %identity, "Unregister confirmation skipped by preferences");
            return DispatchOutcome::skipped(SKIP_PREFERENCES);
        }

        let cc = self.resolver.resolve_cc(identity).await;

        let job = EmailJob::new(
            Some(NotificationCategory::UnregisterConfirmation),
            vec![identity.to_string()],
            format!("Unregistration Confirmed: {}", activity_name),
            "unregister_confirmation",
        )
        .with_cc(cc)
        .with_context(json!({
            "student_name": display_name,
            "activity_name": activity_name,
            "schedule": schedule,
        }));

        self.enqueue(job).await
    }

    /// Broadcast notification about a change to an activity.
    pub async fn dispatch_activity_change(
        &self,
        recipients: &[String],
        activity_name: &str,
        change_description: &str,
        new_schedule: Option<&str>,
    ) -> DispatchOutcome {
        let eligible = self
            .resolver
            .filter_recipients(recipients, NotificationCategory::ActivityChanges)
            .await;

        if eligible.is_empty() {
            info!(activity = %activity_name, "Activity change had no eligible recipients");
            return DispatchOutcome::skipped(SKIP_NO_RECIPIENTS);
        }

        let job = EmailJob::new(
            Some(NotificationCategory::ActivityChanges),
            eligible,
            format!("Important Update: {}", activity_name),
            "activity_change",
        )
        .with_context(json!({
            "activity_name": activity_name,
            "change_description": change_description,
            "new_schedule": new_schedule,
        }));

        self.enqueue(job).await
    }

    /// Reminder for an upcoming session.
    pub async fn dispatch_reminder(
        &self,
        identity: &str,
        activity_name: &str,
        schedule: &str,
        next_session: &str,
        display_name: Option<&str>,
    ) -> DispatchOutcome {
        if !self
            .prefs
            .should_send(identity, NotificationCategory::Reminders)
            .await
        {
            debug!(identity = %identity, "Reminder skipped by preferences");
            return DispatchOutcome::skipped(SKIP_PREFERENCES);
        }

        let job = EmailJob::new(
            Some(NotificationCategory::Reminders),
            vec![identity.to_string()],
            format!("Reminder: {} Coming Up!", activity_name),
            "reminder",
        )
        .with_context(json!({
            "student_name": display_name,
            "activity_name": activity_name,
            "schedule": schedule,
            "next_session": next_session,
        }));

        self.enqueue(job).await
    }

    /// Announcement of a newly created activity.
    ///
    /// Callers resolve the recipient list (either explicitly or via
    /// `PreferenceStore::list_enabled`); the dispatcher re-filters it here
    /// before submission.
    pub async fn dispatch_new_activity_announcement(
        &self,
        recipients: &[String],
        activity_name: &str,
        schedule: &str,
        description: &str,
        max_participants: usize,
    ) -> DispatchOutcome {
        let eligible = self
            .resolver
            .filter_recipients(recipients, NotificationCategory::NewActivities)
            .await;

        if eligible.is_empty() {
            info!(activity = %activity_name, "Announcement had no eligible recipients");
            return DispatchOutcome::skipped(SKIP_NO_RECIPIENTS);
        }

        let job = EmailJob::new(
            Some(NotificationCategory::NewActivities),
            eligible,
            format!("New Activity Available: {}", activity_name),
            "new_activity",
        )
        .with_context(json!({
            "activity_name": activity_name,
            "schedule": schedule,
            "description": description,
            "max_participants": max_participants,
            "portal_url": self.portal_url,
        }));

        self.enqueue(job).await
    }

    /// Administrative batch send with a custom template.
    ///
    /// Preferences do not gate this path. An empty recipient list is a
    /// caller error, rejected before any channel interaction. One job per
    /// recipient, so a single rejection cannot fail the whole batch.
    pub async fn dispatch_batch(
        &self,
        recipients: &[String],
        subject: &str,
        template_name: &str,
        context: serde_json::Value,
    ) -> NotificationResult<BatchDispatchSummary> {
        if recipients.is_empty() {
            return Err(NotificationError::InvalidInput(
                "No recipients specified".to_string(),
            ));
        }

        let mut queued = 0;
        let mut failed = 0;

        for recipient in recipients {
            let job = EmailJob::new(
                None,
                vec![recipient.clone()],
                subject.to_string(),
                template_name.to_string(),
            )
            .with_context(context.clone());

            match self.enqueue(job).await {
                DispatchOutcome::Queued { .. } => queued += 1,
                _ => failed += 1,
            }
        }

        info!(
            total = recipients.len(),
            queued = queued,
            failed = failed,
            template = %template_name,
            "Batch dispatch complete"
        );

        Ok(BatchDispatchSummary {
            total: recipients.len(),
            queued,
            failed,
        })
    }

    /// Submit a job, swallowing channel failures into an outcome.
    async fn enqueue(&self, job: EmailJob) -> DispatchOutcome {
        let recipients = job.recipients.len();

        match self.queue.submit(&job).await {
            Ok(()) => {
                debug!(
                    job_id = %job.id,
                    category = ?job.category,
                    recipients = recipients,
                    "Queued notification"
                );
                DispatchOutcome::Queued { recipients }
            }
            Err(e) => {
                warn!(
                    job_id = %job.id,
                    category = ?job.category,
                    error = %e,
                    "Failed to queue notification"
                );
                DispatchOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::NotificationPreferences;
    use crate::store::InMemoryPreferenceStore;
    use async_trait::async_trait;
    use stream_worker::{StreamError, StreamJob};
    use tokio::sync::Mutex;

    /// Queue double that records submitted jobs.
    struct RecordingQueue {
        jobs: Mutex<Vec<EmailJob>>,
    }

    impl RecordingQueue {
        fn new() -> Self {
            Self {
                jobs: Mutex::new(Vec::new()),
            }
        }

        async fn jobs(&self) -> Vec<EmailJob> {
            self.jobs.lock().await.clone()
        }
    }

    #[async_trait]
    impl JobQueue<EmailJob> for RecordingQueue {
        async fn submit(&self, job: &EmailJob) -> Result<(), StreamError> {
            self.jobs.lock().await.push(job.clone());
            Ok(())
        }
    }

    /// Queue double that rejects every submission.
    struct RejectingQueue;

    #[async_trait]
    impl JobQueue<EmailJob> for RejectingQueue {
        async fn submit(&self, _job: &EmailJob) -> Result<(), StreamError> {
            Err(StreamError::Rejected("broker unreachable".to_string()))
        }
    }

    fn fixture() -> (
        NotificationDispatcher,
        Arc<InMemoryPreferenceStore>,
        Arc<RecordingQueue>,
    ) {
        let store = Arc::new(InMemoryPreferenceStore::new());
        let queue = Arc::new(RecordingQueue::new());
        let dispatcher = NotificationDispatcher::new(store.clone(), queue.clone())
            .with_portal_url("http://localhost:8000");
        (dispatcher, store, queue)
    }

    #[tokio::test]
    async fn test_signup_confirmation_with_defaults() {
        let (dispatcher, _store, queue) = fixture();

        let outcome = dispatcher
            .dispatch_signup_confirmation("a@x.edu", "Chess Club", "Fri 3:30-5:00", "desc", None)
            .await;

        assert_eq!(outcome, DispatchOutcome::Queued { recipients: 1 });

        let jobs = queue.jobs().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].template, "signup_confirmation");
        assert_eq!(jobs[0].recipients, vec!["a@x.edu"]);
        assert_eq!(jobs[0].cc, None);
        assert_eq!(jobs[0].subject, "Confirmed: Chess Club Registration");
        assert_eq!(jobs[0].context["schedule"], "Fri 3:30-5:00");
    }

    #[tokio::test]
    async fn test_signup_confirmation_skipped_by_preferences() {
        let (dispatcher, store, queue) = fixture();

        let mut prefs = NotificationPreferences::default_for("quiet@x.edu");
        prefs.signup_confirmation = false;
        store.put(prefs).await;

        let outcome = dispatcher
            .dispatch_signup_confirmation("quiet@x.edu", "Chess Club", "Fri", "desc", None)
            .await;

        assert_eq!(
            outcome,
            DispatchOutcome::Skipped {
                reason: SKIP_PREFERENCES.to_string()
            }
        );
        assert!(queue.jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_signup_confirmation_includes_parent_cc() {
        let (dispatcher, store, queue) = fixture();

        let mut prefs = NotificationPreferences::default_for("kid@x.edu");
        prefs.parent_cc_enabled = true;
        prefs.parent_email = Some("parent@x.edu".to_string());
        store.put(prefs).await;

        dispatcher
            .dispatch_signup_confirmation("kid@x.edu", "Art Club", "Thu", "desc", Some("Kid"))
            .await;

        let jobs = queue.jobs().await;
        assert_eq!(jobs[0].cc.as_deref(), Some("parent@x.edu"));
        assert_eq!(jobs[0].context["student_name"], "Kid");
    }

    #[tokio::test]
    async fn test_unregister_confirmation() {
        let (dispatcher, _store, queue) = fixture();

        let outcome = dispatcher
            .dispatch_unregister_confirmation("a@x.edu", "Chess Club", "Fri", None)
            .await;

        assert!(outcome.is_queued());
        let jobs = queue.jobs().await;
        assert_eq!(jobs[0].template, "unregister_confirmation");
        assert_eq!(jobs[0].subject, "Unregistration Confirmed: Chess Club");
        assert!(jobs[0].context.get("description").is_none());
    }

    #[tokio::test]
    async fn test_activity_change_filters_recipients() {
        let (dispatcher, store, queue) = fixture();

        let mut opted_out = NotificationPreferences::default_for("d@x.edu");
        opted_out.activity_changes = false;
        store.put(opted_out).await;

        let recipients = vec!["c@x.edu".to_string(), "d@x.edu".to_string()];
        let outcome = dispatcher
            .dispatch_activity_change(&recipients, "Chess Club", "Moved rooms", None)
            .await;

        assert_eq!(outcome, DispatchOutcome::Queued { recipients: 1 });

        let jobs = queue.jobs().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].recipients, vec!["c@x.edu"]);
    }

    #[tokio::test]
    async fn test_activity_change_all_filtered_is_skipped() {
        let (dispatcher, store, queue) = fixture();

        let mut opted_out = NotificationPreferences::default_for("d@x.edu");
        opted_out.activity_changes = false;
        store.put(opted_out).await;

        let outcome = dispatcher
            .dispatch_activity_change(
                &["d@x.edu".to_string()],
                "Chess Club",
                "Moved rooms",
                Some("Mondays"),
            )
            .await;

        assert_eq!(
            outcome,
            DispatchOutcome::Skipped {
                reason: SKIP_NO_RECIPIENTS.to_string()
            }
        );
        assert!(queue.jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_reminder_gated_by_preferences() {
        let (dispatcher, store, queue) = fixture();

        let mut prefs = NotificationPreferences::default_for("b@x.edu");
        prefs.reminders = false;
        store.put(prefs).await;

        let outcome = dispatcher
            .dispatch_reminder("b@x.edu", "Chess Club", "Fri", "Fri 3:30", None)
            .await;

        assert_eq!(
            outcome,
            DispatchOutcome::Skipped {
                reason: SKIP_PREFERENCES.to_string()
            }
        );
        assert!(queue.jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_new_activity_announcement_refilters() {
        let (dispatcher, store, queue) = fixture();

        let mut digest_only = NotificationPreferences::default_for("digest@x.edu");
        digest_only.digest_only = true;
        store.put(digest_only).await;

        let recipients = vec!["keen@x.edu".to_string(), "digest@x.edu".to_string()];
        let outcome = dispatcher
            .dispatch_new_activity_announcement(&recipients, "Robotics", "Tue", "Build robots", 16)
            .await;

        assert_eq!(outcome, DispatchOutcome::Queued { recipients: 1 });

        let jobs = queue.jobs().await;
        assert_eq!(jobs[0].recipients, vec!["keen@x.edu"]);
        assert_eq!(jobs[0].context["max_participants"], 16);
        assert_eq!(jobs[0].context["portal_url"], "http://localhost:8000");
    }

    #[tokio::test]
    async fn test_batch_rejects_empty_recipients() {
        let (dispatcher, _store, queue) = fixture();

        let err = dispatcher
            .dispatch_batch(&[], "Subject", "reminder", json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, NotificationError::InvalidInput(_)));
        assert!(queue.jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_batch_submits_one_job_per_recipient() {
        let (dispatcher, store, queue) = fixture();

        // Batch sends bypass preference gating entirely
        let mut opted_out = NotificationPreferences::default_for("out@x.edu");
        opted_out.enabled = false;
        store.put(opted_out).await;

        let recipients = vec!["a@x.edu".to_string(), "out@x.edu".to_string()];
        let summary = dispatcher
            .dispatch_batch(
                &recipients,
                "Schedule change",
                "activity_change",
                json!({"activity_name": "Chess Club", "change_description": "Moved"}),
            )
            .await
            .unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.queued, 2);
        assert_eq!(summary.failed, 0);

        let jobs = queue.jobs().await;
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.recipients.len() == 1));
        assert!(jobs.iter().all(|j| j.category.is_none()));
    }

    #[tokio::test]
    async fn test_channel_failure_becomes_outcome_not_error() {
        let store = Arc::new(InMemoryPreferenceStore::new());
        let dispatcher = NotificationDispatcher::new(store, Arc::new(RejectingQueue));

        let outcome = dispatcher
            .dispatch_signup_confirmation("a@x.edu", "Chess Club", "Fri", "desc", None)
            .await;

        match outcome {
            DispatchOutcome::Failed { reason } => {
                assert!(reason.contains("broker unreachable"));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_channel_failure_in_batch_counts_as_failed() {
        let store = Arc::new(InMemoryPreferenceStore::new());
        let dispatcher = NotificationDispatcher::new(store, Arc::new(RejectingQueue));

        let summary = dispatcher
            .dispatch_batch(
                &["a@x.edu".to_string(), "b@x.edu".to_string()],
                "Subject",
                "reminder",
                json!({}),
            )
            .await
            .unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.queued, 0);
        assert_eq!(summary.failed, 2);
    }

    #[tokio::test]
    async fn test_queued_jobs_have_fresh_ids() {
        let (dispatcher, _store, queue) = fixture();

        dispatcher
            .dispatch_signup_confirmation("a@x.edu", "Chess Club", "Fri", "desc", None)
            .await;
        dispatcher
            .dispatch_signup_confirmation("a@x.edu", "Art Club", "Thu", "desc", None)
            .await;

        let jobs = queue.jobs().await;
        assert_ne!(jobs[0].job_id(), jobs[1].job_id());
    }
}
