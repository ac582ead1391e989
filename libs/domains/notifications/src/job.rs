//! Email job: the unit of work handed to the delivery channel.

use crate::preferences::NotificationCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stream_worker::{StreamDef, StreamJob};
use uuid::Uuid;

/// A queued notification: who gets it, which template, and with what
/// context. Created by the dispatcher, consumed and discarded by the
/// delivery processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailJob {
    /// Unique job identifier.
    pub id: Uuid,

    /// Category the dispatcher gated on. Administrative batch sends carry
    /// no category (they bypass preference gating).
    pub category: Option<NotificationCategory>,

    /// Recipient identities (To).
    pub recipients: Vec<String>,

    /// Optional CC identity (parent).
    pub cc: Option<String>,

    /// Email subject line.
    pub subject: String,

    /// Template name for rendering.
    pub template: String,

    /// Template context variables.
    #[serde(default)]
    pub context: serde_json::Value,

    /// Number of retry attempts so far.
    #[serde(default)]
    pub retry_count: u32,

    /// Job creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl EmailJob {
    pub fn new(
        category: Option<NotificationCategory>,
        recipients: Vec<String>,
        subject: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            category,
            recipients,
            cc: None,
            subject: subject.into(),
            template: template.into(),
            context: serde_json::Value::Null,
            retry_count: 0,
            created_at: Utc::now(),
        }
    }

    /// Set the CC identity.
    pub fn with_cc(mut self, cc: Option<String>) -> Self {
        self.cc = cc;
        self
    }

    /// Set the template context.
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}

impl StreamJob for EmailJob {
    fn job_id(&self) -> String {
        self.id.to_string()
    }

    fn retry_count(&self) -> u32 {
        self.retry_count
    }

    fn with_retry(&self) -> Self {
        Self {
            id: Uuid::new_v4(), // New ID for the retry
            retry_count: self.retry_count + 1,
            created_at: Utc::now(),
            ..self.clone()
        }
    }

    fn max_retries(&self) -> u32 {
        3
    }
}

/// Stream definition for email delivery jobs.
pub struct EmailStream;

impl StreamDef for EmailStream {
    const STREAM_NAME: &'static str = "email:jobs";
    const CONSUMER_GROUP: &'static str = "email_workers";
    const DLQ_STREAM: &'static str = "email:dlq";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_creation() {
        let job = EmailJob::new(
            Some(NotificationCategory::SignupConfirmation),
            vec!["a@x.edu".to_string()],
            "Confirmed: Chess Club Registration",
            "signup_confirmation",
        );

        assert_eq!(job.recipients, vec!["a@x.edu"]);
        assert_eq!(job.template, "signup_confirmation");
        assert_eq!(job.cc, None);
        assert_eq!(job.retry_count, 0);
    }

    #[test]
    fn test_with_retry_gets_new_id() {
        let job = EmailJob::new(None, vec!["a@x.edu".to_string()], "subject", "template");

        let retried = job.with_retry();
        assert_eq!(retried.retry_count(), 1);
        assert_ne!(retried.job_id(), job.job_id());
        assert_eq!(retried.recipients, job.recipients);
    }

    #[test]
    fn test_serialization_round_trip() {
        let job = EmailJob::new(
            Some(NotificationCategory::ActivityChanges),
            vec!["a@x.edu".to_string(), "b@x.edu".to_string()],
            "Important Update: Chess Club",
            "activity_change",
        )
        .with_context(serde_json::json!({"activity_name": "Chess Club"}));

        let json = serde_json::to_string(&job).unwrap();
        let parsed: EmailJob = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.id, job.id);
        assert_eq!(parsed.recipients, job.recipients);
        assert_eq!(parsed.category, Some(NotificationCategory::ActivityChanges));
        assert_eq!(parsed.context["activity_name"], "Chess Club");
    }

    #[test]
    fn test_stream_def() {
        assert_eq!(EmailStream::stream_name(), "email:jobs");
        assert_eq!(EmailStream::consumer_group(), "email_workers");
        assert_eq!(EmailStream::dlq_stream(), "email:dlq");
    }
}
