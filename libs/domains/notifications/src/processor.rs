//! Delivery processor: consumes email jobs from the channel, renders
//! templates, and sends through the configured mail provider.
//!
//! Every path out of `deliver` is a typed `DeliveryOutcome`. Nothing here
//! raises back toward the request that triggered the job; that request has
//! already returned its own response.

use crate::job::EmailJob;
use crate::providers::{MailProvider, OutboundEmail};
use crate::templates::TemplateEngine;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use stream_worker::{ErrorCategory, StreamError, StreamProcessor};
use tracing::{debug, error, info};

/// Failure reason reported when the transport has no credentials.
pub const NOT_CONFIGURED: &str = "not configured";

const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-message delivery result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent { message_id: String },
    Skipped { reason: String },
    Failed { reason: String },
}

/// Renders and sends email jobs via a `MailProvider`.
pub struct DeliveryProcessor<P: MailProvider> {
    provider: Arc<P>,
    templates: Arc<TemplateEngine>,
    send_timeout: Duration,
}

impl<P: MailProvider + 'static> DeliveryProcessor<P> {
    pub fn new(provider: P, templates: TemplateEngine) -> Self {
        Self {
            provider: Arc::new(provider),
            templates: Arc::new(templates),
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_arcs(provider: Arc<P>, templates: Arc<TemplateEngine>) -> Self {
        Self {
            provider,
            templates,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Bound applied to each transport send.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Deliver a single job, reporting a typed outcome.
    ///
    /// An unconfigured transport is an expected condition (logged at info,
    /// no error); rendering and transport failures are caught and logged at
    /// error level with recipient and subject context.
    pub async fn deliver(&self, job: &EmailJob) -> DeliveryOutcome {
        if job.recipients.is_empty() {
            return DeliveryOutcome::Skipped {
                reason: "no eligible recipients".to_string(),
            };
        }

        if !self.provider.is_configured() {
            info!(
                recipients = ?job.recipients,
                subject = %job.subject,
                "Mail transport not configured. Would send to {} recipient(s)",
                job.recipients.len()
            );
            return DeliveryOutcome::Failed {
                reason: NOT_CONFIGURED.to_string(),
            };
        }

        let context = Self::render_context(job);
        let rendered = match self.templates.render(&job.template, &context) {
            Ok(rendered) => rendered,
            Err(e) => {
                error!(
                    recipients = ?job.recipients,
                    subject = %job.subject,
                    template = %job.template,
                    error = %e,
                    "Failed to render email template"
                );
                return DeliveryOutcome::Failed {
                    reason: format!("template error: {}", e),
                };
            }
        };

        let email = OutboundEmail {
            recipients: job.recipients.clone(),
            cc: job.cc.clone(),
            subject: job.subject.clone(),
            body_text: rendered.body_text,
            body_html: rendered.body_html,
        };

        match tokio::time::timeout(self.send_timeout, self.provider.send(&email)).await {
            Ok(Ok(result)) => {
                info!(
                    job_id = %job.id,
                    recipients = ?job.recipients,
                    subject = %job.subject,
                    message_id = %result.message_id,
                    "Email sent successfully"
                );
                DeliveryOutcome::Sent {
                    message_id: result.message_id,
                }
            }
            Ok(Err(e)) => {
                error!(
                    job_id = %job.id,
                    recipients = ?job.recipients,
                    subject = %job.subject,
                    error = %e,
                    "Failed to send email"
                );
                DeliveryOutcome::Failed {
                    reason: e.to_string(),
                }
            }
            Err(_) => {
                error!(
                    job_id = %job.id,
                    recipients = ?job.recipients,
                    subject = %job.subject,
                    timeout_secs = %self.send_timeout.as_secs(),
                    "Email send timed out"
                );
                DeliveryOutcome::Failed {
                    reason: "send timed out".to_string(),
                }
            }
        }
    }

    /// Job context plus the injected `subject` field.
    fn render_context(job: &EmailJob) -> serde_json::Value {
        let mut map = match &job.context {
            serde_json::Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        map.insert(
            "subject".to_string(),
            serde_json::Value::String(job.subject.clone()),
        );
        serde_json::Value::Object(map)
    }

    /// Classify a failure reason for the queue's retry machinery.
    fn classify(reason: &str) -> ErrorCategory {
        let lower = reason.to_lowercase();
        if lower.contains("rate limit") || lower.contains("429") {
            ErrorCategory::RateLimited
        } else if lower.contains("template") || lower.contains("invalid") || lower.contains("malformed")
        {
            ErrorCategory::Permanent
        } else {
            ErrorCategory::Transient
        }
    }
}

#[async_trait]
impl<P: MailProvider + 'static> StreamProcessor<EmailJob> for DeliveryProcessor<P> {
    async fn process(&self, job: &EmailJob) -> Result<(), StreamError> {
        debug!(
            job_id = %job.id,
            category = ?job.category,
            to = ?job.recipients,
            retry_count = %job.retry_count,
            "Processing email job"
        );

        match self.deliver(job).await {
            DeliveryOutcome::Sent { .. } | DeliveryOutcome::Skipped { .. } => Ok(()),
            // A transport without credentials stays that way; retrying
            // would only churn the queue.
            DeliveryOutcome::Failed { reason } if reason == NOT_CONFIGURED => Ok(()),
            DeliveryOutcome::Failed { reason } => match Self::classify(&reason) {
                ErrorCategory::RateLimited => Err(StreamError::rate_limited(reason)),
                ErrorCategory::Permanent => Err(StreamError::permanent(reason)),
                ErrorCategory::Transient => Err(StreamError::transient(reason)),
            },
        }
    }

    fn name(&self) -> &'static str {
        "delivery_processor"
    }

    async fn health_check(&self) -> Result<bool, StreamError> {
        self.provider
            .health_check()
            .await
            .map(|_| true)
            .map_err(|e| StreamError::transient(e.to_string()))
    }
}

impl<P: MailProvider> Clone for DeliveryProcessor<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            templates: Arc::clone(&self.templates),
            send_timeout: self.send_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::NotificationCategory;
    use crate::providers::{MockMailer, SendResult};
    use eyre::Result;
    use serde_json::json;

    fn signup_job() -> EmailJob {
        EmailJob::new(
            Some(NotificationCategory::SignupConfirmation),
            vec!["a@x.edu".to_string()],
            "Confirmed: Chess Club Registration",
            "signup_confirmation",
        )
        .with_cc(Some("p@x.edu".to_string()))
        .with_context(json!({
            "student_name": "Ada",
            "activity_name": "Chess Club",
            "schedule": "Fri 3:30-5:00",
            "description": "desc",
        }))
    }

    fn processor(mailer: MockMailer) -> DeliveryProcessor<MockMailer> {
        DeliveryProcessor::new(mailer, TemplateEngine::new().unwrap())
    }

    #[tokio::test]
    async fn test_deliver_sends_rendered_email() {
        let processor = processor(MockMailer::new());

        let outcome = processor.deliver(&signup_job()).await;
        assert!(matches!(outcome, DeliveryOutcome::Sent { .. }));

        let sent = processor.provider().sent_emails().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipients, vec!["a@x.edu"]);
        assert_eq!(sent[0].cc.as_deref(), Some("p@x.edu"));
        assert_eq!(sent[0].subject, "Confirmed: Chess Club Registration");
        assert!(sent[0].body_text.as_ref().unwrap().contains("Chess Club"));
        assert!(sent[0].body_html.as_ref().unwrap().contains("Chess Club"));
    }

    #[tokio::test]
    async fn test_unconfigured_transport_reports_failed_without_raising() {
        let processor = processor(MockMailer::unconfigured());

        let outcome = processor.deliver(&signup_job()).await;
        assert_eq!(
            outcome,
            DeliveryOutcome::Failed {
                reason: NOT_CONFIGURED.to_string()
            }
        );
        assert_eq!(processor.provider().sent_count().await, 0);

        // Not an error for the queue either; the job is consumed
        assert!(processor.process(&signup_job()).await.is_ok());
    }

    #[tokio::test]
    async fn test_transport_failure_is_caught_and_classified() {
        let processor = processor(MockMailer::failing("connection refused"));

        let outcome = processor.deliver(&signup_job()).await;
        match &outcome {
            DeliveryOutcome::Failed { reason } => assert!(reason.contains("connection refused")),
            other => panic!("expected Failed, got {:?}", other),
        }

        let err = processor.process(&signup_job()).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Transient);
    }

    #[tokio::test]
    async fn test_rate_limited_failure_classification() {
        let processor = processor(MockMailer::failing("rate limit exceeded (429)"));

        let err = processor.process(&signup_job()).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::RateLimited);
    }

    #[tokio::test]
    async fn test_unknown_template_is_permanent_failure() {
        let processor = processor(MockMailer::new());

        let job = EmailJob::new(None, vec!["a@x.edu".to_string()], "Subject", "no_such_template");

        let outcome = processor.deliver(&job).await;
        match &outcome {
            DeliveryOutcome::Failed { reason } => assert!(reason.contains("template error")),
            other => panic!("expected Failed, got {:?}", other),
        }

        let err = processor.process(&job).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Permanent);
    }

    #[tokio::test]
    async fn test_empty_recipients_skipped() {
        let processor = processor(MockMailer::new());

        let job = EmailJob::new(None, vec![], "Subject", "reminder");
        let outcome = processor.deliver(&job).await;

        assert!(matches!(outcome, DeliveryOutcome::Skipped { .. }));
        assert_eq!(processor.provider().sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_subject_injected_into_render_context() {
        let context = DeliveryProcessor::<MockMailer>::render_context(&signup_job());
        assert_eq!(context["subject"], "Confirmed: Chess Club Registration");
        assert_eq!(context["student_name"], "Ada");
    }

    /// Provider that never completes, for timeout coverage.
    struct StalledMailer;

    #[async_trait]
    impl MailProvider for StalledMailer {
        async fn send(&self, _email: &OutboundEmail) -> Result<SendResult> {
            std::future::pending().await
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_timeout_bounds_delivery() {
        let processor = DeliveryProcessor::new(StalledMailer, TemplateEngine::new().unwrap())
            .with_send_timeout(Duration::from_millis(100));

        let outcome = processor.deliver(&signup_job()).await;
        assert_eq!(
            outcome,
            DeliveryOutcome::Failed {
                reason: "send timed out".to_string()
            }
        );
    }
}
