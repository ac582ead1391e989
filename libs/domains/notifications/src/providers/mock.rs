//! Mock mail transport for testing

use super::{MailProvider, OutboundEmail, SendResult};
use async_trait::async_trait;
use eyre::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Mock transport that captures sent emails.
pub struct MockMailer {
    sent_emails: Arc<Mutex<Vec<OutboundEmail>>>,
    should_fail: bool,
    failure_message: Option<String>,
    configured: bool,
}

impl MockMailer {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self {
            sent_emails: Arc::new(Mutex::new(Vec::new())),
            should_fail: false,
            failure_message: None,
            configured: true,
        }
    }

    /// Create a mock transport that always fails.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            sent_emails: Arc::new(Mutex::new(Vec::new())),
            should_fail: true,
            failure_message: Some(message.into()),
            configured: true,
        }
    }

    /// Create a mock transport that reports itself unconfigured.
    pub fn unconfigured() -> Self {
        Self {
            sent_emails: Arc::new(Mutex::new(Vec::new())),
            should_fail: false,
            failure_message: None,
            configured: false,
        }
    }

    /// Get all sent emails.
    pub async fn sent_emails(&self) -> Vec<OutboundEmail> {
        self.sent_emails.lock().await.clone()
    }

    /// Get the count of sent emails.
    pub async fn sent_count(&self) -> usize {
        self.sent_emails.lock().await.len()
    }

    /// Clear all sent emails.
    pub async fn clear(&self) {
        self.sent_emails.lock().await.clear();
    }

    /// Check if an email was sent to a specific address.
    pub async fn was_sent_to(&self, address: &str) -> bool {
        self.sent_emails
            .lock()
            .await
            .iter()
            .any(|e| e.recipients.iter().any(|r| r == address))
    }
}

impl Default for MockMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MailProvider for MockMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<SendResult> {
        if self.should_fail {
            let message = self
                .failure_message
                .clone()
                .unwrap_or_else(|| "Mock failure".to_string());
            return Err(eyre::eyre!(message));
        }

        self.sent_emails.lock().await.push(email.clone());

        Ok(SendResult {
            message_id: format!("mock-{}", Uuid::new_v4()),
        })
    }

    async fn health_check(&self) -> Result<()> {
        if self.should_fail {
            return Err(eyre::eyre!("Mock health check failed"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_configured(&self) -> bool {
        self.configured
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_email(to: &str) -> OutboundEmail {
        OutboundEmail {
            recipients: vec![to.to_string()],
            cc: None,
            subject: "Test Subject".to_string(),
            body_text: Some("Test body".to_string()),
            body_html: None,
        }
    }

    #[tokio::test]
    async fn test_mock_captures_emails() {
        let mailer = MockMailer::new();

        mailer.send(&sample_email("a@x.edu")).await.unwrap();
        mailer.send(&sample_email("b@x.edu")).await.unwrap();

        assert_eq!(mailer.sent_count().await, 2);
        assert!(mailer.was_sent_to("a@x.edu").await);
        assert!(!mailer.was_sent_to("c@x.edu").await);
    }

    #[tokio::test]
    async fn test_mock_failing() {
        let mailer = MockMailer::failing("Simulated failure");

        let result = mailer.send(&sample_email("a@x.edu")).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Simulated failure"));
        assert!(mailer.health_check().await.is_err());
    }

    #[tokio::test]
    async fn test_mock_unconfigured() {
        let mailer = MockMailer::unconfigured();
        assert!(!mailer.is_configured());
    }

    #[tokio::test]
    async fn test_mock_clear() {
        let mailer = MockMailer::new();
        mailer.send(&sample_email("a@x.edu")).await.unwrap();
        assert_eq!(mailer.sent_count().await, 1);

        mailer.clear().await;
        assert_eq!(mailer.sent_count().await, 0);
    }
}
