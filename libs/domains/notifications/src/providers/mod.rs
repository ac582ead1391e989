//! Mail transport providers

pub mod mock;
pub mod smtp;

pub use mock::MockMailer;
pub use smtp::SmtpMailer;

use async_trait::async_trait;
use eyre::Result;

/// A fully rendered email ready for transport.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    /// Recipient addresses (To).
    pub recipients: Vec<String>,
    /// Optional CC address.
    pub cc: Option<String>,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub body_text: Option<String>,
    /// HTML body.
    pub body_html: Option<String>,
}

/// Result of sending an email
#[derive(Debug)]
pub struct SendResult {
    /// Provider-specific message ID
    pub message_id: String,
}

/// Trait for mail transports
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// Send an email
    async fn send(&self, email: &OutboundEmail) -> Result<SendResult>;

    /// Check if the provider is healthy
    async fn health_check(&self) -> Result<()>;

    /// Get provider name
    fn name(&self) -> &'static str;

    /// Whether the transport has credentials and can actually deliver.
    ///
    /// An unconfigured transport is an expected condition, not an error;
    /// the delivery processor short-circuits instead of calling `send`.
    fn is_configured(&self) -> bool {
        true
    }
}
