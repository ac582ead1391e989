//! SMTP mail transport using lettre

use super::{MailProvider, OutboundEmail, SendResult};
use async_trait::async_trait;
use core_config::mail::MailConfig;
use core_config::FromEnv;
use eyre::{Result, WrapErr};
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

/// SMTP transport provider.
///
/// Built even when credentials are absent so the worker can start in any
/// environment; `is_configured` then reports false and no connection is
/// ever attempted.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: Arc<MailConfig>,
}

impl SmtpMailer {
    /// Create an SMTP mailer from explicit configuration.
    pub fn new(config: MailConfig) -> Result<Self> {
        let transport = if config.use_tls {
            let creds = Credentials::new(config.username.clone(), config.password.clone());
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .wrap_err("Failed to create SMTP relay")?
                .credentials(creds)
                .port(config.port)
                .build()
        } else if !config.username.is_empty() {
            let creds = Credentials::new(config.username.clone(), config.password.clone());
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .credentials(creds)
                .port(config.port)
                .build()
        } else {
            // No auth (for Mailpit/Mailhog)
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .port(config.port)
                .build()
        };

        Ok(Self {
            transport,
            config: Arc::new(config),
        })
    }

    /// Create a mailer from SMTP_* environment variables.
    pub fn from_env() -> Result<Self> {
        let config = MailConfig::from_env().wrap_err("Invalid SMTP configuration")?;
        Self::new(config)
    }

    fn build_message(&self, email: &OutboundEmail) -> Result<Message> {
        let from: Mailbox = format!("{} <{}>", self.config.from_name, self.config.from_email)
            .parse()
            .wrap_err("Invalid from address")?;

        let mut builder = Message::builder().from(from).subject(&email.subject);

        for to in &email.recipients {
            let to_mailbox: Mailbox = to.parse().wrap_err("Invalid to address")?;
            builder = builder.to(to_mailbox);
        }

        if let Some(cc) = &email.cc {
            let cc_mailbox: Mailbox = cc.parse().wrap_err("Invalid CC address")?;
            builder = builder.cc(cc_mailbox);
        }

        let message = match (&email.body_text, &email.body_html) {
            (Some(text), Some(html)) => builder
                .multipart(
                    MultiPart::alternative()
                        .singlepart(
                            SinglePart::builder()
                                .header(ContentType::TEXT_PLAIN)
                                .body(text.clone()),
                        )
                        .singlepart(
                            SinglePart::builder()
                                .header(ContentType::TEXT_HTML)
                                .body(html.clone()),
                        ),
                )
                .wrap_err("Failed to build multipart message")?,
            (Some(text), None) => builder
                .header(ContentType::TEXT_PLAIN)
                .body(text.clone())
                .wrap_err("Failed to build text message")?,
            (None, Some(html)) => builder
                .header(ContentType::TEXT_HTML)
                .body(html.clone())
                .wrap_err("Failed to build HTML message")?,
            (None, None) => {
                return Err(eyre::eyre!("Email must have either text or HTML body"));
            }
        };

        Ok(message)
    }
}

#[async_trait]
impl MailProvider for SmtpMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<SendResult> {
        let message = self.build_message(email)?;

        let response = self
            .transport
            .send(message)
            .await
            .wrap_err("Failed to send email via SMTP")?;

        let message_id = response
            .message()
            .next()
            .map(|s| s.to_string())
            .unwrap_or_default();

        tracing::info!(
            recipients = ?email.recipients,
            subject = %email.subject,
            "Email sent successfully"
        );

        Ok(SendResult { message_id })
    }

    async fn health_check(&self) -> Result<()> {
        self.transport
            .test_connection()
            .await
            .wrap_err("SMTP health check failed")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> MailConfig {
        MailConfig {
            host: "localhost".to_string(),
            port: 1025,
            username: "mailer@campus.edu".to_string(),
            password: "secret".to_string(),
            from_email: "noreply@campus.edu".to_string(),
            from_name: "Campus Activities".to_string(),
            use_tls: false,
        }
    }

    #[test]
    fn test_build_message_with_cc() {
        let mailer = SmtpMailer::new(test_config()).unwrap();

        let email = OutboundEmail {
            recipients: vec!["a@x.edu".to_string()],
            cc: Some("p@x.edu".to_string()),
            subject: "Confirmed: Chess Club Registration".to_string(),
            body_text: Some("You're in.".to_string()),
            body_html: Some("<p>You're in.</p>".to_string()),
        };

        let message = mailer.build_message(&email).unwrap();
        let headers = format!("{:?}", message.headers());
        assert!(headers.contains("a@x.edu"));
        assert!(headers.contains("p@x.edu"));
    }

    #[test]
    fn test_build_message_requires_body() {
        let mailer = SmtpMailer::new(test_config()).unwrap();

        let email = OutboundEmail {
            recipients: vec!["a@x.edu".to_string()],
            cc: None,
            subject: "Empty".to_string(),
            body_text: None,
            body_html: None,
        };

        assert!(mailer.build_message(&email).is_err());
    }

    #[test]
    fn test_unconfigured_without_credentials() {
        let mut config = test_config();
        config.username = String::new();
        config.password = String::new();

        let mailer = SmtpMailer::new(config).unwrap();
        assert!(!mailer.is_configured());
    }
}
