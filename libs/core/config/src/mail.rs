use crate::{env_or_default, ConfigError, FromEnv};

/// SMTP transport configuration.
///
/// Credentials are optional: when `SMTP_USERNAME` or `SMTP_PASSWORD` is
/// absent the transport reports itself as not configured and the delivery
/// worker skips real sends instead of failing.
#[derive(Clone, Debug)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    pub use_tls: bool,
}

impl MailConfig {
    /// Whether SMTP credentials are present.
    pub fn is_configured(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl FromEnv for MailConfig {
    /// Reads from environment variables:
    /// - SMTP_HOST (default: smtp.gmail.com)
    /// - SMTP_PORT (default: 587)
    /// - SMTP_USERNAME / SMTP_PASSWORD (optional; absence disables sending)
    /// - EMAIL_FROM_ADDRESS (default: noreply@campus.edu)
    /// - EMAIL_FROM_NAME (default: Campus Activities)
    /// - SMTP_USE_TLS (default: true)
    fn from_env() -> Result<Self, ConfigError> {
        let port = env_or_default("SMTP_PORT", "587")
            .parse()
            .map_err(|e| ConfigError::ParseError {
                key: "SMTP_PORT".to_string(),
                details: format!("{}", e),
            })?;

        Ok(Self {
            host: env_or_default("SMTP_HOST", "smtp.gmail.com"),
            port,
            username: env_or_default("SMTP_USERNAME", ""),
            password: env_or_default("SMTP_PASSWORD", ""),
            from_email: env_or_default("EMAIL_FROM_ADDRESS", "noreply@campus.edu"),
            from_name: env_or_default("EMAIL_FROM_NAME", "Campus Activities"),
            use_tls: env_or_default("SMTP_USE_TLS", "true")
                .eq_ignore_ascii_case("true"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mail_config_defaults() {
        temp_env::with_vars(
            [
                ("SMTP_HOST", None::<&str>),
                ("SMTP_PORT", None),
                ("SMTP_USERNAME", None),
                ("SMTP_PASSWORD", None),
            ],
            || {
                let config = MailConfig::from_env().unwrap();
                assert_eq!(config.host, "smtp.gmail.com");
                assert_eq!(config.port, 587);
                assert!(config.use_tls);
                assert!(!config.is_configured());
            },
        );
    }

    #[test]
    fn test_mail_config_with_credentials() {
        temp_env::with_vars(
            [
                ("SMTP_USERNAME", Some("mailer@campus.edu")),
                ("SMTP_PASSWORD", Some("secret")),
            ],
            || {
                let config = MailConfig::from_env().unwrap();
                assert!(config.is_configured());
            },
        );
    }

    #[test]
    fn test_mail_config_partial_credentials_not_configured() {
        temp_env::with_vars(
            [
                ("SMTP_USERNAME", Some("mailer@campus.edu")),
                ("SMTP_PASSWORD", None::<&str>),
            ],
            || {
                let config = MailConfig::from_env().unwrap();
                assert!(!config.is_configured());
            },
        );
    }

    #[test]
    fn test_mail_config_invalid_port() {
        temp_env::with_var("SMTP_PORT", Some("nope"), || {
            let result = MailConfig::from_env();
            assert!(result.is_err());
            assert!(result.unwrap_err().to_string().contains("SMTP_PORT"));
        });
    }
}
