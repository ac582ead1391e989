use core_config::mail::MailConfig;
use core_config::server::ServerConfig;
use core_config::{ConfigError, Environment, FromEnv};

/// API application configuration, loaded once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: Environment,
    pub server: ServerConfig,
    pub mail: MailConfig,
    /// When set, notification jobs go to a Redis Stream consumed by the
    /// separate email-worker binary. Otherwise delivery runs in-process.
    pub redis_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            environment: Environment::from_env(),
            server: ServerConfig::from_env()?,
            mail: MailConfig::from_env()?,
            redis_url: std::env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_without_redis() {
        temp_env::with_vars(
            [("REDIS_URL", None::<&str>), ("PORT", None), ("SMTP_PORT", None)],
            || {
                let config = Config::from_env().unwrap();
                assert!(config.redis_url.is_none());
                assert_eq!(config.server.port, 8000);
            },
        );
    }

    #[test]
    fn test_config_with_redis() {
        temp_env::with_var("REDIS_URL", Some("redis://localhost:6379"), || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.redis_url.as_deref(), Some("redis://localhost:6379"));
        });
    }

    #[test]
    fn test_empty_redis_url_treated_as_unset() {
        temp_env::with_var("REDIS_URL", Some(""), || {
            let config = Config::from_env().unwrap();
            assert!(config.redis_url.is_none());
        });
    }
}
