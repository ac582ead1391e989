//! Stream error types and error categorization
//!
//! Errors are categorized to determine retry behavior:
//! - **Transient**: Temporary failures, retry with exponential backoff
//! - **Permanent**: Unrecoverable errors, move to DLQ immediately
//! - **RateLimited**: Rate limit hit, longer backoff before retry

use thiserror::Error;

/// Category of error for determining retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Temporary failure - retry with exponential backoff (1s-30s, 3 retries)
    Transient,
    /// Unrecoverable error - move to DLQ immediately
    Permanent,
    /// Rate limit hit - longer backoff (5s-120s, 5 retries)
    RateLimited,
}

impl ErrorCategory {
    /// Get the maximum retries for this error category
    pub fn max_retries(&self) -> u32 {
        match self {
            ErrorCategory::Transient => 3,
            ErrorCategory::Permanent => 0,
            ErrorCategory::RateLimited => 5,
        }
    }

    /// Whether errors of this category should be retried at all
    pub fn should_retry(&self) -> bool {
        *self != ErrorCategory::Permanent
    }

    /// Base delay in milliseconds for this error category
    pub fn base_delay_ms(&self) -> u64 {
        match self {
            ErrorCategory::Transient => 1000,
            ErrorCategory::Permanent => 0,
            ErrorCategory::RateLimited => 5000,
        }
    }

    /// Maximum delay in milliseconds for this error category
    pub fn max_delay_ms(&self) -> u64 {
        match self {
            ErrorCategory::Transient => 30_000,
            ErrorCategory::Permanent => 0,
            ErrorCategory::RateLimited => 120_000,
        }
    }

    /// Calculate exponential backoff delay for the given retry count
    pub fn backoff_delay_ms(&self, retry_count: u32) -> u64 {
        if *self == ErrorCategory::Permanent {
            return 0;
        }

        let base = self.base_delay_ms();
        let max = self.max_delay_ms();
        let delay = base * 2u64.saturating_pow(retry_count);
        delay.min(max)
    }
}

/// Stream processing errors
#[derive(Error, Debug)]
pub enum StreamError {
    /// Redis connection or command error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Job processing failed
    #[error("Processing error: {message}")]
    Processing {
        message: String,
        category: ErrorCategory,
    },

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// The channel rejected a submission (full or closed)
    #[error("Submission rejected: {0}")]
    Rejected(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Shutdown requested
    #[error("Shutdown requested")]
    Shutdown,
}

impl StreamError {
    /// Create a transient processing error
    pub fn transient(message: impl Into<String>) -> Self {
        StreamError::Processing {
            message: message.into(),
            category: ErrorCategory::Transient,
        }
    }

    /// Create a permanent processing error
    pub fn permanent(message: impl Into<String>) -> Self {
        StreamError::Processing {
            message: message.into(),
            category: ErrorCategory::Permanent,
        }
    }

    /// Create a rate limited error
    pub fn rate_limited(message: impl Into<String>) -> Self {
        StreamError::RateLimited(message.into())
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            StreamError::Redis(_) => ErrorCategory::Transient,
            StreamError::Serialization(_) => ErrorCategory::Permanent,
            StreamError::Processing { category, .. } => *category,
            StreamError::RateLimited(_) => ErrorCategory::RateLimited,
            StreamError::Rejected(_) => ErrorCategory::Transient,
            StreamError::Config(_) => ErrorCategory::Permanent,
            StreamError::Internal(_) => ErrorCategory::Permanent,
            StreamError::Shutdown => ErrorCategory::Permanent,
        }
    }

    /// Check if this error should trigger a retry
    pub fn should_retry(&self, retry_count: u32) -> bool {
        let category = self.category();
        category.should_retry() && retry_count < category.max_retries()
    }

    /// Get the backoff delay for a retry
    pub fn backoff_delay_ms(&self, retry_count: u32) -> u64 {
        self.category().backoff_delay_ms(retry_count)
    }

    /// Whether the error looks like a broken broker connection
    pub fn is_connection_error(&self) -> bool {
        let lower = self.to_string().to_lowercase();
        lower.contains("connection")
            || lower.contains("disconnected")
            || lower.contains("broken pipe")
            || lower.contains("reset by peer")
            || lower.contains("refused")
            || lower.contains("timed out")
            || lower.contains("io error")
    }

    /// Whether the error indicates a missing consumer group
    pub fn is_nogroup_error(&self) -> bool {
        self.to_string().contains("NOGROUP")
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(err: serde_json::Error) -> Self {
        StreamError::Serialization(err.to_string())
    }
}
