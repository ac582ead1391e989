//! Core traits: job payloads, processors, queues, and stream definitions.

use crate::error::StreamError;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// Trait for stream job payloads.
///
/// Domain models that represent jobs in a stream implement this trait so
/// the worker can track and retry them.
pub trait StreamJob: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the job ID for logging and tracking.
    fn job_id(&self) -> String;

    /// Returns the current retry count.
    fn retry_count(&self) -> u32;

    /// Creates a new job with an incremented retry count.
    fn with_retry(&self) -> Self;

    /// Maximum retries allowed before giving up (or moving to DLQ).
    /// Default: 3 retries.
    fn max_retries(&self) -> u32 {
        3
    }

    /// Check if the job has exceeded the given retry budget.
    fn exceeded_max_retries(&self, max_retries: u32) -> bool {
        self.retry_count() >= max_retries
    }
}

/// Trait for job processors.
///
/// Domain handlers implement this trait to process jobs from the channel.
/// Return `Ok(())` for success; failed jobs are retried or dropped/DLQ'd
/// based on the error category.
#[async_trait]
pub trait StreamProcessor<J: StreamJob>: Send + Sync {
    /// Process a single job.
    async fn process(&self, job: &J) -> Result<(), StreamError>;

    /// Get the processor name for logging.
    fn name(&self) -> &'static str;

    /// Health check for the processor.
    ///
    /// Override to check external services. Default: always healthy.
    async fn health_check(&self) -> Result<bool, StreamError> {
        Ok(true)
    }
}

/// Asynchronous submission channel for jobs.
///
/// Producers (e.g. a notification dispatcher) depend only on this trait,
/// never on a concrete backend. `submit` returns an error when the channel
/// rejects the job; it must not panic.
#[async_trait]
pub trait JobQueue<J: StreamJob>: Send + Sync {
    /// Submit a job for asynchronous processing.
    async fn submit(&self, job: &J) -> Result<(), StreamError>;
}

/// Stream definition trait.
///
/// Each domain implements this to pin its stream configuration, keeping
/// producer and worker naming consistent.
///
/// # Example
///
/// ```rust,ignore
/// pub struct EmailStream;
///
/// impl StreamDef for EmailStream {
///     const STREAM_NAME: &'static str = "email:jobs";
///     const CONSUMER_GROUP: &'static str = "email_workers";
///     const DLQ_STREAM: &'static str = "email:dlq";
/// }
/// ```
pub trait StreamDef: Send + Sync {
    /// The stream name (e.g., "email:jobs").
    const STREAM_NAME: &'static str;

    /// The consumer group name for this stream.
    const CONSUMER_GROUP: &'static str;

    /// The dead letter queue stream name for failed jobs.
    const DLQ_STREAM: &'static str;

    /// Maximum stream length before auto-trim (MAXLEN).
    /// Default: 100,000 entries.
    const MAX_LENGTH: i64 = 100_000;

    fn stream_name() -> &'static str {
        Self::STREAM_NAME
    }

    fn consumer_group() -> &'static str {
        Self::CONSUMER_GROUP
    }

    fn dlq_stream() -> &'static str {
        Self::DLQ_STREAM
    }
}
