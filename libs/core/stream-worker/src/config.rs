//! Worker configuration

use crate::job::StreamDef;
use uuid::Uuid;

/// Configuration shared by the channel backends and their workers.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Stream name
    pub stream_name: String,

    /// Consumer group name (Redis backend)
    pub consumer_group: String,

    /// Unique consumer ID (auto-generated if not provided)
    pub consumer_id: String,

    /// Dead letter queue stream name (Redis backend)
    pub dlq_stream: String,

    /// Maximum stream length before trimming (Redis backend)
    pub max_length: i64,

    /// Poll interval in milliseconds when no messages are available
    pub poll_interval_ms: u64,

    /// Batch size for reading messages
    pub batch_size: usize,

    /// Maximum concurrent jobs (in-process worker)
    pub max_concurrent_jobs: usize,

    /// Retry budget applied on top of per-job max_retries
    pub max_retries: u32,

    /// Move exhausted jobs to the DLQ instead of dropping them
    pub enable_dlq: bool,
}

impl WorkerConfig {
    /// Create a WorkerConfig from a StreamDef
    pub fn from_stream_def<S: StreamDef>() -> Self {
        Self {
            stream_name: S::STREAM_NAME.to_string(),
            consumer_group: S::CONSUMER_GROUP.to_string(),
            consumer_id: format!("worker-{}", Uuid::new_v4()),
            dlq_stream: S::DLQ_STREAM.to_string(),
            max_length: S::MAX_LENGTH,
            poll_interval_ms: 500,
            batch_size: 10,
            max_concurrent_jobs: 4,
            max_retries: 3,
            enable_dlq: true,
        }
    }

    /// Create a WorkerConfig with explicit names
    pub fn new(stream_name: impl Into<String>, consumer_group: impl Into<String>) -> Self {
        Self {
            stream_name: stream_name.into(),
            consumer_group: consumer_group.into(),
            consumer_id: format!("worker-{}", Uuid::new_v4()),
            dlq_stream: String::new(),
            max_length: 100_000,
            poll_interval_ms: 500,
            batch_size: 10,
            max_concurrent_jobs: 4,
            max_retries: 3,
            enable_dlq: false,
        }
    }

    /// Set the consumer ID
    pub fn with_consumer_id(mut self, id: impl Into<String>) -> Self {
        self.consumer_id = id.into();
        self
    }

    /// Set the DLQ stream name (enables the DLQ)
    pub fn with_dlq_stream(mut self, stream: impl Into<String>) -> Self {
        self.dlq_stream = stream.into();
        self.enable_dlq = true;
        self
    }

    /// Set the poll interval
    pub fn with_poll_interval_ms(mut self, interval: u64) -> Self {
        self.poll_interval_ms = interval;
        self
    }

    /// Set the batch size
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the maximum concurrent jobs
    pub fn with_max_concurrent_jobs(mut self, count: usize) -> Self {
        self.max_concurrent_jobs = count.max(1);
        self
    }

    /// Set the retry budget
    pub fn with_max_retries(mut self, count: u32) -> Self {
        self.max_retries = count;
        self
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::new("stream:jobs", "workers")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestStream;

    impl StreamDef for TestStream {
        const STREAM_NAME: &'static str = "test:stream";
        const CONSUMER_GROUP: &'static str = "test:group";
        const DLQ_STREAM: &'static str = "test:dlq";
    }

    #[test]
    fn test_from_stream_def() {
        let config = WorkerConfig::from_stream_def::<TestStream>();

        assert_eq!(config.stream_name, "test:stream");
        assert_eq!(config.consumer_group, "test:group");
        assert_eq!(config.dlq_stream, "test:dlq");
        assert!(config.enable_dlq);
        assert!(config.consumer_id.starts_with("worker-"));
    }

    #[test]
    fn test_builder_pattern() {
        let config = WorkerConfig::new("my:stream", "my:group")
            .with_consumer_id("worker-1")
            .with_dlq_stream("my:dlq")
            .with_batch_size(20)
            .with_max_concurrent_jobs(4)
            .with_max_retries(5);

        assert_eq!(config.stream_name, "my:stream");
        assert_eq!(config.consumer_id, "worker-1");
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.max_concurrent_jobs, 4);
        assert_eq!(config.max_retries, 5);
        assert!(config.enable_dlq);
    }
}
