//! Redis Streams channel backend.
//!
//! `RedisQueue` enqueues jobs with XADD (approximate MAXLEN trimming);
//! `RedisWorker` consumes them through a consumer group, acknowledging on
//! success, requeueing with an incremented retry count on retryable
//! failures, and moving exhausted or permanently-failed jobs to a dead
//! letter queue.

use crate::config::WorkerConfig;
use crate::error::StreamError;
use crate::job::{JobQueue, StreamDef, StreamJob, StreamProcessor};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Producer for a Redis stream.
pub struct RedisQueue {
    redis: Arc<ConnectionManager>,
    stream_name: String,
    max_length: i64,
}

impl RedisQueue {
    pub fn new(redis: ConnectionManager, stream_name: impl Into<String>) -> Self {
        Self {
            redis: Arc::new(redis),
            stream_name: stream_name.into(),
            max_length: 100_000,
        }
    }

    /// Create a producer from a `StreamDef`, keeping names consistent with
    /// the worker.
    pub fn from_stream_def<S: StreamDef>(redis: ConnectionManager) -> Self {
        Self {
            redis: Arc::new(redis),
            stream_name: S::STREAM_NAME.to_string(),
            max_length: S::MAX_LENGTH,
        }
    }

    /// Set the maximum stream length (MAXLEN ~).
    pub fn with_max_length(mut self, max_length: i64) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    /// Get the current stream length.
    pub async fn stream_length(&self) -> Result<i64, StreamError> {
        let mut conn = (*self.redis).clone();
        let len: i64 = conn.xlen(&self.stream_name).await?;
        Ok(len)
    }
}

impl Clone for RedisQueue {
    fn clone(&self) -> Self {
        Self {
            redis: self.redis.clone(),
            stream_name: self.stream_name.clone(),
            max_length: self.max_length,
        }
    }
}

#[async_trait]
impl<J: StreamJob + 'static> JobQueue<J> for RedisQueue {
    async fn submit(&self, job: &J) -> Result<(), StreamError> {
        let mut conn = (*self.redis).clone();
        let job_json = serde_json::to_string(job)?;

        // XADD with MAXLEN ~ for approximate trimming (more efficient)
        let stream_id: String = redis::cmd("XADD")
            .arg(&self.stream_name)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.max_length)
            .arg("*")
            .arg("job")
            .arg(&job_json)
            .query_async(&mut conn)
            .await?;

        debug!(
            stream = %self.stream_name,
            stream_id = %stream_id,
            job_id = %job.job_id(),
            "Enqueued job"
        );

        Ok(())
    }
}

/// Consumer-group worker over a Redis stream.
pub struct RedisWorker<J, P>
where
    J: StreamJob,
    P: StreamProcessor<J>,
{
    redis: ConnectionManager,
    processor: Arc<P>,
    config: WorkerConfig,
    _phantom: PhantomData<J>,
}

impl<J, P> RedisWorker<J, P>
where
    J: StreamJob + 'static,
    P: StreamProcessor<J> + 'static,
{
    pub fn new(redis: ConnectionManager, processor: P, config: WorkerConfig) -> Self {
        Self {
            redis,
            processor: Arc::new(processor),
            config,
            _phantom: PhantomData,
        }
    }

    /// Run the worker loop.
    ///
    /// Continuously reads jobs from the stream and processes them. Use the
    /// shutdown receiver to stop gracefully.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), StreamError> {
        info!(
            consumer_id = %self.config.consumer_id,
            stream = %self.config.stream_name,
            group = %self.config.consumer_group,
            processor = %self.processor.name(),
            "Starting stream worker"
        );

        self.ensure_consumer_group().await?;

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let mut consecutive_errors: u32 = 0;
        const MAX_BACKOFF_SECS: u64 = 30;

        loop {
            if *shutdown.borrow() {
                info!("Received shutdown signal, stopping worker");
                break;
            }

            match self.process_batch().await {
                Ok(_) => {
                    if consecutive_errors > 0 {
                        info!("Connection recovered after {} errors", consecutive_errors);
                        consecutive_errors = 0;
                    }
                }
                Err(e) => {
                    consecutive_errors += 1;

                    if e.is_nogroup_error() {
                        warn!("Consumer group missing, recreating...");
                        if let Err(create_err) = self.ensure_consumer_group().await {
                            error!(error = %create_err, "Failed to recreate consumer group");
                        }
                    } else if e.is_connection_error() {
                        let backoff_secs =
                            std::cmp::min(2u64.pow(consecutive_errors.min(5)), MAX_BACKOFF_SECS);
                        warn!(
                            error = %e,
                            consecutive_errors = %consecutive_errors,
                            backoff_secs = %backoff_secs,
                            "Redis connection error, backing off"
                        );
                        tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                    } else {
                        error!(error = %e, "Error processing batch");
                    }

                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Received shutdown signal, stopping worker");
                        break;
                    }
                }
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }

        info!("Stream worker stopped");
        Ok(())
    }

    /// Ensure the consumer group exists (XGROUP CREATE ... MKSTREAM).
    async fn ensure_consumer_group(&self) -> Result<(), StreamError> {
        let mut conn = self.redis.clone();

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => {
                info!(
                    stream = %self.config.stream_name,
                    group = %self.config.consumer_group,
                    "Created consumer group"
                );
                Ok(())
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists");
                Ok(())
            }
            Err(e) => Err(StreamError::Redis(e)),
        }
    }

    /// Process pending (not yet ACKed) and new messages.
    async fn process_batch(&self) -> Result<(), StreamError> {
        // "0" returns this consumer's pending entries, ">" returns new ones
        for start_id in ["0", ">"] {
            let messages = self.read_messages(start_id).await?;
            for (message_id, map) in messages {
                self.process_message(&message_id, &map).await;
            }
        }

        Ok(())
    }

    /// Read up to `batch_size` messages for this consumer.
    async fn read_messages(
        &self,
        start_id: &str,
    ) -> Result<Vec<(String, HashMap<String, redis::Value>)>, StreamError> {
        let mut conn = self.redis.clone();

        let opts = StreamReadOptions::default()
            .group(&self.config.consumer_group, &self.config.consumer_id)
            .count(self.config.batch_size);

        let reply: StreamReadReply = conn
            .xread_options(&[&self.config.stream_name], &[start_id], &opts)
            .await?;

        let mut messages = Vec::new();
        for stream_key in reply.keys {
            for entry in stream_key.ids {
                messages.push((entry.id, entry.map));
            }
        }

        Ok(messages)
    }

    /// Process a single message: parse, run the processor, ACK or handle
    /// the failure.
    async fn process_message(&self, message_id: &str, map: &HashMap<String, redis::Value>) {
        match Self::parse_job(map) {
            Ok(job) => {
                debug!(message_id = %message_id, job_id = %job.job_id(), "Processing job");

                match self.processor.process(&job).await {
                    Ok(()) => {
                        if let Err(e) = self.ack_message(message_id).await {
                            error!(message_id = %message_id, error = %e, "Failed to ACK message");
                        }
                    }
                    Err(e) => {
                        warn!(
                            message_id = %message_id,
                            job_id = %job.job_id(),
                            error = %e,
                            error_category = ?e.category(),
                            "Job processing failed"
                        );
                        if let Err(handler_err) =
                            self.handle_job_error(&job, message_id, e).await
                        {
                            error!(
                                message_id = %message_id,
                                error = %handler_err,
                                "Failed to handle job error"
                            );
                            // Still ACK to prevent an infinite redelivery loop
                            let _ = self.ack_message(message_id).await;
                        }
                    }
                }
            }
            Err(e) => {
                error!(message_id = %message_id, error = %e, "Failed to parse job, moving to DLQ");
                let _ = self.move_to_dlq_raw(message_id, map).await;
                let _ = self.ack_message(message_id).await;
            }
        }
    }

    /// Parse a job from the stream entry's "job" field.
    fn parse_job(map: &HashMap<String, redis::Value>) -> Result<J, StreamError> {
        let job_value = map
            .get("job")
            .ok_or_else(|| StreamError::Serialization("Missing 'job' field in message".to_string()))?;

        let job_str = match job_value {
            redis::Value::BulkString(bytes) => String::from_utf8_lossy(bytes).to_string(),
            redis::Value::SimpleString(s) => s.clone(),
            _ => {
                return Err(StreamError::Serialization(
                    "Invalid 'job' field type".to_string(),
                ))
            }
        };

        let job: J = serde_json::from_str(&job_str)?;
        Ok(job)
    }

    /// Decide between retry requeue and DLQ for a failed job.
    async fn handle_job_error(
        &self,
        job: &J,
        message_id: &str,
        error: StreamError,
    ) -> Result<(), StreamError> {
        let category = error.category();
        let max_retries = category.max_retries().max(self.config.max_retries);

        if !category.should_retry() || job.exceeded_max_retries(max_retries) {
            warn!(
                job_id = %job.job_id(),
                error_category = ?category,
                retry_count = %job.retry_count(),
                "Job not retryable, moving to DLQ"
            );

            if self.config.enable_dlq {
                self.move_to_dlq(job, &error.to_string()).await?;
            }
            self.ack_message(message_id).await?;
            return Ok(());
        }

        let retry_job = job.with_retry();
        self.requeue_job(&retry_job).await?;
        self.ack_message(message_id).await?;

        debug!(
            job_id = %job.job_id(),
            retry_attempt = %retry_job.retry_count(),
            "Re-queued job for retry"
        );

        Ok(())
    }

    async fn ack_message(&self, message_id: &str) -> Result<(), StreamError> {
        let mut conn = self.redis.clone();

        let _: () = conn
            .xack(
                &self.config.stream_name,
                &self.config.consumer_group,
                &[message_id],
            )
            .await?;

        Ok(())
    }

    async fn requeue_job(&self, job: &J) -> Result<(), StreamError> {
        let mut conn = self.redis.clone();
        let job_json = serde_json::to_string(job)?;

        let _: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("job")
            .arg(&job_json)
            .query_async(&mut conn)
            .await?;

        Ok(())
    }

    async fn move_to_dlq(&self, job: &J, error: &str) -> Result<(), StreamError> {
        let mut conn = self.redis.clone();

        let dlq_entry = serde_json::json!({
            "job": job,
            "error": error,
            "failed_at": chrono::Utc::now().to_rfc3339(),
        });

        let _: String = redis::cmd("XADD")
            .arg(&self.config.dlq_stream)
            .arg("*")
            .arg("data")
            .arg(dlq_entry.to_string())
            .query_async(&mut conn)
            .await?;

        warn!(job_id = %job.job_id(), "Moved job to DLQ");
        Ok(())
    }

    /// Move an unparseable raw message to the DLQ.
    async fn move_to_dlq_raw(
        &self,
        message_id: &str,
        map: &HashMap<String, redis::Value>,
    ) -> Result<(), StreamError> {
        let mut conn = self.redis.clone();

        let dlq_entry = serde_json::json!({
            "raw_message": format!("{:?}", map),
            "original_id": message_id,
            "error": "Failed to parse job",
            "failed_at": chrono::Utc::now().to_rfc3339(),
        });

        let _: String = redis::cmd("XADD")
            .arg(&self.config.dlq_stream)
            .arg("*")
            .arg("data")
            .arg(dlq_entry.to_string())
            .query_async(&mut conn)
            .await?;

        Ok(())
    }
}
