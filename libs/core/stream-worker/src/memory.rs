//! In-process channel backend.
//!
//! A bounded tokio mpsc channel plays the role of the broker: `MemoryQueue`
//! is the producer half, `MemoryWorker` drains the receiver half and runs a
//! `StreamProcessor` with bounded concurrency. Used in deployments without
//! an external broker; the producer-facing API is the same `JobQueue` trait
//! the Redis backend implements.

use crate::config::WorkerConfig;
use crate::error::StreamError;
use crate::job::{JobQueue, StreamJob, StreamProcessor};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Producer half of the in-process channel.
pub struct MemoryQueue<J> {
    tx: mpsc::Sender<J>,
}

impl<J: StreamJob> MemoryQueue<J> {
    /// Create a bounded channel. The receiver goes to a `MemoryWorker`.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<J>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl<J> Clone for MemoryQueue<J> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

#[async_trait]
impl<J: StreamJob + 'static> JobQueue<J> for MemoryQueue<J> {
    async fn submit(&self, job: &J) -> Result<(), StreamError> {
        self.tx.try_send(job.clone()).map_err(|e| match e {
            TrySendError::Full(_) => StreamError::Rejected("channel full".to_string()),
            TrySendError::Closed(_) => StreamError::Rejected("channel closed".to_string()),
        })?;

        debug!(job_id = %job.job_id(), "Enqueued job (in-process)");
        Ok(())
    }
}

/// Consumer half of the in-process channel.
///
/// Runs jobs through the processor with at most
/// `config.max_concurrent_jobs` in flight. Transient and rate-limited
/// failures are retried in place with exponential backoff; permanent
/// failures and exhausted retry budgets are logged and dropped (there is no
/// DLQ without a broker).
pub struct MemoryWorker<J, P>
where
    J: StreamJob,
    P: StreamProcessor<J>,
{
    rx: mpsc::Receiver<J>,
    processor: Arc<P>,
    config: WorkerConfig,
}

impl<J, P> MemoryWorker<J, P>
where
    J: StreamJob + 'static,
    P: StreamProcessor<J> + 'static,
{
    pub fn new(rx: mpsc::Receiver<J>, processor: P, config: WorkerConfig) -> Self {
        Self {
            rx,
            processor: Arc::new(processor),
            config,
        }
    }

    /// Run the worker loop until the channel closes or shutdown is signaled.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            processor = %self.processor.name(),
            max_concurrent_jobs = %self.config.max_concurrent_jobs,
            "Starting in-process worker"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_jobs));
        let mut join_set: JoinSet<()> = JoinSet::new();

        loop {
            if *shutdown.borrow() {
                info!("Received shutdown signal, stopping worker");
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Received shutdown signal, stopping worker");
                        break;
                    }
                }
                maybe_job = self.rx.recv() => {
                    let Some(job) = maybe_job else {
                        info!("Channel closed, stopping worker");
                        break;
                    };

                    let semaphore = Arc::clone(&semaphore);
                    let processor = Arc::clone(&self.processor);
                    let max_retries = self.config.max_retries;

                    join_set.spawn(async move {
                        let _permit = semaphore
                            .acquire_owned()
                            .await
                            .expect("Semaphore closed");
                        Self::process_with_retry(&processor, job, max_retries).await;
                    });
                }
            }

            // Reap finished tasks so the set does not grow unbounded
            while join_set.try_join_next().is_some() {}
        }

        // Let in-flight jobs finish before returning
        while join_set.join_next().await.is_some() {}
        info!("In-process worker stopped");
    }

    /// Process a job, retrying in place on retryable failures.
    async fn process_with_retry(processor: &Arc<P>, mut job: J, worker_max_retries: u32) {
        loop {
            match processor.process(&job).await {
                Ok(()) => {
                    debug!(job_id = %job.job_id(), "Job processed");
                    return;
                }
                Err(e) => {
                    let category = e.category();
                    let max_retries = category.max_retries().max(worker_max_retries);

                    if !category.should_retry() {
                        error!(
                            job_id = %job.job_id(),
                            error = %e,
                            "Permanent error, dropping job"
                        );
                        return;
                    }

                    if job.exceeded_max_retries(max_retries) {
                        error!(
                            job_id = %job.job_id(),
                            max_retries = %max_retries,
                            error = %e,
                            "Job exceeded max retries, dropping"
                        );
                        return;
                    }

                    let delay_ms = category.backoff_delay_ms(job.retry_count());
                    warn!(
                        job_id = %job.job_id(),
                        retry_attempt = %(job.retry_count() + 1),
                        delay_ms = %delay_ms,
                        error = %e,
                        "Job failed, retrying with backoff"
                    );

                    tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                    job = job.with_retry();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct TestJob {
        id: String,
        retry_count: u32,
    }

    impl TestJob {
        fn new(id: &str) -> Self {
            Self {
                id: id.to_string(),
                retry_count: 0,
            }
        }
    }

    impl StreamJob for TestJob {
        fn job_id(&self) -> String {
            self.id.clone()
        }

        fn retry_count(&self) -> u32 {
            self.retry_count
        }

        fn with_retry(&self) -> Self {
            Self {
                retry_count: self.retry_count + 1,
                ..self.clone()
            }
        }
    }

    /// Processor that counts attempts and fails the first `fail_times`.
    struct CountingProcessor {
        attempts: Arc<AtomicU32>,
        fail_times: u32,
        permanent: bool,
    }

    #[async_trait]
    impl StreamProcessor<TestJob> for CountingProcessor {
        async fn process(&self, _job: &TestJob) -> Result<(), StreamError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.fail_times {
                if self.permanent {
                    return Err(StreamError::permanent("boom"));
                }
                return Err(StreamError::transient("boom"));
            }
            Ok(())
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    async fn wait_for(attempts: &Arc<AtomicU32>, expected: u32) {
        for _ in 0..200 {
            if attempts.load(Ordering::SeqCst) >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {} attempts, saw {}",
            expected,
            attempts.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn test_submit_and_process() {
        let attempts = Arc::new(AtomicU32::new(0));
        let processor = CountingProcessor {
            attempts: Arc::clone(&attempts),
            fail_times: 0,
            permanent: false,
        };

        let (queue, rx) = MemoryQueue::<TestJob>::bounded(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = MemoryWorker::new(rx, processor, WorkerConfig::default());
        let handle = tokio::spawn(worker.run(shutdown_rx));

        for i in 0..3 {
            queue.submit(&TestJob::new(&format!("job-{}", i))).await.unwrap();
        }

        wait_for(&attempts, 3).await;

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried() {
        let attempts = Arc::new(AtomicU32::new(0));
        let processor = CountingProcessor {
            attempts: Arc::clone(&attempts),
            fail_times: 1,
            permanent: false,
        };

        let (queue, rx) = MemoryQueue::<TestJob>::bounded(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = MemoryWorker::new(rx, processor, WorkerConfig::default());
        let handle = tokio::spawn(worker.run(shutdown_rx));

        queue.submit(&TestJob::new("retry-me")).await.unwrap();

        wait_for(&attempts, 2).await;

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let attempts = Arc::new(AtomicU32::new(0));
        let processor = CountingProcessor {
            attempts: Arc::clone(&attempts),
            fail_times: u32::MAX,
            permanent: true,
        };

        let (queue, rx) = MemoryQueue::<TestJob>::bounded(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = MemoryWorker::new(rx, processor, WorkerConfig::default());
        let handle = tokio::spawn(worker.run(shutdown_rx));

        queue.submit(&TestJob::new("doomed")).await.unwrap();

        wait_for(&attempts, 1).await;
        // Give the worker a beat to (incorrectly) retry if it were going to
        tokio::time::sleep(Duration::from_millis(50)).await;

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_full_channel_rejects() {
        let (queue, _rx) = MemoryQueue::<TestJob>::bounded(1);

        queue.submit(&TestJob::new("first")).await.unwrap();
        let err = queue.submit(&TestJob::new("second")).await.unwrap_err();

        assert!(matches!(err, StreamError::Rejected(_)));
        assert!(err.to_string().contains("full"));
    }

    #[tokio::test]
    async fn test_closed_channel_rejects() {
        let (queue, rx) = MemoryQueue::<TestJob>::bounded(1);
        drop(rx);

        let err = queue.submit(&TestJob::new("orphan")).await.unwrap_err();
        assert!(matches!(err, StreamError::Rejected(_)));
        assert!(err.to_string().contains("closed"));
    }
}
