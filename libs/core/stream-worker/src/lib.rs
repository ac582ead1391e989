//! Stream Worker Framework
//!
//! A generic background-job framework with two interchangeable channel
//! backends behind one `JobQueue` trait:
//!
//! - **In-process**: `MemoryQueue` + `MemoryWorker`, a bounded tokio channel
//!   with a concurrent worker loop, for deployments without a broker.
//! - **Redis Streams**: `RedisQueue` + `RedisWorker`, consumer groups with
//!   retry and a dead letter queue, for production.
//!
//! Producers depend only on `JobQueue<J>`; workers only on
//! `StreamProcessor<J>`. Swapping backends is a wiring change.
//!
//! ## Example
//!
//! ```ignore
//! use stream_worker::{JobQueue, MemoryQueue, MemoryWorker, StreamJob, StreamProcessor};
//!
//! let (queue, rx) = MemoryQueue::<MyJob>::bounded(256);
//! let worker = MemoryWorker::new(rx, processor, WorkerConfig::default());
//! tokio::spawn(worker.run(shutdown_rx));
//!
//! queue.submit(&job).await?;
//! ```

mod config;
mod error;
mod job;
mod memory;
mod redis_backend;

// Re-export main types
pub use config::WorkerConfig;
pub use error::{ErrorCategory, StreamError};
pub use job::{JobQueue, StreamDef, StreamJob, StreamProcessor};
pub use memory::{MemoryQueue, MemoryWorker};
pub use redis_backend::{RedisQueue, RedisWorker};
