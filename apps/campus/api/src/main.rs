//! Campus Activities API
//!
//! HTTP API for viewing and signing up for extracurricular activities,
//! with preference-gated email notifications delivered asynchronously.

use axum_helpers::{create_app, health_router, with_middleware};
use core_config::app_info;
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_activities::ActivityStore;
use domain_notifications::{
    DeliveryProcessor, EmailJob, EmailStream, InMemoryPreferenceStore, MailProvider,
    NotificationDispatcher, PreferenceStore, SmtpMailer, TemplateEngine,
};
use redis::aio::ConnectionManager;
use std::sync::Arc;
use stream_worker::{JobQueue, MemoryQueue, MemoryWorker, RedisQueue, WorkerConfig};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

mod api;
mod config;
mod error;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Install color-eyre first for colored error output
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    let activities = Arc::new(ActivityStore::seeded());
    let prefs: Arc<dyn PreferenceStore> = Arc::new(InMemoryPreferenceStore::new());

    // Shutdown signal shared with the optional in-process delivery worker
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Channel selection: Redis Streams when a broker is configured (the
    // email-worker binary consumes them), in-process channel otherwise.
    let (queue, local_worker): (Arc<dyn JobQueue<EmailJob>>, Option<JoinHandle<()>>) =
        match &config.redis_url {
            Some(url) => {
                info!("Connecting to Redis at {}", url);
                let client = redis::Client::open(url.as_str())?;
                let manager = ConnectionManager::new(client).await?;
                (
                    Arc::new(RedisQueue::from_stream_def::<EmailStream>(manager)),
                    None,
                )
            }
            None => {
                info!("REDIS_URL not set, running delivery worker in-process");
                let (queue, rx) = MemoryQueue::<EmailJob>::bounded(1024);

                let mailer = SmtpMailer::new(config.mail.clone())?;
                if !mailer.is_configured() {
                    info!("SMTP credentials not set; emails will be logged, not sent");
                }
                let processor = DeliveryProcessor::new(mailer, TemplateEngine::new()?);
                let worker = MemoryWorker::new(
                    rx,
                    processor,
                    WorkerConfig::from_stream_def::<EmailStream>(),
                );

                (Arc::new(queue), Some(tokio::spawn(worker.run(shutdown_rx))))
            }
        };

    let dispatcher = NotificationDispatcher::new(prefs.clone(), queue);

    let state = AppState {
        activities,
        prefs,
        dispatcher,
        mail_configured: config.mail.is_configured(),
    };

    let app = with_middleware(api::routes(&state)).merge(health_router(app_info!()));

    create_app(app, &config.server).await?;

    // Server has drained; stop the in-process worker too
    let _ = shutdown_tx.send(true);
    if let Some(worker) = local_worker {
        worker.await.ok();
    }

    info!("Campus API shutdown complete");
    Ok(())
}
