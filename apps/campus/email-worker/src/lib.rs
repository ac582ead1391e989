//! Email delivery worker.
//!
//! Consumes email jobs from the Redis stream and delivers them over SMTP,
//! alongside the scheduled digest/reminder triggers and a small health
//! endpoint for probes.

mod scheduler;

use axum_helpers::{create_app, health_router, shutdown_signal};
use core_config::server::ServerConfig;
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::{app_info, env_or_default, Environment};
use domain_notifications::{
    DeliveryProcessor, EmailJob, EmailStream, MailProvider, SmtpMailer, TemplateEngine,
};
use redis::aio::ConnectionManager;
use stream_worker::{RedisWorker, WorkerConfig};
use tokio::sync::watch;
use tracing::info;

pub async fn run() -> eyre::Result<()> {
    install_color_eyre();

    let environment = Environment::from_env();
    init_tracing(&environment);

    let redis_url = env_or_default("REDIS_URL", "redis://localhost:6379");
    info!("Connecting to Redis at {}", redis_url);
    let client = redis::Client::open(redis_url.as_str())?;
    let redis = ConnectionManager::new(client).await?;

    let mailer = SmtpMailer::from_env()?;
    if !mailer.is_configured() {
        info!("SMTP credentials not set; deliveries will be logged and dropped");
    }

    let processor = DeliveryProcessor::new(mailer, TemplateEngine::new()?);
    let worker: RedisWorker<EmailJob, _> = RedisWorker::new(
        redis,
        processor,
        WorkerConfig::from_stream_def::<EmailStream>(),
    );

    let mut cron = scheduler::start().await?;

    // Health endpoint for liveness probes
    let health_port: u16 = env_or_default("WORKER_PORT", "8081").parse().unwrap_or(8081);
    let health_config = ServerConfig::new("0.0.0.0".to_string(), health_port);
    tokio::spawn(async move {
        if let Err(e) = create_app(health_router(app_info!()), &health_config).await {
            tracing::error!("Health server error: {:?}", e);
        }
    });

    // Translate process signals into the worker's shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    worker.run(shutdown_rx).await?;

    cron.shutdown()
        .await
        .map_err(|e| eyre::eyre!("Scheduler shutdown error: {}", e))?;

    info!("Email worker shutdown complete");
    Ok(())
}
