//! Scheduled notification triggers.
//!
//! The digest and reminder tasks only log their invocation: content
//! assembly would need per-student activity queries that the in-memory
//! roster does not expose to the worker.

use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

/// Start the cron scheduler with the weekly digest and daily reminder
/// triggers.
pub async fn start() -> eyre::Result<JobScheduler> {
    let scheduler = JobScheduler::new()
        .await
        .map_err(|e| eyre::eyre!("Failed to create scheduler: {}", e))?;

    // Weekly digest every Monday at 8:00 AM
    scheduler
        .add(
            Job::new_async("0 0 8 * * Mon", |_id, _lock| {
                Box::pin(async {
                    weekly_digest_trigger().await;
                })
            })
            .map_err(|e| eyre::eyre!("Invalid digest schedule: {}", e))?,
        )
        .await
        .map_err(|e| eyre::eyre!("Failed to schedule weekly digest: {}", e))?;

    // Daily reminders at 6:00 PM for next-day activities
    scheduler
        .add(
            Job::new_async("0 0 18 * * *", |_id, _lock| {
                Box::pin(async {
                    daily_reminder_trigger().await;
                })
            })
            .map_err(|e| eyre::eyre!("Invalid reminder schedule: {}", e))?,
        )
        .await
        .map_err(|e| eyre::eyre!("Failed to schedule daily reminders: {}", e))?;

    scheduler
        .start()
        .await
        .map_err(|e| eyre::eyre!("Failed to start scheduler: {}", e))?;

    info!("Scheduled triggers registered (weekly digest, daily reminders)");
    Ok(scheduler)
}

/// Weekly digest trigger.
pub async fn weekly_digest_trigger() {
    info!("Weekly digest task executed at: {}", Utc::now());
}

/// Daily reminder trigger.
pub async fn daily_reminder_trigger() {
    info!("Daily reminders task executed at: {}", Utc::now());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_triggers_complete() {
        weekly_digest_trigger().await;
        daily_reminder_trigger().await;
    }

    #[tokio::test]
    async fn test_scheduler_starts_and_stops() {
        let mut scheduler = start().await.unwrap();
        scheduler.shutdown().await.unwrap();
    }
}
