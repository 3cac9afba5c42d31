//! Scheduled removal of stale inactive push tokens

use std::sync::Arc;

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

use crate::manager::NotificationManager;

/// Start a scheduler running `cleanup_inactive_tokens(retention_days)` on
/// `schedule`. The returned scheduler must be kept alive.
pub async fn start_cleanup_job(
    manager: Arc<NotificationManager>,
    schedule: &str,
    retention_days: u32,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(schedule, move |_, _| {
        let manager = manager.clone();
        Box::pin(async move {
            let deleted = manager.cleanup_inactive_tokens(retention_days).await;
            info!(deleted, retention_days, "Token cleanup job executed");
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    info!(schedule, retention_days, "Token cleanup job scheduled");
    Ok(scheduler)
}
