// service/background_jobs.rs
use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, Duration};

use crate::AppState;

/// Archives stale resolved tickets and purges old archives. The first tick
/// fires immediately, so a sweep also runs at startup.
pub async fn start_archival_job(app_state: Arc<AppState>) {
    let period = Duration::from_secs(app_state.env.archive_interval_hours.max(1) * 3600);
    let mut interval = interval(period);

    loop {
        interval.tick().await;

        tracing::info!("Running archival job at {}", Utc::now());

        match app_state.archive_service.run(Utc::now()).await {
            Ok((archived, purged)) => tracing::info!(
                "Archival job completed: {} archived, {} purged",
                archived,
                purged
            ),
            Err(e) => tracing::error!("Archival job failed: {}", e),
        }
    }
}
