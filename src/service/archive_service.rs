// service/archive_service.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::{
    config::Config,
    db::{ticketdb::TicketExt, HelpdeskStore},
    service::{error::ServiceError, file_store::FileStore},
};

#[derive(Debug, Clone)]
pub struct ArchiveService {
    db_client: Arc<dyn HelpdeskStore>,
    file_store: Arc<FileStore>,
    archive_after: Duration,
    purge_after: Duration,
}

impl ArchiveService {
    pub fn new(db_client: Arc<dyn HelpdeskStore>, file_store: Arc<FileStore>, config: &Config) -> Self {
        Self {
            db_client,
            file_store,
            archive_after: Duration::days(config.archive_after_days),
            purge_after: Duration::days(config.purge_after_days),
        }
    }

    /// Archives RESOLVED tickets untouched since `now - archive_after`.
    /// Rows are handled one by one; a failing row is logged and skipped.
    pub async fn archive_resolved(&self, now: DateTime<Utc>) -> Result<usize, ServiceError> {
        let cutoff = now - self.archive_after;
        let candidates = self.db_client.get_archivable_ticket_ids(cutoff).await?;

        let mut archived = 0;
        for ticket_id in candidates {
            match self.db_client.archive_resolved_ticket(ticket_id, cutoff, now).await {
                Ok(true) => archived += 1,
                Ok(false) => {}
                Err(e) => tracing::error!("Failed to archive ticket {}: {}", ticket_id, e),
            }
        }

        if archived > 0 {
            tracing::info!("Archived {} resolved tickets", archived);
        }
        Ok(archived)
    }

    /// Permanently deletes tickets archived at or before `now - purge_after`,
    /// with their attachments, history and notifications.
    pub async fn purge_archived(&self, now: DateTime<Utc>) -> Result<usize, ServiceError> {
        let cutoff = now - self.purge_after;
        let candidates = self.db_client.get_purgeable_ticket_ids(cutoff).await?;

        let mut purged = 0;
        for ticket_id in candidates {
            match self.db_client.delete_ticket(ticket_id, Some(cutoff)).await {
                Ok(Some(attachments)) => {
                    purged += 1;
                    for attachment in attachments {
                        self.file_store.remove(&attachment.path).await;
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::error!("Failed to purge ticket {}: {}", ticket_id, e),
            }
        }

        if purged > 0 {
            tracing::info!("Purged {} archived tickets", purged);
        }
        Ok(purged)
    }

    /// One sweep: archive first, then purge.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<(usize, usize), ServiceError> {
        let archived = self.archive_resolved(now).await?;
        let purged = self.purge_archived(now).await?;
        Ok((archived, purged))
    }
}
