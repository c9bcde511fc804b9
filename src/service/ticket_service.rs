// service/ticket_service.rs
use std::{str::FromStr, sync::Arc};

use chrono::{DateTime, Duration, Months, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::{
    db::{ticketdb::TicketExt, HelpdeskStore},
    dtos::ticketdtos::StatsQuery,
    error::ErrorMessage,
    mail::mails,
    models::ticketmodel::*,
    service::{
        error::{FieldError, ServiceError},
        file_store::{FileStore, UploadedFile},
        notification_service::NotificationService,
        rate_limiter::{RateLimitStatus, RateLimiter},
        report,
        settings::SettingsStore,
        validation,
    },
    utils::tracking_id,
};

/// Window used for the "recently archived" dashboard counter.
const RECENTLY_ARCHIVED_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedTicket {
    pub ticket: Ticket,
    pub attachment: Option<Attachment>,
    pub rate_limit_info: RateLimitStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub updates: Vec<TicketUpdate>,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
    pub ticket: Ticket,
    pub update: TicketUpdate,
}

#[derive(Debug, Clone)]
pub struct TicketService {
    db_client: Arc<dyn HelpdeskStore>,
    settings: Arc<SettingsStore>,
    rate_limiter: Arc<RateLimiter>,
    notification_service: Arc<NotificationService>,
    file_store: Arc<FileStore>,
}

impl TicketService {
    pub fn new(
        db_client: Arc<dyn HelpdeskStore>,
        settings: Arc<SettingsStore>,
        rate_limiter: Arc<RateLimiter>,
        notification_service: Arc<NotificationService>,
        file_store: Arc<FileStore>,
    ) -> Self {
        Self {
            db_client,
            settings,
            rate_limiter,
            notification_service,
            file_store,
        }
    }

    /// Full submission flow: rate limit gate, validation, persistence,
    /// then notification and confirmation email.
    pub async fn submit_ticket(
        &self,
        category: &str,
        payload: Value,
        file: Option<UploadedFile>,
        client_ip: &str,
    ) -> Result<SubmittedTicket, ServiceError> {
        let email = payload
            .get("email")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();

        let identity_guard = self.rate_limiter.lock_identity(&email, client_ip).await;
        self.rate_limiter.can_submit(&email, client_ip)?;

        let new_ticket =
            validation::validate_submission(category, payload, file.as_ref(), &self.settings.categories())?;

        let attachment = match (&file, new_ticket.category) {
            (Some(file), TicketCategory::DocumentUpload) => Some(self.file_store.save(file).await?),
            _ => None,
        };
        let stored_path = attachment.as_ref().map(|a| a.path.clone());

        let (ticket, attachment) = match self.db_client.create_ticket(new_ticket, attachment).await {
            Ok(created) => created,
            Err(e) => {
                if let Some(path) = stored_path {
                    self.file_store.remove(&path).await;
                }
                return Err(e.into());
            }
        };

        self.rate_limiter.record_submission(&email, client_ip);
        let rate_limit_info = self.rate_limiter.get_status(&email, client_ip);
        drop(identity_guard);

        tracing::info!(
            "Ticket {} ({}) submitted in {}",
            ticket.id,
            ticket.tracking_id.as_deref().unwrap_or_default(),
            ticket.category
        );

        if let Err(e) = self.notification_service.on_ticket_created(&ticket).await {
            tracing::error!("Failed to create notification for ticket {}: {}", ticket.id, e);
        }

        let email_settings = self.settings.email();
        if email_settings.can_send() {
            let mailed = ticket.clone();
            mails::send_in_background(
                format!("confirmation email for ticket {}", ticket.id),
                async move { mails::send_ticket_confirmation_email(&email_settings, &mailed).await },
            );
        }

        Ok(SubmittedTicket {
            ticket: ticket.with_derived_details(),
            attachment,
            rate_limit_info,
        })
    }

    /// Moves a ticket to `new_status`. Any status may follow any status.
    pub async fn transition_status(
        &self,
        ticket_id: i32,
        new_status: &str,
        admin_id: i32,
        comment: Option<String>,
    ) -> Result<StatusChange, ServiceError> {
        let status = TicketStatus::from_str(new_status).map_err(ServiceError::InvalidStatus)?;
        let comment = comment.unwrap_or_default();

        let (mut ticket, update) = self
            .db_client
            .update_ticket_status(ticket_id, status, admin_id, comment.clone())
            .await?
            .ok_or(ServiceError::TicketNotFound(ticket_id))?;

        if status == TicketStatus::Resolved && !ticket.archived {
            match self.db_client.archive_ticket(ticket_id, Utc::now()).await {
                Ok(Some(archived)) => ticket = archived,
                Ok(None) => {}
                Err(e) => tracing::error!("Failed to auto-archive ticket {}: {}", ticket_id, e),
            }
        }

        if let Err(e) = self
            .notification_service
            .on_status_changed(&ticket, update.previous_status)
            .await
        {
            tracing::error!("Failed to create status notification for ticket {}: {}", ticket_id, e);
        }

        let email_settings = self.settings.email();
        if email_settings.can_send() {
            let mailed = ticket.clone();
            let previous_status = update.previous_status;
            mails::send_in_background(
                format!("status update email for ticket {}", ticket_id),
                async move {
                    mails::send_status_update_email(&email_settings, &mailed, previous_status, &comment).await
                },
            );
        }

        Ok(StatusChange {
            ticket: ticket.with_derived_details(),
            update,
        })
    }

    pub async fn update_ict_details(&self, ticket_id: i32, ict: IctDetails) -> Result<Ticket, ServiceError> {
        self.db_client
            .update_ict_details(ticket_id, ict)
            .await?
            .map(Ticket::with_derived_details)
            .ok_or(ServiceError::TicketNotFound(ticket_id))
    }

    /// Manual archive. Archiving an archived ticket returns it unchanged.
    pub async fn archive(&self, ticket_id: i32) -> Result<Ticket, ServiceError> {
        if let Some(ticket) = self.db_client.archive_ticket(ticket_id, Utc::now()).await? {
            return Ok(ticket.with_derived_details());
        }
        self.get_ticket(ticket_id).await
    }

    pub async fn restore(&self, ticket_id: i32) -> Result<Ticket, ServiceError> {
        self.db_client
            .restore_ticket(ticket_id)
            .await?
            .map(Ticket::with_derived_details)
            .ok_or(ServiceError::TicketNotFound(ticket_id))
    }

    pub async fn delete(&self, ticket_id: i32) -> Result<(), ServiceError> {
        let attachments = self
            .db_client
            .delete_ticket(ticket_id, None)
            .await?
            .ok_or(ServiceError::TicketNotFound(ticket_id))?;

        for attachment in attachments {
            self.file_store.remove(&attachment.path).await;
        }
        tracing::info!("Ticket {} deleted", ticket_id);
        Ok(())
    }

    pub async fn get_ticket(&self, ticket_id: i32) -> Result<Ticket, ServiceError> {
        self.db_client
            .get_ticket(ticket_id)
            .await?
            .map(Ticket::with_derived_details)
            .ok_or(ServiceError::TicketNotFound(ticket_id))
    }

    pub async fn get_ticket_detail(&self, ticket_id: i32) -> Result<TicketDetail, ServiceError> {
        let ticket = self.get_ticket(ticket_id).await?;
        let updates = self.db_client.get_ticket_updates(ticket_id).await?;
        let attachments = self.db_client.get_ticket_attachments(ticket_id).await?;

        Ok(TicketDetail {
            ticket,
            updates,
            attachments,
        })
    }

    /// Public lookup by tracking ID and requester email.
    pub async fn track(&self, tracking_id: &str, email: &str) -> Result<TicketDetail, ServiceError> {
        let tracking_id = tracking_id.trim();
        if !tracking_id::validate_format(tracking_id) {
            return Err(ServiceError::Validation(vec![FieldError::new(
                "trackingId",
                ErrorMessage::InvalidTrackingId.to_string(),
            )]));
        }

        let ticket = self
            .db_client
            .get_ticket_by_tracking_id(tracking_id, email.trim())
            .await?
            .ok_or_else(|| {
                let id = tracking_id::parse(tracking_id).map(|(_, id)| id).unwrap_or_default();
                ServiceError::TicketNotFound(id)
            })?;

        let updates = self.db_client.get_ticket_updates(ticket.id).await?;

        Ok(TicketDetail {
            ticket: ticket.with_derived_details(),
            updates,
            attachments: Vec::new(),
        })
    }

    pub async fn list(&self, filter: &TicketFilter) -> Result<(Vec<Ticket>, i64), ServiceError> {
        let (tickets, total) = self.db_client.get_tickets(filter).await?;
        Ok((
            tickets.into_iter().map(Ticket::with_derived_details).collect(),
            total,
        ))
    }

    pub async fn count_archived(&self) -> Result<i64, ServiceError> {
        Ok(self.db_client.count_archived_tickets().await?)
    }

    pub async fn stats(&self, query: &StatsQuery) -> Result<TicketStats, ServiceError> {
        let now = Utc::now();
        let (from, to) = stats_range(query, now);
        Ok(self
            .db_client
            .get_ticket_stats(from, to, now - Duration::days(RECENTLY_ARCHIVED_DAYS))
            .await?)
    }

    /// CSV report of every ticket, archived or not, created in the same
    /// range the dashboard statistics use.
    pub async fn export_report(&self, query: &StatsQuery) -> Result<Vec<u8>, ServiceError> {
        let (from, to) = stats_range(query, Utc::now());
        let tickets = self.db_client.get_tickets_created_between(from, to).await?;
        tracing::info!("Exporting {} tickets", tickets.len());
        report::write_csv(&report::report_rows(&tickets))
    }

    /// Emails the ICT resolution notes to the requester. Unlike the lifecycle
    /// emails, failures are returned to the caller.
    pub async fn send_resolution_email(&self, ticket_id: i32) -> Result<Ticket, ServiceError> {
        let ticket = self.get_ticket(ticket_id).await?;
        let email_settings = self.settings.email();

        if email_settings.smtp_user.is_empty() || email_settings.smtp_password.is_empty() {
            return Err(ServiceError::Email("Email settings are not configured".to_string()));
        }

        mails::send_resolution_email(&email_settings, &ticket).await?;
        Ok(ticket)
    }
}

/// Date range of the dashboard statistics.
pub fn stats_range(query: &StatsQuery, now: DateTime<Utc>) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let start = match query.time_period.as_deref() {
        Some("weekly") => Some(now - Duration::days(7)),
        Some("monthly") => now.checked_sub_months(Months::new(1)),
        Some("annual") => now.checked_sub_months(Months::new(12)),
        _ => None,
    };

    match start {
        Some(start) => (Some(start), Some(now)),
        None => (query.start_date, query.end_date),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{config::Config, db::memorydb::MemoryDB, db::notificationdb::NotificationExt};

    struct Fixture {
        db: Arc<MemoryDB>,
        service: TicketService,
    }

    fn fixture() -> Fixture {
        let config = Config::for_tests();
        let db = Arc::new(MemoryDB::new());
        let store: Arc<dyn HelpdeskStore> = db.clone();
        let settings = Arc::new(SettingsStore::from_config(&config));
        let notifications = Arc::new(NotificationService::new(store.clone(), settings.clone()));
        let service = TicketService::new(
            store,
            settings,
            Arc::new(RateLimiter::from_config(&config)),
            notifications,
            Arc::new(FileStore::new(config.upload_dir)),
        );
        Fixture { db, service }
    }

    fn payload() -> Value {
        json!({
            "name": "Ana",
            "email": "ana@school.edu",
            "priority": "HIGH",
            "taType": "ICT_TUTORIAL",
            "location": "SCHOOL_IMUS_CITY",
            "schoolLevel": "Elementary",
            "schoolName": "Imus Pilot ES",
            "subject": "Training",
            "message": "Need tutorial"
        })
    }

    #[tokio::test]
    async fn test_submission_creates_pending_ticket_and_notification() {
        let f = fixture();
        let submitted = f
            .service
            .submit_ticket("TECHNICAL_ASSISTANCE", payload(), None, "127.0.0.1")
            .await
            .unwrap();

        let ticket = &submitted.ticket;
        assert_eq!(ticket.status, TicketStatus::Pending);
        assert_eq!(submitted.rate_limit_info.remaining_attempts, 4);
        let tracking = ticket.tracking_id.as_deref().unwrap();
        assert_eq!(
            tracking,
            tracking_id::encode(ticket.created_at.date_naive(), ticket.id)
        );

        let notifications = f.db.get_admin_notifications(1, 50).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].ticket_id, Some(ticket.id));
    }

    #[tokio::test]
    async fn test_failed_validation_does_not_consume_an_attempt() {
        let f = fixture();
        let mut bad = payload();
        bad["subject"] = json!("");

        for _ in 0..6 {
            assert!(matches!(
                f.service.submit_ticket("TECHNICAL_ASSISTANCE", bad.clone(), None, "127.0.0.1").await,
                Err(ServiceError::Validation(_))
            ));
        }
        assert!(f
            .service
            .submit_ticket("TECHNICAL_ASSISTANCE", payload(), None, "127.0.0.1")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_sixth_submission_is_rate_limited() {
        let f = fixture();
        for _ in 0..5 {
            f.service
                .submit_ticket("TECHNICAL_ASSISTANCE", payload(), None, "127.0.0.1")
                .await
                .unwrap();
        }
        assert!(matches!(
            f.service.submit_ticket("TECHNICAL_ASSISTANCE", payload(), None, "127.0.0.1").await,
            Err(ServiceError::RateLimitExceeded { remaining_attempts: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_resolving_archives_and_records_history() {
        let f = fixture();
        let submitted = f
            .service
            .submit_ticket("TECHNICAL_ASSISTANCE", payload(), None, "127.0.0.1")
            .await
            .unwrap();
        let id = submitted.ticket.id;

        let change = f
            .service
            .transition_status(id, "RESOLVED", 7, Some("Done".to_string()))
            .await
            .unwrap();

        assert_eq!(change.ticket.status, TicketStatus::Resolved);
        assert!(change.ticket.archived);
        assert!(change.ticket.archived_at.is_some());
        assert_eq!(change.update.previous_status, TicketStatus::Pending);
        assert_eq!(change.update.new_status, TicketStatus::Resolved);
        assert_eq!(change.update.admin_id, 7);

        let detail = f.service.get_ticket_detail(id).await.unwrap();
        assert_eq!(detail.updates.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_status_and_missing_ticket() {
        let f = fixture();
        assert!(matches!(
            f.service.transition_status(1, "BOGUS", 1, None).await,
            Err(ServiceError::InvalidStatus(s)) if s == "BOGUS"
        ));
        assert!(matches!(
            f.service.transition_status(42, "CLOSED", 1, None).await,
            Err(ServiceError::TicketNotFound(42))
        ));
    }

    #[tokio::test]
    async fn test_permissive_transitions() {
        let f = fixture();
        let id = f
            .service
            .submit_ticket("TECHNICAL_ASSISTANCE", payload(), None, "127.0.0.1")
            .await
            .unwrap()
            .ticket
            .id;

        for status in ["CLOSED", "PENDING", "IN_PROGRESS", "CLOSED"] {
            let change = f.service.transition_status(id, status, 1, None).await.unwrap();
            assert_eq!(change.ticket.status.to_str(), status);
        }
        assert_eq!(f.db.get_ticket_updates(id).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_manual_archive_is_idempotent_and_restore_clears_it() {
        let f = fixture();
        let id = f
            .service
            .submit_ticket("TECHNICAL_ASSISTANCE", payload(), None, "127.0.0.1")
            .await
            .unwrap()
            .ticket
            .id;

        let first = f.service.archive(id).await.unwrap();
        let second = f.service.archive(id).await.unwrap();
        assert_eq!(first.archived_at, second.archived_at);

        let restored = f.service.restore(id).await.unwrap();
        assert!(!restored.archived);
        assert!(restored.archived_at.is_none());
    }

    #[tokio::test]
    async fn test_track_checks_format_and_email() {
        let f = fixture();
        let ticket = f
            .service
            .submit_ticket("TECHNICAL_ASSISTANCE", payload(), None, "127.0.0.1")
            .await
            .unwrap()
            .ticket;
        let tracking = ticket.tracking_id.clone().unwrap();

        assert!(matches!(
            f.service.track("12345", "ana@school.edu").await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            f.service.track(&tracking, "someone@else.com").await,
            Err(ServiceError::TicketNotFound(_))
        ));
        let found = f.service.track(&tracking, "Ana@School.edu").await.unwrap();
        assert_eq!(found.ticket.id, ticket.id);
    }

    #[tokio::test]
    async fn test_resolution_email_without_smtp_is_an_error() {
        let f = fixture();
        let id = f
            .service
            .submit_ticket("TECHNICAL_ASSISTANCE", payload(), None, "127.0.0.1")
            .await
            .unwrap()
            .ticket
            .id;

        assert!(matches!(
            f.service.send_resolution_email(id).await,
            Err(ServiceError::Email(_))
        ));
    }

    #[tokio::test]
    async fn test_export_includes_archived_tickets_in_range() {
        let f = fixture();
        let mut tickets = Vec::new();
        for _ in 0..2 {
            let submitted = f
                .service
                .submit_ticket("TECHNICAL_ASSISTANCE", payload(), None, "127.0.0.1")
                .await
                .unwrap();
            tickets.push(submitted.ticket);
        }
        f.service.archive(tickets[0].id).await.unwrap();

        let csv = f.service.export_report(&StatsQuery::default()).await.unwrap();
        let csv = String::from_utf8(csv).unwrap();
        assert_eq!(csv.lines().count(), 3);
        for ticket in &tickets {
            assert!(csv.contains(ticket.tracking_id.as_deref().unwrap()));
        }
        assert!(csv.contains("School - Imus City"));

        let future = StatsQuery {
            time_period: None,
            start_date: Some(Utc::now() + Duration::days(1)),
            end_date: None,
        };
        let csv = f.service.export_report(&future).await.unwrap();
        assert_eq!(String::from_utf8(csv).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_stats_range_prefers_time_period() {
        let now = Utc::now();
        let query = StatsQuery {
            time_period: Some("weekly".to_string()),
            start_date: Some(now - Duration::days(400)),
            end_date: None,
        };
        assert_eq!(stats_range(&query, now), (Some(now - Duration::days(7)), Some(now)));

        let query = StatsQuery {
            time_period: None,
            start_date: Some(now - Duration::days(3)),
            end_date: None,
        };
        assert_eq!(stats_range(&query, now), (Some(now - Duration::days(3)), None));
    }
}
