// service/notification_service.rs
use std::sync::Arc;

use crate::{
    db::{notificationdb::NotificationExt, HelpdeskStore},
    models::{
        notificationmodel::*,
        ticketmodel::{Ticket, TicketCategory, TicketStatus},
    },
    service::{error::ServiceError, settings::SettingsStore},
};

pub const ADMIN_NOTIFICATION_LIMIT: i64 = 50;

fn or<'a>(value: &'a Option<String>, placeholder: &'a str) -> &'a str {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(placeholder)
}

/// Title and message for a freshly submitted ticket.
pub fn new_ticket_message(ticket: &Ticket) -> (String, String) {
    let d = &ticket.details;
    let title = format!("New {} Priority Ticket", ticket.priority.to_str());
    let message = match ticket.category {
        TicketCategory::Troubleshooting => format!(
            "New troubleshooting ticket for {} at {}",
            or(&d.type_of_equipment, "equipment"),
            or(&d.location, "location not specified"),
        ),
        TicketCategory::AccountManagement => format!(
            "{} request for {} at {}",
            or(&d.action_type, "Action"),
            or(&d.account_type, "account"),
            or(&d.school_name, "school not specified"),
        ),
        TicketCategory::DocumentUpload => format!(
            "New document upload: {} from {}",
            or(&d.document_type, "Document"),
            or(&d.school_name, "school not specified"),
        ),
        TicketCategory::TechnicalAssistance => format!(
            "New {} request from {}",
            or(&d.ta_type, "technical assistance"),
            or(&d.school_name, "school not specified"),
        ),
    };
    (title, message)
}

/// Title and message for a status transition.
pub fn status_change_message(ticket: &Ticket, previous_status: TicketStatus) -> (String, String) {
    let d = &ticket.details;
    let subject = match ticket.category {
        TicketCategory::Troubleshooting => format!(
            "Troubleshooting ticket for {} at {}",
            or(&d.type_of_equipment, "equipment"),
            or(&d.location, "location not specified"),
        ),
        TicketCategory::AccountManagement => format!(
            "{} request for {} at {}",
            or(&d.action_type, "Action"),
            or(&d.account_type, "account"),
            or(&d.school_name, "school not specified"),
        ),
        TicketCategory::DocumentUpload => format!(
            "Document upload ({}) from {}",
            or(&d.document_type, "Document"),
            or(&d.school_name, "school not specified"),
        ),
        TicketCategory::TechnicalAssistance => format!(
            "{} request from {}",
            or(&d.ta_type, "Technical assistance"),
            or(&d.school_name, "school not specified"),
        ),
    };
    (
        "Ticket Status Updated".to_string(),
        format!(
            "{} status changed from {} to {}",
            subject, previous_status, ticket.status
        ),
    )
}

#[derive(Debug, Clone)]
pub struct NotificationService {
    db_client: Arc<dyn HelpdeskStore>,
    settings: Arc<SettingsStore>,
}

impl NotificationService {
    pub fn new(db_client: Arc<dyn HelpdeskStore>, settings: Arc<SettingsStore>) -> Self {
        Self { db_client, settings }
    }

    /// Broadcasts a NEW_TICKET notification unless new-ticket alerts are off.
    pub async fn on_ticket_created(&self, ticket: &Ticket) -> Result<Option<Notification>, ServiceError> {
        if !self.settings.new_ticket_alert_enabled() {
            tracing::debug!("New ticket alerts disabled, skipping notification for {}", ticket.id);
            return Ok(None);
        }

        let (title, message) = new_ticket_message(ticket);
        let notification = self
            .store_notification(title, message, NotificationType::NewTicket, ticket)
            .await?;

        Ok(Some(notification))
    }

    pub async fn on_status_changed(
        &self,
        ticket: &Ticket,
        previous_status: TicketStatus,
    ) -> Result<Notification, ServiceError> {
        let (title, message) = status_change_message(ticket, previous_status);
        self.store_notification(title, message, NotificationType::StatusUpdate, ticket)
            .await
    }

    async fn store_notification(
        &self,
        title: String,
        message: String,
        notification_type: NotificationType,
        ticket: &Ticket,
    ) -> Result<Notification, ServiceError> {
        tracing::info!("Notification for ticket {}: {}", ticket.id, message);

        self.db_client
            .create_notification(NewNotification {
                title,
                message,
                notification_type,
                priority: ticket.priority,
                ticket_id: Some(ticket.id),
                recipient_id: None,
            })
            .await
            .map_err(|e| ServiceError::Notification(e.to_string()))
    }

    pub async fn list_for_admin(&self, admin_id: i32) -> Result<Vec<Notification>, ServiceError> {
        Ok(self
            .db_client
            .get_admin_notifications(admin_id, ADMIN_NOTIFICATION_LIMIT)
            .await?)
    }

    pub async fn mark_read(&self, notification_id: i32) -> Result<Notification, ServiceError> {
        self.db_client
            .mark_notification_read(notification_id)
            .await?
            .ok_or(ServiceError::NotificationNotFound(notification_id))
    }

    pub async fn clear_all(&self, admin_id: i32) -> Result<u64, ServiceError> {
        Ok(self.db_client.clear_notifications(admin_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::{
        config::Config,
        db::memorydb::MemoryDB,
        models::{
            settingsmodel::default_admin_settings,
            ticketmodel::{IctDetails, TicketDetails, TicketPriority},
        },
    };

    fn ticket(category: TicketCategory, details: TicketDetails) -> Ticket {
        Ticket {
            id: 1,
            tracking_id: Some("20240115-1".to_string()),
            category,
            status: TicketStatus::InProgress,
            priority: TicketPriority::High,
            name: "Ana".to_string(),
            email: "ana@school.edu".to_string(),
            details,
            category_specific_details: None,
            ict: IctDetails::default(),
            archived: false,
            archived_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_messages_fall_back_to_placeholders() {
        let t = ticket(TicketCategory::Troubleshooting, TicketDetails::default());
        let (title, message) = new_ticket_message(&t);
        assert_eq!(title, "New HIGH Priority Ticket");
        assert_eq!(message, "New troubleshooting ticket for equipment at location not specified");

        let t = ticket(
            TicketCategory::TechnicalAssistance,
            TicketDetails {
                ta_type: Some("ICT_TUTORIAL".to_string()),
                school_name: Some("Imus Pilot ES".to_string()),
                ..Default::default()
            },
        );
        let (_, message) = new_ticket_message(&t);
        assert_eq!(message, "New ICT_TUTORIAL request from Imus Pilot ES");
    }

    #[test]
    fn test_status_message_mentions_both_statuses() {
        let t = ticket(
            TicketCategory::DocumentUpload,
            TicketDetails {
                document_type: Some("report".to_string()),
                ..Default::default()
            },
        );
        let (title, message) = status_change_message(&t, TicketStatus::Pending);
        assert_eq!(title, "Ticket Status Updated");
        assert_eq!(
            message,
            "Document upload (report) from school not specified status changed from PENDING to IN_PROGRESS"
        );
    }

    #[tokio::test]
    async fn test_new_ticket_alert_setting_is_honoured() {
        let db: Arc<dyn HelpdeskStore> = Arc::new(MemoryDB::new());
        let settings = Arc::new(SettingsStore::from_config(&Config::for_tests()));
        let service = NotificationService::new(db.clone(), settings.clone());
        let t = ticket(TicketCategory::Troubleshooting, TicketDetails::default());

        let created = service.on_ticket_created(&t).await.unwrap().unwrap();
        assert_eq!(created.notification_type, NotificationType::NewTicket);
        assert_eq!(created.recipient_id, None);
        assert!(!created.read);

        let mut admin = default_admin_settings();
        admin["notifications"]["newTicketAlert"] = json!(false);
        settings.update_admin(admin);
        assert!(service.on_ticket_created(&t).await.unwrap().is_none());

        assert_eq!(service.list_for_admin(3).await.unwrap().len(), 1);
        assert!(matches!(
            service.mark_read(999).await,
            Err(ServiceError::NotificationNotFound(999))
        ));
    }
}
