// src/models/settingsmodel.rs
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::ticketmodel::TicketCategory;

const REDACTED: &str = "********";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmailSettings {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_password: String,
    pub sender_name: String,
    pub sender_email: String,
    pub enable_notifications: bool,
}

impl EmailSettings {
    /// Notifications go out only when enabled and SMTP credentials are present.
    pub fn can_send(&self) -> bool {
        self.enable_notifications && !self.smtp_user.is_empty() && !self.smtp_password.is_empty()
    }

    pub fn redacted(&self) -> Self {
        let mut settings = self.clone();
        if !settings.smtp_password.is_empty() {
            settings.smtp_password = REDACTED.to_string();
        }
        settings
    }

    /// Applies an update coming back from the settings form. A redacted
    /// password means "unchanged".
    pub fn merged_with(&self, mut update: EmailSettings) -> Self {
        if update.smtp_password == REDACTED {
            update.smtp_password = self.smtp_password.clone();
        }
        update
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryToggle {
    pub id: i32,
    pub name: TicketCategory,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategorySettings {
    pub ticket_categories: Vec<CategoryToggle>,
}

impl Default for CategorySettings {
    fn default() -> Self {
        CategorySettings {
            ticket_categories: TicketCategory::ALL
                .into_iter()
                .enumerate()
                .map(|(index, name)| CategoryToggle {
                    id: index as i32 + 1,
                    name,
                    active: true,
                })
                .collect(),
        }
    }
}

impl CategorySettings {
    /// Categories missing from the list are treated as active.
    pub fn is_active(&self, category: TicketCategory) -> bool {
        self.ticket_categories
            .iter()
            .find(|toggle| toggle.name == category)
            .map(|toggle| toggle.active)
            .unwrap_or(true)
    }

    pub fn active(&self) -> Vec<CategoryToggle> {
        self.ticket_categories
            .iter()
            .filter(|toggle| toggle.active)
            .cloned()
            .collect()
    }
}

pub fn default_admin_settings() -> serde_json::Value {
    json!({
        "searchFilters": {
            "showResolvedTickets": true,
            "showArchivedTickets": false,
            "defaultDateRange": 30
        },
        "notifications": {
            "desktopNotifications": true,
            "soundAlerts": true,
            "newTicketAlert": true,
            "urgentTicketAlert": true
        },
        "quickFilters": {
            "showPriority": true,
            "showCategory": true,
            "showStatus": true,
            "showDateRange": true
        }
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub email: EmailSettings,
    pub categories: CategorySettings,
    pub admin: serde_json::Value,
    pub general: serde_json::Value,
}

impl AppSettings {
    pub fn new_ticket_alert_enabled(&self) -> bool {
        self.admin
            .pointer("/notifications/newTicketAlert")
            .and_then(|value| value.as_bool())
            .unwrap_or(true)
    }

    pub fn redacted(&self) -> Self {
        AppSettings {
            email: self.email.redacted(),
            ..self.clone()
        }
    }
}
