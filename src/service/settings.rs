use std::sync::{PoisonError, RwLock};

use serde_json::{json, Value};

use crate::{
    config::Config,
    models::settingsmodel::*,
};

/// Runtime settings shared by the services. Readers get snapshots; updates
/// replace one section at a time.
#[derive(Debug)]
pub struct SettingsStore {
    inner: RwLock<AppSettings>,
}

impl SettingsStore {
    pub fn new(settings: AppSettings) -> Self {
        SettingsStore {
            inner: RwLock::new(settings),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        SettingsStore::new(AppSettings {
            email: EmailSettings {
                smtp_host: config.smtp_host.clone(),
                smtp_port: config.smtp_port,
                smtp_user: config.smtp_username.clone(),
                smtp_password: config.smtp_password.clone(),
                sender_name: config.sender_name.clone(),
                sender_email: config.sender_email.clone(),
                enable_notifications: config.email_notifications,
            },
            categories: CategorySettings::default(),
            admin: default_admin_settings(),
            general: json!({
                "systemName": "IT Helpdesk",
                "timezone": "Asia/Manila",
            }),
        })
    }

    pub fn get(&self) -> AppSettings {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn email(&self) -> EmailSettings {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).email.clone()
    }

    pub fn categories(&self) -> CategorySettings {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).categories.clone()
    }

    pub fn new_ticket_alert_enabled(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .new_ticket_alert_enabled()
    }

    pub fn update_email(&self, update: EmailSettings) -> EmailSettings {
        let mut settings = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        settings.email = settings.email.merged_with(update);
        tracing::info!("Email settings updated");
        settings.email.clone()
    }

    pub fn update_categories(&self, update: CategorySettings) -> CategorySettings {
        let mut settings = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        settings.categories = update;
        tracing::info!("Category settings updated");
        settings.categories.clone()
    }

    pub fn update_admin(&self, update: Value) -> Value {
        let mut settings = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        settings.admin = update;
        settings.admin.clone()
    }

    pub fn update_general(&self, update: Value) -> Value {
        let mut settings = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        settings.general = update;
        settings.general.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ticketmodel::TicketCategory;

    #[test]
    fn test_updates_are_visible_to_later_snapshots() {
        let store = SettingsStore::from_config(&Config::for_tests());
        assert!(store.new_ticket_alert_enabled());

        let mut admin = default_admin_settings();
        admin["notifications"]["newTicketAlert"] = json!(false);
        store.update_admin(admin);
        assert!(!store.new_ticket_alert_enabled());

        let mut categories = store.categories();
        categories.ticket_categories[3].active = false;
        store.update_categories(categories);
        assert!(!store.categories().is_active(TicketCategory::TechnicalAssistance));
    }

    #[test]
    fn test_email_update_keeps_password_when_redacted() {
        let store = SettingsStore::from_config(&Config::for_tests());
        let mut email = store.email();
        email.smtp_password = "secret".to_string();
        store.update_email(email);

        let mut shown = store.get().redacted().email;
        shown.smtp_host = "smtp.office365.com".to_string();
        let saved = store.update_email(shown);

        assert_eq!(saved.smtp_host, "smtp.office365.com");
        assert_eq!(saved.smtp_password, "secret");
    }
}
