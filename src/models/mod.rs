pub mod notificationmodel;
pub mod settingsmodel;
pub mod ticketmodel;
