pub mod admin;
pub mod notifications;
pub mod settings;
pub mod tickets;
