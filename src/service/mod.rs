pub mod archive_service;
pub mod background_jobs;
pub mod error;
pub mod file_store;
pub mod notification_service;
pub mod rate_limiter;
pub mod report;
pub mod settings;
pub mod ticket_service;
pub mod validation;
