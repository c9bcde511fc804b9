use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::error::HttpError;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        FieldError {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Too many submission attempts. Please try again in {} minutes.", cooldown_minutes(.cooldown_remaining_ms))]
    RateLimitExceeded {
        remaining_attempts: usize,
        cooldown_remaining_ms: i64,
    },

    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Invalid file type. Only PDF, DOC and DOCX files are allowed.")]
    InvalidFile,

    #[error("File too large. Maximum size is 2MB.")]
    FileTooLarge,

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Ticket {0} not found")]
    TicketNotFound(i32),

    #[error("Notification {0} not found")]
    NotificationNotFound(i32),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Email error: {0}")]
    Email(String),

    #[error("File storage error: {0}")]
    FileStore(String),

    #[error("Report error: {0}")]
    Report(String),
}

fn cooldown_minutes(cooldown_remaining_ms: &i64) -> i64 {
    (cooldown_remaining_ms + 59_999) / 60_000
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::RateLimitExceeded {
                remaining_attempts,
                cooldown_remaining_ms,
            } => HttpError::too_many_requests(error.to_string()).with_rate_limit_info(json!({
                "remainingAttempts": remaining_attempts,
                "cooldownMinutes": cooldown_minutes(&cooldown_remaining_ms),
                "cooldownRemainingMs": cooldown_remaining_ms,
                "isBlocked": cooldown_remaining_ms > 0,
            })),

            ServiceError::Validation(ref errors) => {
                let errors = json!(errors);
                HttpError::bad_request(error.to_string()).with_errors(errors)
            }

            ServiceError::InvalidFile | ServiceError::FileTooLarge => {
                let errors = json!([FieldError::new("file", error.to_string())]);
                HttpError::bad_request(error.to_string()).with_errors(errors)
            }

            ServiceError::InvalidStatus(_) => {
                let errors = json!([FieldError::new(
                    "status",
                    "Status must be one of PENDING, IN_PROGRESS, RESOLVED, CLOSED"
                )]);
                HttpError::bad_request(error.to_string()).with_errors(errors)
            }

            ServiceError::TicketNotFound(_) | ServiceError::NotificationNotFound(_) => {
                HttpError::not_found(error.to_string())
            }

            _ => HttpError::server_error(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[test]
    fn test_rate_limit_maps_to_429_with_info() {
        let error: HttpError = ServiceError::RateLimitExceeded {
            remaining_attempts: 0,
            cooldown_remaining_ms: 90_000,
        }
        .into();

        assert_eq!(error.status, StatusCode::TOO_MANY_REQUESTS);
        let info = error.rate_limit_info.unwrap();
        assert_eq!(info["cooldownMinutes"], 2);
        assert_eq!(info["isBlocked"], true);
    }

    #[test]
    fn test_validation_maps_to_400_with_field_errors() {
        let error: HttpError = ServiceError::Validation(vec![
            FieldError::new("serialNo", "Serial number is required"),
            FieldError::new("email", "Invalid email address"),
        ])
        .into();

        assert_eq!(error.status, StatusCode::BAD_REQUEST);
        assert_eq!(error.errors.unwrap().as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_not_found_and_persistence_mapping() {
        let error: HttpError = ServiceError::TicketNotFound(9).into();
        assert_eq!(error.status, StatusCode::NOT_FOUND);

        let error: HttpError = ServiceError::Database(sqlx::Error::RowNotFound).into();
        assert_eq!(error.status, StatusCode::INTERNAL_SERVER_ERROR);

        let error: HttpError = ServiceError::Report("writer closed".to_string()).into();
        assert_eq!(error.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
