use std::sync::LazyLock;
use std::time::Duration;

use ammonia::Builder;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use regex::Regex;
use tracing::{error, info};

use crate::{
    models::settingsmodel::EmailSettings,
    service::error::{FieldError, ServiceError},
};

const SMTP_TIMEOUT: Duration = Duration::from_secs(20);

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
});

pub fn validate_email(email: &str) -> Result<(), String> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(format!("Invalid email address: {}", email))
    }
}

/// Values are embedded in HTML, so only inline formatting survives.
fn sanitize_html(input: &str) -> String {
    let mut builder = Builder::default();
    builder.tags(["br", "strong", "em", "u"].into_iter().collect());
    builder.clean(input).to_string()
}

pub fn render_template(template: &str, placeholders: &[(&str, String)]) -> String {
    let mut html = template.to_string();
    for (key, value) in placeholders {
        html = html.replace(&format!("{{{{{}}}}}", key), &sanitize_html(value));
    }
    html
}

/// Checks SMTP settings before they are used for a test send.
pub fn validate_smtp_settings(settings: &EmailSettings) -> Result<(), ServiceError> {
    let mut errors = Vec::new();

    if settings.smtp_host.trim().is_empty() {
        errors.push(FieldError::new("smtpHost", "SMTP host is required"));
    }
    if settings.smtp_port == 0 {
        errors.push(FieldError::new("smtpPort", "SMTP port is required"));
    }
    if settings.smtp_user.trim().is_empty() {
        errors.push(FieldError::new("smtpUser", "SMTP username is required"));
    } else if settings.smtp_host.contains("gmail") && !settings.smtp_user.contains('@') {
        errors.push(FieldError::new(
            "smtpUser",
            "Gmail requires the full email address as username",
        ));
    }
    if settings.smtp_password.is_empty() {
        errors.push(FieldError::new("smtpPassword", "SMTP password is required"));
    }
    if validate_email(&settings.sender_email).is_err() {
        errors.push(FieldError::new("senderEmail", "A valid sender email is required"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::Validation(errors))
    }
}

fn build_transport(settings: &EmailSettings) -> Result<AsyncSmtpTransport<Tokio1Executor>, ServiceError> {
    let creds = Credentials::new(settings.smtp_user.clone(), settings.smtp_password.clone());

    // 465 is implicit TLS, everything else negotiates STARTTLS.
    let builder = (if settings.smtp_port == 465 {
        AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.smtp_host)
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_host)
    })
    .map_err(|e| ServiceError::Email(format!("Invalid SMTP host: {}", e)))?;

    Ok(builder
        .port(settings.smtp_port)
        .credentials(creds)
        .timeout(Some(SMTP_TIMEOUT))
        .build())
}

pub async fn send_email(
    settings: &EmailSettings,
    to_email: &str,
    subject: &str,
    html_body: String,
) -> Result<(), ServiceError> {
    validate_email(to_email).map_err(ServiceError::Email)?;

    let from: Mailbox = format!("{} <{}>", settings.sender_name, settings.sender_email)
        .parse()
        .map_err(|e| ServiceError::Email(format!("Invalid sender address: {}", e)))?;
    let to: Mailbox = to_email
        .parse()
        .map_err(|e| ServiceError::Email(format!("Invalid recipient address: {}", e)))?;

    let email = Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .header(ContentType::TEXT_HTML)
        .body(html_body)
        .map_err(|e| ServiceError::Email(format!("Failed to build email: {}", e)))?;

    let mailer = build_transport(settings)?;

    match mailer.send(email).await {
        Ok(_) => {
            info!("Email '{}' sent to {}", subject, to_email);
            Ok(())
        }
        Err(e) => {
            error!("SMTP send to {} failed: {}", to_email, e);
            Err(ServiceError::Email(format!("SMTP send failed: {}", e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> EmailSettings {
        EmailSettings {
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            smtp_user: "helpdesk@gmail.com".to_string(),
            smtp_password: "app-password".to_string(),
            sender_name: "IT Helpdesk".to_string(),
            sender_email: "helpdesk@gmail.com".to_string(),
            enable_notifications: true,
        }
    }

    #[test]
    fn test_email_validation() {
        assert!(validate_email("test@example.com").is_ok());
        assert!(validate_email("user.name+tag@domain.co.uk").is_ok());
        assert!(validate_email("invalid-email").is_err());
        assert!(validate_email("@example.com").is_err());
    }

    #[test]
    fn test_placeholders_are_sanitized() {
        let html = render_template(
            "<p>{{name}}</p>",
            &[("name", "<script>alert(1)</script>Ana".to_string())],
        );
        assert_eq!(html, "<p>Ana</p>");
    }

    #[test]
    fn test_gmail_requires_full_address() {
        assert!(validate_smtp_settings(&settings()).is_ok());

        let mut bad = settings();
        bad.smtp_user = "helpdesk".to_string();
        bad.smtp_password.clear();
        match validate_smtp_settings(&bad) {
            Err(ServiceError::Validation(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["smtpUser", "smtpPassword"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
