use std::{future::Future, time::Duration};

use super::sendmail::{render_template, send_email};
use crate::{
    models::{
        settingsmodel::EmailSettings,
        ticketmodel::{Ticket, TicketStatus},
    },
    service::error::ServiceError,
};

const TICKET_CONFIRMATION_TEMPLATE: &str = include_str!("templates/ticket-confirmation.html");
const STATUS_UPDATE_TEMPLATE: &str = include_str!("templates/status-update.html");
const RESOLUTION_TEMPLATE: &str = include_str!("templates/resolution.html");
const TEST_EMAIL_TEMPLATE: &str = include_str!("templates/test-email.html");

const BACKGROUND_SEND_TIMEOUT: Duration = Duration::from_secs(60);

fn tracking_id(ticket: &Ticket) -> String {
    ticket
        .tracking_id
        .clone()
        .unwrap_or_else(|| format!("#{}", ticket.id))
}

fn or_placeholder(value: Option<&str>, placeholder: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(placeholder)
        .to_string()
}

/// Runs an email send detached from the request. Failures and timeouts are
/// only logged.
pub fn send_in_background<F>(description: String, send: F)
where
    F: Future<Output = Result<(), ServiceError>> + Send + 'static,
{
    tokio::spawn(async move {
        match tokio::time::timeout(BACKGROUND_SEND_TIMEOUT, send).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("Failed to send {}: {}", description, e),
            Err(_) => tracing::error!("Timed out sending {}", description),
        }
    });
}

pub async fn send_ticket_confirmation_email(
    settings: &EmailSettings,
    ticket: &Ticket,
) -> Result<(), ServiceError> {
    let tracking_id = tracking_id(ticket);
    let subject = format!("Ticket received: {}", tracking_id);
    let html = render_template(
        TICKET_CONFIRMATION_TEMPLATE,
        &[
            ("name", ticket.name.clone()),
            ("category", ticket.category.display_name().to_string()),
            ("tracking_id", tracking_id),
            ("subject", or_placeholder(ticket.display_subject(), "No subject")),
            ("sender_name", settings.sender_name.clone()),
        ],
    );

    send_email(settings, &ticket.email, &subject, html).await
}

pub async fn send_status_update_email(
    settings: &EmailSettings,
    ticket: &Ticket,
    previous_status: TicketStatus,
    comment: &str,
) -> Result<(), ServiceError> {
    let tracking_id = tracking_id(ticket);
    let subject = format!("Ticket {} is now {}", tracking_id, ticket.status);
    let html = render_template(
        STATUS_UPDATE_TEMPLATE,
        &[
            ("name", ticket.name.clone()),
            ("tracking_id", tracking_id),
            ("previous_status", previous_status.to_string()),
            ("new_status", ticket.status.to_string()),
            ("comment", or_placeholder(Some(comment), "No comment provided")),
            ("sender_name", settings.sender_name.clone()),
        ],
    );

    send_email(settings, &ticket.email, &subject, html).await
}

pub async fn send_resolution_email(
    settings: &EmailSettings,
    ticket: &Ticket,
) -> Result<(), ServiceError> {
    let tracking_id = tracking_id(ticket);
    let subject = format!("Resolution details for ticket {}", tracking_id);
    let ict = &ticket.ict;
    let html = render_template(
        RESOLUTION_TEMPLATE,
        &[
            ("name", ticket.name.clone()),
            ("tracking_id", tracking_id),
            ("assigned_to", or_placeholder(ict.ict_assigned_to.as_deref(), "ICT staff")),
            ("diagnosis", or_placeholder(ict.ict_diagnosis_details.as_deref(), "Not provided")),
            ("fix_details", or_placeholder(ict.ict_fix_details.as_deref(), "Not provided")),
            (
                "date_fixed",
                ict.ict_date_fixed
                    .map(|at| at.format("%B %d, %Y").to_string())
                    .unwrap_or_else(|| "Not provided".to_string()),
            ),
            ("recommendations", or_placeholder(ict.ict_recommendations.as_deref(), "None")),
            ("sender_name", settings.sender_name.clone()),
        ],
    );

    send_email(settings, &ticket.email, &subject, html).await
}

pub async fn send_test_email(settings: &EmailSettings, to_email: &str) -> Result<(), ServiceError> {
    let html = render_template(
        TEST_EMAIL_TEMPLATE,
        &[
            ("smtp_host", settings.smtp_host.clone()),
            ("sender_name", settings.sender_name.clone()),
        ],
    );

    send_email(settings, to_email, "Helpdesk test email", html).await
}
