// src/handler/settings.rs
use std::sync::Arc;

use axum::{
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};

use crate::{
    error::HttpError,
    mail::{mails, sendmail},
    middleware::AdminIdentity,
    models::settingsmodel::{CategorySettings, EmailSettings},
    service::error::{FieldError, ServiceError},
    AppState,
};

pub fn settings_handler() -> Router {
    Router::new()
        .route("/", get(get_settings))
        .route("/general", post(update_general_settings))
        .route("/email", post(update_email_settings))
        .route("/categories", post(update_category_settings))
        .route("/admin", post(update_admin_settings))
        .route("/test-email", post(send_test_email))
}

fn require_object(section: &str, value: &Value) -> Result<(), ServiceError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(ServiceError::Validation(vec![FieldError::new(
            section,
            format!("{} settings must be an object", section),
        )]))
    }
}

pub async fn get_settings(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let settings = app_state.settings.get().redacted();

    Ok(Json(json!({
        "status": "success",
        "data": settings
    })))
}

pub async fn update_general_settings(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, HttpError> {
    require_object("general", &body)?;
    let general = app_state.settings.update_general(body);

    Ok(Json(json!({
        "status": "success",
        "message": "General settings saved",
        "data": general
    })))
}

pub async fn update_email_settings(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<EmailSettings>,
) -> Result<impl IntoResponse, HttpError> {
    let email = app_state.settings.update_email(body).redacted();

    Ok(Json(json!({
        "status": "success",
        "message": "Email settings saved",
        "data": email
    })))
}

pub async fn update_category_settings(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<CategorySettings>,
) -> Result<impl IntoResponse, HttpError> {
    let categories = app_state.settings.update_categories(body);

    Ok(Json(json!({
        "status": "success",
        "message": "Category settings saved",
        "data": categories
    })))
}

pub async fn update_admin_settings(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, HttpError> {
    require_object("admin", &body)?;
    let admin = app_state.settings.update_admin(body);

    Ok(Json(json!({
        "status": "success",
        "message": "Admin settings saved",
        "data": admin
    })))
}

/// Sends a test message with the submitted SMTP settings, to the admin's own
/// address when the token carries one and to the sender address otherwise.
pub async fn send_test_email(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(admin): Extension<AdminIdentity>,
    Json(body): Json<EmailSettings>,
) -> Result<impl IntoResponse, HttpError> {
    let settings = app_state.settings.email().merged_with(body);
    sendmail::validate_smtp_settings(&settings)?;

    let recipient = admin
        .email
        .clone()
        .unwrap_or_else(|| settings.sender_email.clone());

    mails::send_test_email(&settings, &recipient).await.map_err(|e| {
        tracing::error!("Test email to {} failed: {}", recipient, e);
        HttpError::from(e)
    })?;

    Ok(Json(json!({
        "status": "success",
        "message": format!("Test email sent to {}", recipient)
    })))
}
