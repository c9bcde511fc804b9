// src/handler/tickets.rs
use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use axum::{
    async_trait,
    extract::{ConnectInfo, DefaultBodyLimit, FromRequestParts, Multipart, Path, Query},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Map, Value};

use crate::{
    dtos::ticketdtos::{RateLimitQuery, TrackTicketDto},
    error::HttpError,
    models::ticketmodel::TicketCategory,
    service::{
        error::{FieldError, ServiceError},
        file_store::UploadedFile,
        ticket_service::SubmittedTicket,
        validation::{self, MAX_UPLOAD_BYTES},
    },
    AppState,
};

/// Multipart bodies may exceed the upload limit so that oversized files are
/// rejected with a field error rather than a bare 413.
const MULTIPART_BODY_LIMIT: usize = MAX_UPLOAD_BYTES * 4;

/// Caller address used as half of the rate limiter key. The socket address is
/// used unless `TRUST_PROXY_HEADERS` is on, in which case the last
/// `x-forwarded-for` hop (the one our reverse proxy appended) wins.
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

fn forwarded_hop(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.rsplit(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let trust_proxy = parts
            .extensions
            .get::<Arc<AppState>>()
            .map(|app_state| app_state.env.trust_proxy_headers)
            .unwrap_or(false);

        let forwarded = if trust_proxy { forwarded_hop(parts) } else { None };

        let ip = forwarded
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_else(|| "unknown".to_string());

        Ok(ClientIp(ip))
    }
}

pub fn tickets_handler() -> Router {
    Router::new()
        .route("/", post(submit_ticket))
        .route("/track", post(track_ticket))
        .route("/rate-limit", get(get_rate_limit))
        .route(
            "/document-upload",
            post(submit_document_upload).layer(DefaultBodyLimit::max(MULTIPART_BODY_LIMIT)),
        )
        .route("/:category", post(submit_category_ticket))
}

pub fn public_settings_handler() -> Router {
    Router::new().route("/categories", get(get_active_categories))
}

fn created_response(submitted: SubmittedTicket) -> impl IntoResponse {
    (
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": "Ticket submitted successfully",
            "data": {
                "ticketId": submitted.ticket.id,
                "trackingId": submitted.ticket.tracking_id,
                "ticket": submitted.ticket,
                "attachment": submitted.attachment,
                "rateLimitInfo": submitted.rate_limit_info,
            }
        })),
    )
}

pub async fn submit_ticket(
    Extension(app_state): Extension<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, HttpError> {
    let category = body
        .get("category")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let submitted = app_state
        .ticket_service
        .submit_ticket(&category, body, None, &client_ip)
        .await?;

    Ok(created_response(submitted))
}

pub async fn submit_category_ticket(
    Extension(app_state): Extension<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    Path(slug): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, HttpError> {
    let category = TicketCategory::from_slug(&slug)
        .ok_or_else(|| HttpError::not_found(format!("Unknown ticket category: {}", slug)))?;

    let submitted = app_state
        .ticket_service
        .submit_ticket(category.to_str(), body, None, &client_ip)
        .await?;

    Ok(created_response(submitted))
}

pub async fn submit_document_upload(
    Extension(app_state): Extension<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    let mut fields = Map::new();
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| HttpError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            let filename = field.file_name().unwrap_or_default().to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| HttpError::bad_request(format!("Failed to read uploaded file: {}", e)))?;

            // Browsers send an empty part when no file was chosen.
            if !filename.is_empty() || !bytes.is_empty() {
                file = Some(UploadedFile {
                    filename,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| HttpError::bad_request(format!("Invalid form field {}: {}", name, e)))?;
            fields.insert(name, Value::String(value));
        }
    }

    let submitted = app_state
        .ticket_service
        .submit_ticket(
            TicketCategory::DocumentUpload.to_str(),
            Value::Object(fields),
            file,
            &client_ip,
        )
        .await?;

    Ok(created_response(submitted))
}

pub async fn track_ticket(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<TrackTicketDto>,
) -> Result<impl IntoResponse, HttpError> {
    validation::validate_dto(&body)?;

    let detail = app_state
        .ticket_service
        .track(&body.tracking_id, &body.email)
        .await
        .map_err(|e| match e {
            ServiceError::TicketNotFound(_) => {
                HttpError::not_found("No ticket matches this tracking ID and email")
            }
            other => other.into(),
        })?;

    Ok(Json(json!({
        "status": "success",
        "data": detail
    })))
}

pub async fn get_rate_limit(
    Extension(app_state): Extension<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    Query(query): Query<RateLimitQuery>,
) -> Result<impl IntoResponse, HttpError> {
    if query.email.trim().is_empty() {
        return Err(ServiceError::Validation(vec![FieldError::new("email", "Email is required")]).into());
    }

    let status = app_state.rate_limiter.get_status(&query.email, &client_ip);

    Ok(Json(json!({
        "status": "success",
        "data": status
    })))
}

pub async fn get_active_categories(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let categories: Vec<Value> = app_state
        .settings
        .categories()
        .active()
        .into_iter()
        .map(|toggle| {
            json!({
                "id": toggle.id,
                "name": toggle.name,
                "displayName": toggle.name.display_name(),
                "active": toggle.active,
            })
        })
        .collect();

    Ok(Json(json!({
        "status": "success",
        "data": categories
    })))
}
