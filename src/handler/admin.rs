// src/handler/admin.rs
use std::{str::FromStr, sync::Arc};

use axum::{
    extract::{Path, Query},
    http::header,
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::Utc;
use serde_json::json;

use crate::{
    dtos::ticketdtos::{IctDetailsDto, StatsQuery, SweepResponseDto, TicketQueryParams, UpdateStatusDto},
    error::HttpError,
    middleware::AdminIdentity,
    models::ticketmodel::{TicketCategory, TicketFilter, TicketStatus},
    service::{
        error::{FieldError, ServiceError},
        report::{REPORT_CONTENT_TYPE, REPORT_DISPOSITION},
        validation,
    },
    AppState,
};

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;
// Keeps (page - 1) * limit far below i64::MAX.
const MAX_PAGE: i64 = 1_000_000;

pub fn admin_tickets_handler() -> Router {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/tickets", get(get_tickets))
        .route("/tickets/archived/count", get(get_archived_count))
        .route("/tickets/export", get(export_tickets))
        .route("/tickets/all", get(export_all_tickets))
        .route("/tickets/:ticket_id", get(get_ticket).delete(delete_ticket))
        .route("/tickets/:ticket_id/status", put(update_ticket_status))
        .route("/tickets/:ticket_id/ict-details", put(update_ict_details))
        .route("/tickets/:ticket_id/archive", post(archive_ticket))
        .route("/tickets/:ticket_id/restore", post(restore_ticket))
        .route("/tickets/:ticket_id/send-resolution", post(send_resolution))
        .route("/archive/run", post(run_archive_sweep))
}

/// Converts list query parameters into a repository filter.
pub fn ticket_filter(params: TicketQueryParams) -> Result<TicketFilter, ServiceError> {
    let mut errors = Vec::new();

    let status = match params.status.as_deref().filter(|s| !s.is_empty() && *s != "all") {
        None => None,
        Some(s) => match TicketStatus::from_str(s) {
            Ok(status) => Some(status),
            Err(_) => {
                errors.push(FieldError::new("status", format!("Invalid status: {}", s)));
                None
            }
        },
    };

    let category = match params.category.as_deref().filter(|c| !c.is_empty() && *c != "all") {
        None => None,
        Some(c) => match TicketCategory::from_str(c) {
            Ok(category) => Some(category),
            Err(e) => {
                errors.push(FieldError::new("category", e));
                None
            }
        },
    };

    if !errors.is_empty() {
        return Err(ServiceError::Validation(errors));
    }

    Ok(TicketFilter {
        page: params.page.unwrap_or(1).clamp(1, MAX_PAGE),
        limit: params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        status,
        category,
        search: params
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        archived: params.show_archived,
    })
}

pub async fn get_stats(
    Extension(app_state): Extension<Arc<AppState>>,
    Query(query): Query<StatsQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let stats = app_state.ticket_service.stats(&query).await?;

    Ok(Json(json!({
        "status": "success",
        "data": stats
    })))
}

pub async fn export_tickets(
    Extension(app_state): Extension<Arc<AppState>>,
    Query(query): Query<StatsQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let csv = app_state.ticket_service.export_report(&query).await?;

    Ok((
        [
            (header::CONTENT_TYPE, REPORT_CONTENT_TYPE),
            (header::CONTENT_DISPOSITION, REPORT_DISPOSITION),
        ],
        csv,
    ))
}

pub async fn export_all_tickets(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    export_tickets(Extension(app_state), Query(StatsQuery::default())).await
}

pub async fn get_tickets(
    Extension(app_state): Extension<Arc<AppState>>,
    Query(params): Query<TicketQueryParams>,
) -> Result<impl IntoResponse, HttpError> {
    let filter = ticket_filter(params)?;
    let (tickets, total) = app_state.ticket_service.list(&filter).await?;
    let total_pages = (total + filter.limit - 1) / filter.limit;

    Ok(Json(json!({
        "status": "success",
        "data": {
            "tickets": tickets,
            "pagination": {
                "page": filter.page,
                "limit": filter.limit,
                "total": total,
                "totalPages": total_pages,
            }
        }
    })))
}

pub async fn get_archived_count(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let count = app_state.ticket_service.count_archived().await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "count": count }
    })))
}

pub async fn get_ticket(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(ticket_id): Path<i32>,
) -> Result<impl IntoResponse, HttpError> {
    let detail = app_state.ticket_service.get_ticket_detail(ticket_id).await?;

    Ok(Json(json!({
        "status": "success",
        "data": detail
    })))
}

pub async fn update_ticket_status(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(admin): Extension<AdminIdentity>,
    Path(ticket_id): Path<i32>,
    Json(body): Json<UpdateStatusDto>,
) -> Result<impl IntoResponse, HttpError> {
    validation::validate_dto(&body)?;

    let change = app_state
        .ticket_service
        .transition_status(ticket_id, body.status.trim(), admin.id, body.comment)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Ticket status updated successfully",
        "data": change
    })))
}

pub async fn update_ict_details(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(ticket_id): Path<i32>,
    Json(body): Json<IctDetailsDto>,
) -> Result<impl IntoResponse, HttpError> {
    validation::validate_dto(&body)?;

    let ticket = app_state
        .ticket_service
        .update_ict_details(ticket_id, body.into())
        .await?;

    Ok(Json(json!({
        "status": "success",
        "data": ticket
    })))
}

pub async fn archive_ticket(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(ticket_id): Path<i32>,
) -> Result<impl IntoResponse, HttpError> {
    let ticket = app_state.ticket_service.archive(ticket_id).await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Ticket archived",
        "data": ticket
    })))
}

pub async fn restore_ticket(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(ticket_id): Path<i32>,
) -> Result<impl IntoResponse, HttpError> {
    let ticket = app_state.ticket_service.restore(ticket_id).await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Ticket restored",
        "data": ticket
    })))
}

pub async fn send_resolution(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(ticket_id): Path<i32>,
) -> Result<impl IntoResponse, HttpError> {
    let ticket = app_state.ticket_service.send_resolution_email(ticket_id).await?;

    Ok(Json(json!({
        "status": "success",
        "message": format!("Resolution email sent to {}", ticket.email)
    })))
}

pub async fn delete_ticket(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(admin): Extension<AdminIdentity>,
    Path(ticket_id): Path<i32>,
) -> Result<impl IntoResponse, HttpError> {
    app_state.ticket_service.delete(ticket_id).await?;
    tracing::info!("Ticket {} deleted by admin {}", ticket_id, admin.id);

    Ok(Json(json!({
        "status": "success",
        "message": "Ticket deleted"
    })))
}

pub async fn run_archive_sweep(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let (archived, purged) = app_state.archive_service.run(Utc::now()).await?;
    let sweep = SweepResponseDto { archived, purged };

    Ok(Json(json!({
        "status": "success",
        "data": sweep
    })))
}
