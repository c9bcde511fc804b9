// src/handler/notifications.rs
use std::sync::Arc;

use axum::{
    extract::Path,
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde_json::json;

use crate::{error::HttpError, middleware::AdminIdentity, AppState};

pub fn notifications_handler() -> Router {
    Router::new()
        .route("/", get(get_notifications))
        .route("/clear-all", post(clear_notifications))
        .route("/:notification_id/read", put(mark_notification_read))
}

pub async fn get_notifications(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(admin): Extension<AdminIdentity>,
) -> Result<impl IntoResponse, HttpError> {
    let notifications = app_state.notification_service.list_for_admin(admin.id).await?;
    let unread = notifications.iter().filter(|n| !n.read).count();

    Ok(Json(json!({
        "status": "success",
        "data": {
            "notifications": notifications,
            "unreadCount": unread,
        }
    })))
}

pub async fn mark_notification_read(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(notification_id): Path<i32>,
) -> Result<impl IntoResponse, HttpError> {
    let notification = app_state.notification_service.mark_read(notification_id).await?;

    Ok(Json(json!({
        "status": "success",
        "data": notification
    })))
}

pub async fn clear_notifications(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(admin): Extension<AdminIdentity>,
) -> Result<impl IntoResponse, HttpError> {
    let cleared = app_state.notification_service.clear_all(admin.id).await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Notifications cleared",
        "data": { "cleared": cleared }
    })))
}
