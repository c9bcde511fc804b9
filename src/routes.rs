// routes.rs
use std::sync::Arc;

use axum::{middleware, routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{
        admin::admin_tickets_handler,
        notifications::notifications_handler,
        settings::settings_handler,
        tickets::{public_settings_handler, tickets_handler},
    },
    middleware::{admin_only, auth},
    AppState,
};

// Health check handler
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let admin_routes = Router::new()
        .merge(admin_tickets_handler())
        .nest("/settings", settings_handler())
        .nest("/notifications", notifications_handler())
        .layer(middleware::from_fn(admin_only))
        .layer(middleware::from_fn(auth));

    let api_route = Router::new()
        .nest("/tickets", tickets_handler())
        .nest("/settings", public_settings_handler())
        .nest("/admin", admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_route)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use chrono::Utc;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::Config,
        db::{memorydb::MemoryDB, notificationdb::NotificationExt, ticketdb::TicketExt},
        models::{notificationmodel::NotificationType, ticketmodel::TicketStatus},
        utils::token::create_token,
    };

    struct TestApp {
        db: Arc<MemoryDB>,
        router: Router,
    }

    fn test_app() -> TestApp {
        test_app_with(Config::for_tests())
    }

    fn test_app_with(config: Config) -> TestApp {
        let db = Arc::new(MemoryDB::new());
        let app_state = Arc::new(AppState::new(db.clone(), config));
        TestApp {
            db,
            router: create_router(app_state),
        }
    }

    fn admin_token(role: &str) -> String {
        create_token(1, role, Some("ict@example.com"), b"test-secret", 3600).unwrap()
    }

    fn technical_assistance() -> Value {
        json!({
            "category": "TECHNICAL_ASSISTANCE",
            "name": "Ana",
            "email": "ana@school.edu",
            "priority": "HIGH",
            "taType": "ICT_TUTORIAL",
            "location": "SCHOOL_IMUS_CITY",
            "schoolLevel": "Elementary",
            "schoolName": "Imus Pilot ES",
            "subject": "Training",
            "message": "Need tutorial"
        })
    }

    async fn send(router: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "10.0.0.1");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        router.clone().oneshot(request).await.unwrap()
    }

    async fn submit_forwarded_for(router: &Router, forwarded_for: &str) -> Response {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/tickets")
            .header("x-forwarded-for", forwarded_for)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(technical_assistance().to_string()))
            .unwrap();
        router.clone().oneshot(request).await.unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = test_app();
        let response = send(&app.router, Method::GET, "/health", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_submission_returns_tracking_id_and_notifies_admins() {
        let app = test_app();
        let response = send(
            &app.router,
            Method::POST,
            "/api/tickets",
            None,
            Some(technical_assistance()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_json(response).await;
        let data = &body["data"];
        let ticket_id = data["ticketId"].as_i64().unwrap();
        let expected = format!("{}-{}", Utc::now().format("%Y%m%d"), ticket_id);
        assert_eq!(data["trackingId"], json!(expected));
        assert_eq!(data["ticket"]["status"], json!("PENDING"));
        assert_eq!(data["ticket"]["categorySpecificDetails"]["type"], json!("Technical Assistance"));
        assert_eq!(data["rateLimitInfo"]["remainingAttempts"], json!(4));

        let notifications = app.db.get_admin_notifications(1, 50).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].notification_type, NotificationType::NewTicket);
        assert_eq!(notifications[0].recipient_id, None);
        assert!(!notifications[0].read);
    }

    #[tokio::test]
    async fn test_category_route_submission() {
        let app = test_app();
        let mut body = technical_assistance();
        body.as_object_mut().unwrap().remove("category");

        let response = send(
            &app.router,
            Method::POST,
            "/api/tickets/technical-assistance",
            None,
            Some(body.clone()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = send(&app.router, Method::POST, "/api/tickets/hardware-loan", None, Some(body)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_resolving_records_update_archives_and_notifies() {
        let app = test_app();
        let body = body_json(
            send(&app.router, Method::POST, "/api/tickets", None, Some(technical_assistance())).await,
        )
        .await;
        let ticket_id = body["data"]["ticketId"].as_i64().unwrap() as i32;

        let token = admin_token("admin");
        let response = send(
            &app.router,
            Method::PUT,
            &format!("/api/admin/tickets/{}/status", ticket_id),
            Some(&token),
            Some(json!({ "status": "RESOLVED", "comment": "Tutorial scheduled" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let ticket = app.db.get_ticket(ticket_id).await.unwrap().unwrap();
        assert_eq!(ticket.status, TicketStatus::Resolved);
        assert!(ticket.archived);
        assert!(ticket.archived_at.is_some());

        let updates = app.db.get_ticket_updates(ticket_id).await.unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].previous_status, TicketStatus::Pending);
        assert_eq!(updates[0].new_status, TicketStatus::Resolved);
        assert_eq!(updates[0].admin_id, 1);

        let status_updates: Vec<_> = app
            .db
            .get_admin_notifications(1, 50)
            .await
            .unwrap()
            .into_iter()
            .filter(|n| n.notification_type == NotificationType::StatusUpdate)
            .collect();
        assert_eq!(status_updates.len(), 1);
        assert_eq!(status_updates[0].ticket_id, Some(ticket_id));
    }

    #[tokio::test]
    async fn test_sixth_submission_is_throttled() {
        let app = test_app();
        for _ in 0..5 {
            let response =
                send(&app.router, Method::POST, "/api/tickets", None, Some(technical_assistance())).await;
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = send(&app.router, Method::POST, "/api/tickets", None, Some(technical_assistance())).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(response).await;
        assert_eq!(body["rateLimitInfo"]["remainingAttempts"], json!(0));
        assert_eq!(body["rateLimitInfo"]["isBlocked"], json!(true));

        let response = send(
            &app.router,
            Method::GET,
            "/api/tickets/rate-limit?email=ana@school.edu",
            None,
            None,
        )
        .await;
        let body = body_json(response).await;
        assert_eq!(body["data"]["isBlocked"], json!(true));
    }

    #[tokio::test]
    async fn test_rotating_forwarded_for_does_not_reset_the_limit() {
        let app = test_app();
        for i in 0..5 {
            let response = submit_forwarded_for(&app.router, &format!("203.0.113.{}", i)).await;
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = submit_forwarded_for(&app.router, "203.0.113.99").await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_trusted_proxy_keys_on_last_forwarded_hop() {
        let mut config = Config::for_tests();
        config.trust_proxy_headers = true;
        let app = test_app_with(config);

        for i in 0..5 {
            let forwarded = format!("198.51.100.{}, 10.0.0.7", i);
            let response = submit_forwarded_for(&app.router, &forwarded).await;
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = submit_forwarded_for(&app.router, "198.51.100.99, 10.0.0.7").await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let response = submit_forwarded_for(&app.router, "10.0.0.8").await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_invalid_submission_lists_field_errors() {
        let app = test_app();
        let mut body = technical_assistance();
        body["subject"] = json!("");
        body["taType"] = json!("COFFEE");

        let response = send(&app.router, Method::POST, "/api/tickets", None, Some(body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["status"], json!("fail"));
        let fields: Vec<&str> = body["errors"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|e| e["field"].as_str())
            .collect();
        assert!(fields.contains(&"subject"));
        assert!(fields.contains(&"taType"));
    }

    #[tokio::test]
    async fn test_tracking_lookup() {
        let app = test_app();
        let body = body_json(
            send(&app.router, Method::POST, "/api/tickets", None, Some(technical_assistance())).await,
        )
        .await;
        let tracking_id = body["data"]["trackingId"].as_str().unwrap().to_string();

        let response = send(
            &app.router,
            Method::POST,
            "/api/tickets/track",
            None,
            Some(json!({ "trackingId": tracking_id, "email": "ana@school.edu" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(
            &app.router,
            Method::POST,
            "/api/tickets/track",
            None,
            Some(json!({ "trackingId": "20240101-999", "email": "ana@school.edu" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(
            &app.router,
            Method::POST,
            "/api/tickets/track",
            None,
            Some(json!({ "trackingId": "999", "email": "ana@school.edu" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admin_routes_require_admin_token() {
        let app = test_app();

        let response = send(&app.router, Method::GET, "/api/admin/tickets", None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(&app.router, Method::GET, "/api/admin/tickets", Some("garbage"), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let token = admin_token("teacher");
        let response = send(&app.router, Method::GET, "/api/admin/tickets", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let token = admin_token("admin");
        let response = send(&app.router, Method::GET, "/api/admin/tickets", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_errors_map_to_statuses() {
        let app = test_app();
        let token = admin_token("admin");

        let response = send(&app.router, Method::GET, "/api/admin/tickets/404", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(
            &app.router,
            Method::GET,
            "/api/admin/tickets?status=DONE",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(
            send(&app.router, Method::POST, "/api/tickets", None, Some(technical_assistance())).await,
        )
        .await;
        let ticket_id = body["data"]["ticketId"].as_i64().unwrap();

        let response = send(
            &app.router,
            Method::PUT,
            &format!("/api/admin/tickets/{}/status", ticket_id),
            Some(&token),
            Some(json!({ "status": "REOPENED" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["errors"][0]["field"], json!("status"));
    }

    #[tokio::test]
    async fn test_ticket_list_accepts_huge_page_number() {
        let app = test_app();
        let token = admin_token("admin");
        let response = send(
            &app.router,
            Method::GET,
            "/api/admin/tickets?page=9223372036854775807&limit=100",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["data"]["tickets"], json!([]));
        assert_eq!(body["data"]["pagination"]["page"], json!(1_000_000));
    }

    #[tokio::test]
    async fn test_export_returns_csv_attachment() {
        let app = test_app();
        let response = send(&app.router, Method::POST, "/api/tickets", None, Some(technical_assistance())).await;
        let body = body_json(response).await;
        let tracking = body["data"]["trackingId"].as_str().unwrap().to_string();

        let response = send(&app.router, Method::GET, "/api/admin/tickets/export", None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let token = admin_token("admin");
        for uri in ["/api/admin/tickets/export?time_period=weekly", "/api/admin/tickets/all"] {
            let response = send(&app.router, Method::GET, uri, Some(&token), None).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                response.headers()[header::CONTENT_TYPE],
                "text/csv; charset=utf-8"
            );
            assert!(response.headers()[header::CONTENT_DISPOSITION]
                .to_str()
                .unwrap()
                .contains("tickets_report.csv"));

            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let csv = String::from_utf8(bytes.to_vec()).unwrap();
            assert!(csv.starts_with("Tracking ID,"));
            assert!(csv.contains(&tracking));
        }
    }

    #[tokio::test]
    async fn test_settings_hide_smtp_password_and_toggle_categories() {
        let app = test_app();
        let token = admin_token("admin");

        let response = send(
            &app.router,
            Method::POST,
            "/api/admin/settings/email",
            Some(&token),
            Some(json!({
                "smtpHost": "smtp.gmail.com",
                "smtpPort": 587,
                "smtpUser": "support@example.com",
                "smtpPassword": "app-password",
                "senderName": "IT Support",
                "senderEmail": "support@example.com",
                "enableNotifications": false
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(send(&app.router, Method::GET, "/api/admin/settings", Some(&token), None).await).await;
        assert_ne!(body["data"]["email"]["smtpPassword"], json!("app-password"));

        let response = send(
            &app.router,
            Method::POST,
            "/api/admin/settings/categories",
            Some(&token),
            Some(json!({
                "ticketCategories": [
                    { "id": 1, "name": "TROUBLESHOOTING", "active": true },
                    { "id": 2, "name": "ACCOUNT_MANAGEMENT", "active": true },
                    { "id": 3, "name": "DOCUMENT_UPLOAD", "active": true },
                    { "id": 4, "name": "TECHNICAL_ASSISTANCE", "active": false }
                ]
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(send(&app.router, Method::GET, "/api/settings/categories", None, None).await).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 3);

        let response = send(&app.router, Method::POST, "/api/tickets", None, Some(technical_assistance())).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_notifications_read_and_clear() {
        let app = test_app();
        let token = admin_token("admin");
        send(&app.router, Method::POST, "/api/tickets", None, Some(technical_assistance())).await;

        let body = body_json(send(&app.router, Method::GET, "/api/admin/notifications", Some(&token), None).await).await;
        assert_eq!(body["data"]["unreadCount"], json!(1));
        let id = body["data"]["notifications"][0]["id"].as_i64().unwrap();

        let response = send(
            &app.router,
            Method::PUT,
            &format!("/api/admin/notifications/{}/read", id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app.router, Method::PUT, "/api/admin/notifications/999/read", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&app.router, Method::POST, "/api/admin/notifications/clear-all", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(app.db.get_admin_notifications(1, 50).await.unwrap().is_empty());
    }
}
