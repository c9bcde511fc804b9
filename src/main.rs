mod models;
mod service;
mod config;
mod dtos;
mod error;
mod db;
mod utils;
mod middleware;
mod mail;
mod handler;
mod routes;

use std::{net::SocketAddr, str::FromStr, sync::Arc};

use axum::http::{header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE}, HeaderValue, Method};
use config::{Config, StoreKind};
use db::{db::DBClient, memorydb::MemoryDB, HelpdeskStore};
use dotenv::dotenv;
use routes::create_router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::filter::LevelFilter;

use service::{
    archive_service::ArchiveService,
    file_store::FileStore,
    notification_service::NotificationService,
    rate_limiter::RateLimiter,
    settings::SettingsStore,
    ticket_service::TicketService,
};

#[derive(Debug, Clone)]
pub struct AppState {
    pub env: Config,
    pub db_client: Arc<dyn HelpdeskStore>,
    pub settings: Arc<SettingsStore>,
    pub rate_limiter: Arc<RateLimiter>,
    pub file_store: Arc<FileStore>,
    // Services
    pub notification_service: Arc<NotificationService>,
    pub ticket_service: Arc<TicketService>,
    pub archive_service: Arc<ArchiveService>,
}

impl AppState {
    pub fn new(db_client: Arc<dyn HelpdeskStore>, config: Config) -> Self {
        let settings = Arc::new(SettingsStore::from_config(&config));
        let rate_limiter = Arc::new(RateLimiter::from_config(&config));
        let file_store = Arc::new(FileStore::new(config.upload_dir.clone()));

        let notification_service = Arc::new(NotificationService::new(
            db_client.clone(),
            settings.clone(),
        ));

        let ticket_service = Arc::new(TicketService::new(
            db_client.clone(),
            settings.clone(),
            rate_limiter.clone(),
            notification_service.clone(),
            file_store.clone(),
        ));

        let archive_service = Arc::new(ArchiveService::new(
            db_client.clone(),
            file_store.clone(),
            &config,
        ));

        Self {
            env: config,
            db_client,
            settings,
            rate_limiter,
            file_store,
            notification_service,
            ticket_service,
            archive_service,
        }
    }
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    let config = match Config::init() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::from_str(&config.log_level).unwrap_or(LevelFilter::DEBUG))
        .init();

    let store_kind = match config.store_kind() {
        Ok(store_kind) => store_kind,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    let db_client: Arc<dyn HelpdeskStore> = match store_kind {
        StoreKind::Postgres(database_url) => {
            let pool = match PgPoolOptions::new()
                .max_connections(10)
                .connect(&database_url)
                .await
            {
                Ok(pool) => {
                    tracing::info!("Connection to the database is successful");
                    pool
                }
                Err(err) => {
                    tracing::error!("Failed to connect to the database: {:?}", err);
                    std::process::exit(1);
                }
            };

            let db_client = DBClient::new(pool);
            if let Err(err) = db_client.run_migrations().await {
                tracing::error!("Failed to run migrations: {}", err);
                std::process::exit(1);
            }
            Arc::new(db_client)
        }
        StoreKind::Memory => {
            tracing::warn!("HELPDESK_MEMORY_STORE is set, tickets are kept in memory and lost on restart");
            Arc::new(MemoryDB::new())
        }
    };

    let allowed_origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE]);

    let app_state = Arc::new(AppState::new(db_client, config.clone()));

    let app = create_router(app_state.clone()).layer(cors);

    // Start background jobs
    let app_state_clone = app_state.clone();
    tokio::spawn(async move {
        service::background_jobs::start_archival_job(app_state_clone).await;
    });

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", &config.port)).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("Failed to bind port {}: {}", config.port, err);
            std::process::exit(1);
        }
    };

    tracing::info!("Server is running on http://localhost:{}", config.port);

    if let Err(err) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        tracing::error!("Server error: {}", err);
    }
}
