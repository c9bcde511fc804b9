// config.rs
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. When unset, `memory_store` has to be on.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub port: u16,
    pub log_level: String,
    pub cors_origins: Vec<String>,
    pub upload_dir: String,
    /// Honour `x-forwarded-for` when keying the rate limiter. Only safe behind
    /// a reverse proxy that sets the header.
    pub trust_proxy_headers: bool,
    /// Run on the in-memory store when `DATABASE_URL` is unset.
    pub memory_store: bool,
    // Submission rate limiting
    pub rate_limit_max_attempts: usize,
    pub rate_limit_window_minutes: i64,
    pub rate_limit_cooldown_minutes: i64,
    // Archival policy
    pub archive_after_days: i64,
    pub purge_after_days: i64,
    pub archive_interval_hours: u64,
    // Email service configurations
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub sender_name: String,
    pub sender_email: String,
    pub email_notifications: bool,
}

/// Backing store picked at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreKind {
    Postgres(String),
    Memory,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn init() -> Result<Config, String> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        let jwt_secret = std::env::var("JWT_SECRET_KEY")
            .map_err(|_| "JWT_SECRET_KEY must be set".to_string())?;

        let cors_origins = env_string("CORS_ORIGINS", "http://localhost:5173,http://localhost:3000")
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        // Email service configurations (with defaults)
        let smtp_username = env_string("SMTP_USERNAME", "");
        let sender_email = std::env::var("SENDER_EMAIL").unwrap_or_else(|_| smtp_username.clone());

        Ok(Config {
            database_url,
            jwt_secret,
            port: env_or("PORT", 8000),
            log_level: env_string("LOG_LEVEL", "debug"),
            cors_origins,
            upload_dir: env_string("UPLOAD_DIR", "./uploads/documents"),
            trust_proxy_headers: env_or("TRUST_PROXY_HEADERS", false),
            memory_store: env_or("HELPDESK_MEMORY_STORE", false),
            rate_limit_max_attempts: env_or("RATE_LIMIT_MAX_ATTEMPTS", 5),
            rate_limit_window_minutes: env_or("RATE_LIMIT_WINDOW_MINUTES", 60),
            rate_limit_cooldown_minutes: env_or("RATE_LIMIT_COOLDOWN_MINUTES", 60),
            archive_after_days: env_or("ARCHIVE_AFTER_DAYS", 2),
            purge_after_days: env_or("PURGE_AFTER_DAYS", 7),
            archive_interval_hours: env_or("ARCHIVE_INTERVAL_HOURS", 24),
            smtp_host: env_string("SMTP_HOST", "smtp.gmail.com"),
            smtp_port: env_or("SMTP_PORT", 587),
            smtp_username,
            smtp_password: env_string("SMTP_PASSWORD", ""),
            sender_name: env_string("SENDER_NAME", "SDO Imus City Support"),
            sender_email,
            email_notifications: env_or("EMAIL_NOTIFICATIONS", true),
        })
    }

    /// Postgres when `DATABASE_URL` is set. The in-memory store must be asked
    /// for explicitly, since it loses every ticket on restart.
    pub fn store_kind(&self) -> Result<StoreKind, String> {
        match (&self.database_url, self.memory_store) {
            (Some(url), _) => Ok(StoreKind::Postgres(url.clone())),
            (None, true) => Ok(StoreKind::Memory),
            (None, false) => Err(
                "DATABASE_URL must be set, or HELPDESK_MEMORY_STORE=true to run on the in-memory store"
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Config {
        Config {
            database_url: None,
            jwt_secret: "test-secret".to_string(),
            port: 0,
            log_level: "debug".to_string(),
            cors_origins: vec![],
            upload_dir: std::env::temp_dir()
                .join("helpdesk-test-uploads")
                .to_string_lossy()
                .into_owned(),
            trust_proxy_headers: false,
            memory_store: true,
            rate_limit_max_attempts: 5,
            rate_limit_window_minutes: 60,
            rate_limit_cooldown_minutes: 60,
            archive_after_days: 2,
            purge_after_days: 7,
            archive_interval_hours: 24,
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            sender_name: "Helpdesk".to_string(),
            sender_email: String::new(),
            email_notifications: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_kind_requires_database_or_opt_in() {
        let mut config = Config::for_tests();
        config.memory_store = false;
        assert!(config.store_kind().is_err());

        config.memory_store = true;
        assert_eq!(config.store_kind(), Ok(StoreKind::Memory));

        config.database_url = Some("postgres://localhost/helpdesk".to_string());
        assert_eq!(
            config.store_kind(),
            Ok(StoreKind::Postgres("postgres://localhost/helpdesk".to_string()))
        );
    }
}
