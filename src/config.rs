use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server configuration
    pub server_port: u16,
    pub cors_allowed_origins: Vec<String>,

    // Database configuration
    pub database_server: String,
    pub database_port: u16,
    pub database_name: String,
    pub database_user: String,
    pub database_password: String,
    pub database_max_connections: u32,
    pub database_min_connections: u32,
    pub database_connection_timeout_secs: u64,

    // Per-operation deadline and transient-fault retry policy
    pub database_operation_timeout_secs: u64,
    pub database_max_retry_attempts: u32,
    pub database_retry_delay_base_ms: u64,

    // JWT configuration
    pub jwt_secret: String,
    pub jwt_duration_hours: i64,
    pub jwt_issuer: String,

    // Logging
    pub enable_request_logging: bool,
    pub log_level: String,

    // Application info
    pub app_name: String,
    pub app_version: String,
    pub company_name: String,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Ok(Self {
            // Server configuration
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "7080".to_string())
                .parse()
                .expect("SERVER_PORT must be a valid port number"),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),

            // Database configuration
            database_server: env::var("DATABASE_SERVER")?,
            database_port: env::var("DATABASE_PORT")
                .unwrap_or_else(|_| "1433".to_string())
                .parse()
                .expect("DATABASE_PORT must be a valid port number"),
            database_name: env::var("DATABASE_NAME")?,
            database_user: env::var("DATABASE_USER")?,
            database_password: env::var("DATABASE_PASSWORD")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .expect("DATABASE_MAX_CONNECTIONS must be a valid number"),
            database_min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .expect("DATABASE_MIN_CONNECTIONS must be a valid number"),
            database_connection_timeout_secs: env::var("DATABASE_CONNECTION_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .expect("DATABASE_CONNECTION_TIMEOUT_SECS must be a valid number"),
            database_operation_timeout_secs: env::var("DATABASE_OPERATION_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .expect("DATABASE_OPERATION_TIMEOUT_SECS must be a valid number"),
            database_max_retry_attempts: env::var("DATABASE_MAX_RETRY_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .expect("DATABASE_MAX_RETRY_ATTEMPTS must be a valid number"),
            database_retry_delay_base_ms: env::var("DATABASE_RETRY_DELAY_BASE_MS")
                .unwrap_or_else(|_| "200".to_string())
                .parse()
                .expect("DATABASE_RETRY_DELAY_BASE_MS must be a valid number"),

            // JWT configuration
            jwt_secret: env::var("JWT_SECRET")?,
            jwt_duration_hours: env::var("JWT_DURATION_HOURS")
                .unwrap_or_else(|_| "168".to_string())
                .parse()
                .expect("JWT_DURATION_HOURS must be a valid number"),
            jwt_issuer: env::var("JWT_ISSUER")
                .unwrap_or_else(|_| "YarnInventory".to_string()),

            // Logging
            enable_request_logging: env::var("ENABLE_REQUEST_LOGGING")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            // Application info
            app_name: env::var("APP_NAME")
                .unwrap_or_else(|_| "Yarn Inventory System".to_string()),
            app_version: env::var("APP_VERSION").unwrap_or_else(|_| "1.0.0".to_string()),
            company_name: env::var("COMPANY_NAME")
                .unwrap_or_else(|_| "Vanik Textiles".to_string()),
        })
    }

    pub fn database_connection_string(&self) -> String {
        format!(
            "server=tcp:{},{};database={};user={};password={};TrustServerCertificate=true",
            self.database_server,
            self.database_port,
            self.database_name,
            self.database_user,
            self.database_password
        )
    }

    /// Retry policy handed to the database layer.
    pub fn retry_settings(&self) -> crate::db::RetrySettings {
        crate::db::RetrySettings {
            max_attempts: self.database_max_retry_attempts,
            delay_base: std::time::Duration::from_millis(self.database_retry_delay_base_ms),
            operation_timeout: std::time::Duration::from_secs(self.database_operation_timeout_secs),
        }
    }
}
