//! Server configuration
//!
//! Every setting can be overridden through environment variables:
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | WORK_DIR | /var/lib/market | Working directory (database, logs) |
//! | HTTP_PORT | 3000 | HTTP API port |
//! | ENVIRONMENT | development | development \| staging \| production |
//! | REQUEST_TIMEOUT_MS | 30000 | Per-request timeout |
//! | DB_TIMEOUT_MS | 5000 | Per-database-call timeout |
//! | JWT_SECRET / JWT_ISSUER / JWT_AUDIENCE / JWT_EXPIRATION_MINUTES | see auth | Token settings |

use std::path::PathBuf;
use std::time::Duration;

use crate::auth::JwtConfig;

#[derive(Debug, Clone)]
pub struct Config {
    /// Working directory holding the database and log files
    pub work_dir: String,
    pub http_port: u16,
    pub jwt: JwtConfig,
    /// development | staging | production
    pub environment: String,
    /// HTTP request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Database call timeout in milliseconds
    pub db_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables, with defaults.
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/market".into()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            jwt: JwtConfig::default(),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            request_timeout_ms: std::env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(30000),
            db_timeout_ms: std::env::var("DB_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5000),
        }
    }

    /// Override the working directory and port (test scenarios).
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    /// Bound on any single database call
    pub fn db_timeout(&self) -> Duration {
        Duration::from_millis(self.db_timeout_ms)
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("data")
    }

    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
