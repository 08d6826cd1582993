//! Configuration module for the Club Hub backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the remote tree; the in-memory store is used when unset
    pub database_url: Option<String>,
    /// Auth token sent with every remote tree request
    pub database_auth: Option<String>,
    /// Path to the SQLite file backing local session storage
    pub session_db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Timeout for a single remote tree round trip
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let database_url = env::var("CLUBHUB_DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let database_auth = env::var("CLUBHUB_DATABASE_AUTH").ok();

        let session_db_path = env::var("CLUBHUB_SESSION_DB_PATH")
            .unwrap_or_else(|_| "./data/session.sqlite".to_string())
            .into();

        let bind_addr = env::var("CLUBHUB_BIND_ADDR")
            .ok()
            .and_then(|addr| match addr.parse() {
                Ok(parsed) => Some(parsed),
                Err(_) => {
                    eprintln!("Invalid CLUBHUB_BIND_ADDR {:?}, using default", addr);
                    None
                }
            })
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8080)));

        let log_level = env::var("CLUBHUB_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_json = env::var("CLUBHUB_LOG_FORMAT")
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let request_timeout = env::var("CLUBHUB_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|secs| secs.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        Self {
            database_url,
            database_auth,
            session_db_path,
            bind_addr,
            log_level,
            log_json,
            request_timeout,
        }
    }
}
