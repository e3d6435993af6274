//! Configuration module for the org chart backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Hierarchy levels expanded by default in tree responses
    pub default_depth_window: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_psk = env::var("ORGCHART_API_PSK").ok();

        let db_path = env::var("ORGCHART_DB_PATH")
            .unwrap_or_else(|_| "./data/app.sqlite".to_string())
            .into();

        let bind_addr = env::var("ORGCHART_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .expect("Invalid ORGCHART_BIND_ADDR format");

        let log_level = env::var("ORGCHART_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let default_depth_window = env::var("ORGCHART_DEFAULT_DEPTH")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(crate::hierarchy::DEFAULT_DEPTH_WINDOW);

        Self {
            api_psk,
            db_path,
            bind_addr,
            log_level,
            default_depth_window,
        }
    }
}
