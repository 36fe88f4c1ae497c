//! Configuration module for downtrack.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;

/// Seconds in the default rolling week.
pub const DEFAULT_ROLLING_WINDOW_SECONDS: i64 = 604800;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the report API (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "downtrack.db")
    pub db_path: String,
    /// Trailing window for SLA aggregation in seconds (default: 7 days)
    pub rolling_window_seconds: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "downtrack.db".to_string(),
            rolling_window_seconds: DEFAULT_ROLLING_WINDOW_SECONDS,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `DOWNTRACK_HTTP_PORT`: HTTP port (default: 8080)
    /// - `DOWNTRACK_DB_PATH`: Database file path (default: "downtrack.db")
    /// - `DOWNTRACK_ROLLING_WINDOW`: SLA window in seconds (default: 604800)
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(port_str) = env::var("DOWNTRACK_HTTP_PORT") {
            if let Ok(port) = port_str.parse() {
                cfg.http_port = port;
            }
        }

        if let Ok(db_path) = env::var("DOWNTRACK_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Ok(window_str) = env::var("DOWNTRACK_ROLLING_WINDOW") {
            if let Ok(window) = window_str.parse::<i64>() {
                if window > 0 {
                    cfg.rolling_window_seconds = window;
                }
            }
        }

        cfg
    }
}
