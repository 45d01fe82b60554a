//! Application configuration loaded from environment variables.

use std::path::PathBuf;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
/// - `APP_ENV`: deployment environment (default: `"development"`)
/// - `DATABASE_URL`: PostgreSQL URL; unset means the in-memory store
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `ORDER_NUMBER_RETRIES`: fresh numbers tried after a duplicate (default: `3`)
/// - `SEED_FILE`: JSON catalog loaded into the in-memory store
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub app_env: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub order_number_retries: u32,
    pub seed_file: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults for
    /// missing or unparseable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: non_empty("PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: non_empty("LOG_FORMAT")
                .map(|f| LogFormat::parse(&f))
                .unwrap_or(defaults.log_format),
            app_env: non_empty("APP_ENV").unwrap_or(defaults.app_env),
            database_url: non_empty("DATABASE_URL"),
            database_max_connections: non_empty("DATABASE_MAX_CONNECTIONS")
                .and_then(|n| n.trim().parse().ok())
                .unwrap_or(defaults.database_max_connections),
            order_number_retries: non_empty("ORDER_NUMBER_RETRIES")
                .and_then(|n| n.trim().parse().ok())
                .unwrap_or(defaults.order_number_retries),
            seed_file: non_empty("SEED_FILE").map(PathBuf::from),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_production(&self) -> bool {
        self.app_env.trim().eq_ignore_ascii_case("production")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            app_env: "development".to_string(),
            database_url: None,
            database_max_connections: 10,
            order_number_retries: saga::DEFAULT_NUMBER_RETRIES,
            seed_file: None,
        }
    }
}
