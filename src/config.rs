//! Agent configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).

use std::net::SocketAddr;

/// Default HTTP body read limit (10 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Top-level agent configuration.
///
/// Loaded once at startup via [`AgentConfig::from_env`].
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Socket address to bind the server to (e.g. `0.0.0.0:8080`).
    pub listen_addr: SocketAddr,

    /// Maximum accepted HTTP request body, in bytes.
    pub max_body_bytes: usize,

    /// Shared secret for the bearer-token auth gate. `None` allows every
    /// connection.
    pub auth_token: Option<String>,

    /// Log output format.
    pub log_format: LogFormat,
}

impl AgentConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()?;

        let max_body_bytes = parse_env("MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES);

        let auth_token = std::env::var("AUTH_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());

        let log_format = parse_log_format(std::env::var("LOG_FORMAT").ok().as_deref());

        Ok(Self {
            listen_addr,
            max_body_bytes,
            auth_token,
            log_format,
        })
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// `"json"` (case-insensitive) selects JSON output; anything else is pretty.
fn parse_log_format(value: Option<&str>) -> LogFormat {
    match value {
        Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
        _ => LogFormat::Pretty,
    }
}
