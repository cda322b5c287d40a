//! `system` service: clock, liveness and build information.

use std::convert::Infallible;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::rpc::{MethodSet, RpcService};

/// Host and process information returned by `system.Info`.
#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    /// Operating system family (`linux`, `macos`, ...).
    pub os: &'static str,
    /// CPU architecture.
    pub arch: &'static str,
    /// Agent version.
    pub version: &'static str,
    /// When this service instance was created.
    pub started_at: DateTime<Utc>,
    /// Seconds since `started_at`.
    pub uptime_secs: i64,
}

/// Receiver for the `system` service.
#[derive(Debug, Clone)]
pub struct SystemService {
    started_at: DateTime<Utc>,
}

impl SystemService {
    /// Creates the service, recording the start time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
        }
    }

    /// `system.Time`: current unix time in seconds, as a decimal string.
    async fn time(self: Arc<Self>) -> Result<String, Infallible> {
        Ok(Utc::now().timestamp().to_string())
    }

    /// `system.Ping`: liveness check.
    async fn ping(self: Arc<Self>) -> Result<&'static str, Infallible> {
        Ok("pong")
    }

    /// `system.Info`: platform and uptime.
    async fn info(self: Arc<Self>) -> Result<SystemInfo, Infallible> {
        let now = Utc::now();
        Ok(SystemInfo {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            version: env!("CARGO_PKG_VERSION"),
            started_at: self.started_at,
            uptime_secs: (now - self.started_at).num_seconds().max(0),
        })
    }
}

impl Default for SystemService {
    fn default() -> Self {
        Self::new()
    }
}

impl RpcService for SystemService {
    fn methods(set: &mut MethodSet<Self>) {
        set.without_params("Time", Self::time)
            .without_params("Ping", Self::ping)
            .without_params("Info", Self::info);
    }
}
