//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::api::auth::{AllowAll, AuthGate};
use crate::config::DEFAULT_MAX_BODY_BYTES;
use crate::rpc::Dispatcher;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Dispatcher over the immutable service registry.
    pub dispatcher: Arc<Dispatcher>,
    /// Gate consulted once per inbound connection.
    pub auth: Arc<dyn AuthGate>,
    /// HTTP body read limit in bytes.
    pub max_body_bytes: usize,
}

impl AppState {
    /// Creates state with the allow-all gate and the default body limit.
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            auth: Arc::new(AllowAll),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Replaces the auth gate.
    #[must_use]
    pub fn with_auth(mut self, auth: Arc<dyn AuthGate>) -> Self {
        self.auth = auth;
        self
    }

    /// Replaces the HTTP body read limit.
    #[must_use]
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}
