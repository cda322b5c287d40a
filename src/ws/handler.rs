//! Axum WebSocket upgrade handler.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};

use super::connection::run_connection;
use crate::app_state::AppState;

/// Upgrades a request already classified as a WebSocket handshake.
///
/// A handshake axum itself rejects is answered with axum's rejection
/// response and never reaches the dispatcher.
pub async fn upgrade(parts: &mut Parts, state: &AppState) -> Response {
    let ws = match WebSocketUpgrade::from_request_parts(parts, state).await {
        Ok(ws) => ws,
        Err(rejection) => {
            tracing::warn!(%rejection, "websocket upgrade rejected");
            return rejection.into_response();
        }
    };

    let dispatcher = Arc::clone(&state.dispatcher);
    ws.on_failed_upgrade(|err| tracing::warn!(%err, "websocket upgrade failed"))
        .on_upgrade(move |socket| run_connection(socket, dispatcher))
}
