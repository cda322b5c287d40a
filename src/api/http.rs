//! Single-shot HTTP adapter.
//!
//! Every response carries permissive CORS headers and HTTP status 200;
//! protocol errors travel inside the envelope.

use axum::body::Body;
use axum::http::StatusCode;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE, HeaderName,
};
use axum::response::{IntoResponse, Response};

use crate::app_state::AppState;
use crate::error::DispatchError;
use crate::rpc::Response as Envelope;

const CORS_HEADERS: [(HeaderName, &str); 3] = [
    (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type,Authorization"),
    (ACCESS_CONTROL_ALLOW_METHODS, "POST,OPTIONS"),
];

/// Answers a CORS preflight: headers only, empty body, no dispatch.
#[must_use]
pub fn preflight() -> Response {
    (StatusCode::OK, CORS_HEADERS).into_response()
}

/// Reads the whole body, dispatches it once and writes the envelope back.
///
/// A failed body read is answered with the read error as plain text,
/// without an envelope.
pub async fn serve_http(state: &AppState, body: Body) -> Response {
    let bytes = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(%err, "failed to read request body");
            return (
                StatusCode::OK,
                CORS_HEADERS,
                [(CONTENT_TYPE, "text/plain; charset=utf-8")],
                err.to_string(),
            )
                .into_response();
        }
    };

    let reply = state.dispatcher.call(&bytes).await;
    envelope_response(reply)
}

/// Envelope returned when the auth gate denies a connection.
#[must_use]
pub fn access_denied() -> Response {
    let id = serde_json::value::to_raw_value(&0).ok();
    let envelope = Envelope::failure(id, DispatchError::AccessDenied.into_rpc_error());
    envelope_response(envelope.encode())
}

fn envelope_response(body: String) -> Response {
    (
        StatusCode::OK,
        CORS_HEADERS,
        [(CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}
