//! Header-based transport selection.

use axum::http::HeaderMap;
use axum::http::header::{CONNECTION, SEC_WEBSOCKET_VERSION, UPGRADE};

/// Transport an inbound request is served on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Single request/response exchange.
    Http,
    /// Persistent WebSocket stream of calls.
    WebSocket,
}

impl Transport {
    /// Classifies a request by its headers.
    ///
    /// WebSocket requires all of `Upgrade: websocket`, `Connection: upgrade`
    /// and `Sec-WebSocket-Version: 13`, each compared case-insensitively
    /// against the whole header value. Anything else is HTTP.
    #[must_use]
    pub fn classify(headers: &HeaderMap) -> Self {
        let is_ws = header_is(headers, &UPGRADE, "websocket")
            && header_is(headers, &CONNECTION, "upgrade")
            && header_is(headers, &SEC_WEBSOCKET_VERSION, "13");
        if is_ws { Self::WebSocket } else { Self::Http }
    }
}

fn header_is(headers: &HeaderMap, name: &axum::http::HeaderName, expected: &str) -> bool {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case(expected))
}
