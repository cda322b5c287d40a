//! Inbound connection handling: transport selection, auth gate and the
//! HTTP adapter.
//!
//! Every path accepts `GET`, `POST` and `OPTIONS`. A request is classified
//! by its headers, checked by the [`auth::AuthGate`], then handed to the
//! HTTP adapter ([`http`]) or upgraded to the WebSocket adapter
//! ([`crate::ws`]). Both adapters feed the same [`crate::rpc::Dispatcher`].

pub mod auth;
pub mod http;
pub mod transport;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::Method;
use axum::response::Response;
use axum::routing::{MethodRouter, get};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use transport::Transport;

/// Builds the router with the RPC endpoint mounted on every path.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .route("/", endpoint())
        .route("/{*path}", endpoint())
}

/// Builds the complete application: router, tracing layer and state.
pub fn build_app(state: AppState) -> Router {
    build_router()
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

fn endpoint() -> MethodRouter<AppState> {
    get(serve).post(serve).options(serve)
}

/// Entry point for every inbound request.
pub async fn serve(State(state): State<AppState>, request: Request) -> Response {
    let (mut parts, body) = request.into_parts();

    if parts.method == Method::OPTIONS {
        return http::preflight();
    }

    let transport = Transport::classify(&parts.headers);

    if !state.auth.authorize(&parts) {
        tracing::warn!(uri = %parts.uri, ?transport, "auth fail");
        return http::access_denied();
    }

    match transport {
        Transport::WebSocket => crate::ws::handler::upgrade(&mut parts, &state).await,
        Transport::Http => http::serve_http(&state, body).await,
    }
}
