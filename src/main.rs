//! agentx server entry point.
//!
//! Registers the built-in services and serves them over HTTP and WebSocket.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use agentx::api;
use agentx::api::auth::{AllowAll, AuthGate, BearerToken};
use agentx::app_state::AppState;
use agentx::config::{AgentConfig, LogFormat};
use agentx::rpc::{Dispatcher, ServiceRegistry};
use agentx::service;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = AgentConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting agentx");

    // Build the registry once; it is read-only from here on
    let mut registry = ServiceRegistry::new();
    service::register_defaults(&mut registry)?;
    tracing::debug!(methods = ?registry.method_names(), "services registered");
    let dispatcher = Arc::new(Dispatcher::new(registry));

    let auth: Arc<dyn AuthGate> = match &config.auth_token {
        Some(token) => Arc::new(BearerToken::new(token.clone())),
        None => {
            tracing::warn!("AUTH_TOKEN not set, accepting every connection");
            Arc::new(AllowAll)
        }
    };

    let state = AppState::new(dispatcher)
        .with_auth(auth)
        .with_max_body_bytes(config.max_body_bytes);
    let app = api::build_app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for shutdown signal");
    }
}
