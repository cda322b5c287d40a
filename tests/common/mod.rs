//! Shared harness: a real agent bound to an ephemeral local port.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::task::JoinHandle;

use agentx::api;
use agentx::api::auth::BearerToken;
use agentx::app_state::AppState;
use agentx::rpc::{Dispatcher, MethodSet, RpcService, ServiceRegistry};
use agentx::service::SystemService;

/// Arithmetic test service.
#[derive(Debug)]
pub struct Arith;

#[derive(Debug, Deserialize)]
pub struct Operands {
    pub a: i64,
    pub b: i64,
}

impl Arith {
    async fn add(self: Arc<Self>, ops: Operands) -> Result<i64, Infallible> {
        Ok(ops.a + ops.b)
    }

    async fn divide(self: Arc<Self>, ops: Operands) -> Result<i64, String> {
        if ops.b == 0 {
            return Err("divide by zero".to_string());
        }
        Ok(ops.a / ops.b)
    }

    async fn sleep(self: Arc<Self>, millis: u64) -> Result<u64, Infallible> {
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(millis)
    }
}

impl RpcService for Arith {
    fn methods(set: &mut MethodSet<Self>) {
        set.with_params("Add", Self::add)
            .with_params("Divide", Self::divide)
            .with_params("Sleep", Self::sleep);
    }
}

/// Running server; aborted on drop.
#[derive(Debug)]
pub struct TestServer {
    pub addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{path}", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn registry() -> ServiceRegistry {
    let mut registry = ServiceRegistry::new();
    let Ok(_) = registry
        .register(SystemService::new(), "system")
        .and_then(|r| r.register(Arith, "arith"))
    else {
        panic!("registration failed");
    };
    registry
}

/// Starts an agent on `127.0.0.1:0`, optionally behind a bearer token.
pub async fn spawn(token: Option<&str>) -> TestServer {
    let mut state = AppState::new(Arc::new(Dispatcher::new(registry())));
    if let Some(token) = token {
        state = state.with_auth(Arc::new(BearerToken::new(token)));
    }
    let app = api::build_app(state);

    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    TestServer { addr, handle }
}

/// Parses a response body as JSON.
pub fn json(body: &str) -> serde_json::Value {
    let Ok(value) = serde_json::from_str(body) else {
        panic!("response is not JSON: {body}");
    };
    value
}
