//! Transport-agnostic request dispatcher.
//!
//! [`Dispatcher::call`] turns one inbound message into one outbound message.
//! Each lifecycle step either hands off to the next step or ends the call
//! with an error envelope:
//!
//! 1. decode the envelope (parse error, id `null`)
//! 2. check the version tag (invalid request, id echoed)
//! 3. resolve the method (method not found)
//! 4. decode the parameters, if the method declares them (invalid params)
//! 5. invoke (internal error on a failure outcome)
//! 6. encode the response

use serde_json::value::RawValue;

use super::envelope::{Request, Response, VERSION};
use super::registry::ServiceRegistry;
use crate::error::DispatchError;

/// Drives the request lifecycle against an immutable [`ServiceRegistry`].
#[derive(Debug)]
pub struct Dispatcher {
    registry: ServiceRegistry,
}

impl Dispatcher {
    /// Takes ownership of a fully populated registry. No further
    /// registration is possible afterwards.
    #[must_use]
    pub fn new(registry: ServiceRegistry) -> Self {
        Self { registry }
    }

    /// Returns the registry this dispatcher serves.
    #[must_use]
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Dispatches one raw message and returns the encoded response.
    pub async fn call(&self, raw: &[u8]) -> String {
        self.handle(raw).await.encode()
    }

    /// Dispatches one raw message and returns the response envelope.
    pub async fn handle(&self, raw: &[u8]) -> Response {
        let request = match Request::decode(raw) {
            Ok(request) => request,
            Err(err) => return reject(None, DispatchError::Parse(err)),
        };
        let Request {
            jsonrpc,
            method,
            params,
            id,
        } = request;

        if jsonrpc != VERSION {
            return reject(id, DispatchError::InvalidRequest(jsonrpc));
        }

        let (_, entry) = match self.registry.resolve(&method) {
            Ok(found) => found,
            Err(err) => return reject(id, err.into()),
        };

        let invocation = match entry.bind(params.as_deref()) {
            Ok(invocation) => invocation,
            Err(err) => return reject(id, err.into()),
        };

        tracing::debug!(%method, id = display_id(id.as_deref()), "dispatching call");
        match invocation.await {
            Ok(result) => Response::success(id, result),
            Err(message) => reject(id, DispatchError::Internal(message)),
        }
    }
}

fn reject(id: Option<Box<RawValue>>, err: DispatchError) -> Response {
    tracing::warn!(
        code = err.code().as_i32(),
        id = display_id(id.as_deref()),
        error = %err,
        "call failed"
    );
    Response::failure(id, err.into_rpc_error())
}

fn display_id(id: Option<&RawValue>) -> &str {
    id.map_or("null", RawValue::get)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::convert::Infallible;
    use std::sync::Arc;

    use serde::{Deserialize, Serialize};
    use serde_json::{Value, json};

    use super::*;
    use crate::rpc::registry::{MethodSet, RpcService};

    #[derive(Debug, Deserialize)]
    struct Pair {
        a: i64,
        b: i64,
    }

    #[derive(Debug, Serialize)]
    struct Sum {
        total: i64,
    }

    #[derive(Debug)]
    struct Calc;

    impl Calc {
        async fn add(self: Arc<Self>, pair: Pair) -> Result<Sum, Infallible> {
            Ok(Sum {
                total: pair.a + pair.b,
            })
        }

        async fn answer(self: Arc<Self>) -> Result<u32, Infallible> {
            Ok(42)
        }

        async fn broken(self: Arc<Self>) -> Result<Sum, String> {
            Err("disk on fire".to_string())
        }

        async fn nothing(self: Arc<Self>) -> Result<Option<i64>, Infallible> {
            Ok(None)
        }

        async fn unit(self: Arc<Self>) -> Result<(), Infallible> {
            Ok(())
        }
    }

    impl RpcService for Calc {
        fn methods(set: &mut MethodSet<Self>) {
            set.with_params("Add", Self::add)
                .without_params("Answer", Self::answer)
                .without_params("Broken", Self::broken)
                .without_params("Nothing", Self::nothing)
                .without_params("Unit", Self::unit);
        }
    }

    fn dispatcher() -> Dispatcher {
        let mut registry = ServiceRegistry::new();
        let Ok(_) = registry.register(Calc, "calc") else {
            panic!("registration failed");
        };
        Dispatcher::new(registry)
    }

    async fn call_json(dispatcher: &Dispatcher, input: &str) -> Value {
        let out = dispatcher.call(input.as_bytes()).await;
        let Ok(value) = serde_json::from_str(&out) else {
            panic!("response is not json: {out}");
        };
        value
    }

    fn error_code(resp: &Value) -> i64 {
        let Some(code) = resp["error"]["code"].as_i64() else {
            panic!("expected an error response, got {resp}");
        };
        code
    }

    #[tokio::test]
    async fn success_fills_result_only() {
        let d = dispatcher();
        let resp = call_json(&d, r#"{"jsonrpc":"2.0","method":"calc.Add","params":{"a":2,"b":5},"id":7}"#).await;
        assert_eq!(resp["result"], json!({"total": 7}));
        assert!(resp["error"].is_null());
        assert_eq!(resp["id"], 7);
        assert_eq!(resp["jsonrpc"], "2.0");
    }

    #[tokio::test]
    async fn null_results_become_internal_errors() {
        let d = dispatcher();
        for method in ["calc.Nothing", "calc.Unit"] {
            let input = format!(r#"{{"jsonrpc":"2.0","method":"{method}","id":1}}"#);
            let resp = call_json(&d, &input).await;
            assert_eq!(error_code(&resp), -32603, "{method}");
            assert_eq!(resp["error"]["message"], "result is null");
            assert!(resp["result"].is_null());
            assert_eq!(resp["id"], 1);
        }
    }

    #[tokio::test]
    async fn bare_null_is_invalid_request() {
        let d = dispatcher();
        let resp = call_json(&d, "null").await;
        assert_eq!(error_code(&resp), -32600);
        assert!(resp["id"].is_null());
    }

    #[tokio::test]
    async fn parse_error_uses_null_id() {
        let d = dispatcher();
        let resp = call_json(&d, "{\"jsonrpc\":").await;
        assert_eq!(error_code(&resp), -32700);
        assert!(resp["id"].is_null());
        assert!(resp["result"].is_null());
    }

    #[tokio::test]
    async fn wrong_version_echoes_id() {
        let d = dispatcher();
        for id in [json!(1), json!("req-9"), json!(null)] {
            let input = json!({"jsonrpc": "1.0", "method": "calc.Answer", "id": id}).to_string();
            let resp = call_json(&d, &input).await;
            assert_eq!(error_code(&resp), -32600);
            assert_eq!(resp["id"], id);
        }
    }

    #[tokio::test]
    async fn missing_version_is_invalid_request() {
        let d = dispatcher();
        let resp = call_json(&d, r#"{"method":"calc.Answer","id":3}"#).await;
        assert_eq!(error_code(&resp), -32600);
    }

    #[tokio::test]
    async fn unknown_methods_are_not_found() {
        let d = dispatcher();
        for method in ["ghost.Method", "calc.Nope", "calc", ""] {
            let input = json!({"jsonrpc": "2.0", "method": method, "id": 1}).to_string();
            let resp = call_json(&d, &input).await;
            assert_eq!(error_code(&resp), -32601, "method {method:?}");
        }
    }

    #[tokio::test]
    async fn underscore_separator_resolves() {
        let d = dispatcher();
        let resp = call_json(&d, r#"{"jsonrpc":"2.0","method":"calc_Answer","id":1}"#).await;
        assert_eq!(resp["result"], 42);
    }

    #[tokio::test]
    async fn missing_or_bad_params_are_invalid_params() {
        let d = dispatcher();
        for params in ["", r#","params":null"#, r#","params":{"a":"x","b":1}"#, r##","params":"text""##] {
            let input = format!(r#"{{"jsonrpc":"2.0","method":"calc.Add","id":1{params}}}"#);
            let resp = call_json(&d, &input).await;
            assert_eq!(error_code(&resp), -32602, "params {params:?}");
        }
    }

    #[tokio::test]
    async fn params_ignored_without_declared_type() {
        let d = dispatcher();
        let resp = call_json(&d, r#"{"jsonrpc":"2.0","method":"calc.Answer","params":{"x":1},"id":1}"#).await;
        assert_eq!(resp["result"], 42);
    }

    #[tokio::test]
    async fn failure_outcome_is_internal_error() {
        let d = dispatcher();
        let resp = call_json(&d, r#"{"jsonrpc":"2.0","method":"calc.Broken","id":"b"}"#).await;
        assert_eq!(error_code(&resp), -32603);
        assert_eq!(resp["error"]["message"], "disk on fire");
        assert!(resp["result"].is_null());
        assert_eq!(resp["id"], "b");
    }

    #[tokio::test]
    async fn repeated_calls_are_identical() {
        let d = dispatcher();
        let input = r#"{"jsonrpc":"2.0","method":"calc.Add","params":{"a":1,"b":1},"id":1}"#;
        let first = d.call(input.as_bytes()).await;
        let second = d.call(input.as_bytes()).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn response_field_order_is_stable() {
        let d = dispatcher();
        let out = d
            .call(br#"{"jsonrpc":"2.0","method":"calc.Answer","id":1}"#)
            .await;
        assert_eq!(out, r#"{"jsonrpc":"2.0","result":42,"error":null,"id":1}"#);
    }
}
