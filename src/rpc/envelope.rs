//! JSON-RPC 2.0 request/response envelopes and their byte codec.
//!
//! Request parameters and ids are kept as raw JSON: parameters are decoded
//! only once the target method (and therefore the parameter type) is known,
//! and ids are echoed back byte-for-byte without being reinterpreted.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::{ErrorCode, RpcError};

/// The only protocol version tag accepted and emitted.
pub const VERSION: &str = "2.0";

/// Envelope written when encoding a response fails and even the error
/// report cannot be encoded.
const FALLBACK: &str = r#"{"jsonrpc":"2.0","result":null,"error":{"code":-32603,"message":"failed to encode response","data":null},"id":null}"#;

/// Inbound request envelope.
///
/// Missing `jsonrpc` or `method` members decode as empty strings so that
/// they fail at the version check or at method lookup respectively, not at
/// parse time. Wrong member types are parse failures. A bare `null`
/// decodes as an envelope with every member missing.
#[derive(Debug, Default, Deserialize)]
pub struct Request {
    /// Protocol version tag; must equal [`VERSION`].
    #[serde(default)]
    pub jsonrpc: String,
    /// Combined `"<Service>.<Method>"` identifier.
    #[serde(default)]
    pub method: String,
    /// Parameter payload, decoded later against the method's declared type.
    /// An explicit `null` is treated as absent.
    #[serde(default)]
    pub params: Option<Box<RawValue>>,
    /// Request id, echoed verbatim. An explicit `null` is treated as absent
    /// and echoed as `null`.
    #[serde(default)]
    pub id: Option<Box<RawValue>>,
}

impl Request {
    /// Decodes a request envelope from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] for malformed syntax,
    /// non-object payloads or wrongly typed members.
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice::<Option<Self>>(bytes).map(Option::unwrap_or_default)
    }
}

/// Outbound response envelope.
///
/// Exactly one of `result` and `error` is set; the constructors are the
/// only way to build one. Both members always appear on the wire, the
/// unused one as `null`.
#[derive(Debug, Serialize)]
pub struct Response {
    jsonrpc: &'static str,
    result: Option<Box<RawValue>>,
    error: Option<RpcError>,
    id: Option<Box<RawValue>>,
}

impl Response {
    /// Builds a success response carrying an already-encoded result.
    #[must_use]
    pub fn success(id: Option<Box<RawValue>>, result: Box<RawValue>) -> Self {
        Self {
            jsonrpc: VERSION,
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Builds an error response.
    #[must_use]
    pub fn failure(id: Option<Box<RawValue>>, error: RpcError) -> Self {
        Self {
            jsonrpc: VERSION,
            result: None,
            error: Some(error),
            id,
        }
    }

    /// Returns the encoded result, if this is a success response.
    #[must_use]
    pub fn result(&self) -> Option<&RawValue> {
        self.result.as_deref()
    }

    /// Returns the error object, if this is an error response.
    #[must_use]
    pub fn error(&self) -> Option<&RpcError> {
        self.error.as_ref()
    }

    /// Returns the echoed request id.
    #[must_use]
    pub fn id(&self) -> Option<&RawValue> {
        self.id.as_deref()
    }

    /// Encodes the response to its wire form.
    ///
    /// Never fails: if encoding does not succeed, an internal-error envelope
    /// with the same id is produced instead, and if that fails too a fixed
    /// fallback envelope is returned.
    #[must_use]
    pub fn encode(&self) -> String {
        self.encode_with(serde_json::to_string::<Self>)
    }

    fn encode_with<F>(&self, serialize: F) -> String
    where
        F: Fn(&Self) -> serde_json::Result<String>,
    {
        match serialize(self) {
            Ok(json) => json,
            Err(err) => {
                tracing::error!(%err, "failed to encode response");
                let fallback = Self {
                    jsonrpc: VERSION,
                    result: None,
                    error: Some(RpcError::new(ErrorCode::Internal, err.to_string())),
                    id: self.id.clone(),
                };
                serialize(&fallback).unwrap_or_else(|_| FALLBACK.to_string())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn decode(input: &str) -> Request {
        let Ok(req) = Request::decode(input.as_bytes()) else {
            panic!("expected {input} to decode");
        };
        req
    }

    fn raw(json: &str) -> Box<RawValue> {
        let Ok(raw) = RawValue::from_string(json.to_string()) else {
            panic!("invalid raw json");
        };
        raw
    }

    #[test]
    fn decodes_full_request() {
        let req = decode(r#"{"jsonrpc":"2.0","method":"system.Time","params":{"a":1},"id":"abc"}"#);
        assert_eq!(req.jsonrpc, "2.0");
        assert_eq!(req.method, "system.Time");
        assert_eq!(req.params.as_deref().map(RawValue::get), Some(r#"{"a":1}"#));
        assert_eq!(req.id.as_deref().map(RawValue::get), Some(r#""abc""#));
    }

    #[test]
    fn missing_members_default() {
        let req = decode("{}");
        assert!(req.jsonrpc.is_empty());
        assert!(req.method.is_empty());
        assert!(req.params.is_none());
        assert!(req.id.is_none());
    }

    #[test]
    fn explicit_null_params_is_absent() {
        let req = decode(r#"{"jsonrpc":"2.0","method":"a.b","params":null,"id":null}"#);
        assert!(req.params.is_none());
        assert!(req.id.is_none());
    }

    #[test]
    fn id_is_kept_verbatim() {
        let req = decode(r#"{"jsonrpc":"2.0","method":"a.b","id":1.50}"#);
        assert_eq!(req.id.as_deref().map(RawValue::get), Some("1.50"));
    }

    #[test]
    fn malformed_input_is_an_error() {
        assert!(Request::decode(b"{not json").is_err());
        assert!(Request::decode(b"[1,2,3]").is_err());
        assert!(Request::decode(br#"{"jsonrpc":2,"method":"a.b"}"#).is_err());
        assert!(Request::decode(br#"{"jsonrpc":"2.0","method":7}"#).is_err());
        assert!(Request::decode(b"").is_err());
    }

    #[test]
    fn bare_null_is_an_empty_request() {
        let req = decode("null");
        assert!(req.jsonrpc.is_empty());
        assert!(req.method.is_empty());
        assert!(req.id.is_none());
    }

    #[test]
    fn success_encodes_null_error() {
        let resp = Response::success(Some(raw("1")), raw(r#""1700000000""#));
        assert_eq!(
            resp.encode(),
            r#"{"jsonrpc":"2.0","result":"1700000000","error":null,"id":1}"#
        );
    }

    #[test]
    fn failure_encodes_null_result() {
        let resp = Response::failure(None, RpcError::new(ErrorCode::Parse, "bad"));
        assert_eq!(
            resp.encode(),
            r#"{"jsonrpc":"2.0","result":null,"error":{"code":-32700,"message":"bad","data":null},"id":null}"#
        );
    }

    #[test]
    fn accessors_expose_exactly_one_outcome() {
        let ok = Response::success(None, raw("true"));
        assert!(ok.result().is_some());
        assert!(ok.error().is_none());

        let err = Response::failure(Some(raw(r#""x""#)), RpcError::new(ErrorCode::Internal, "e"));
        assert!(err.result().is_none());
        assert_eq!(err.error().map(|e| e.code), Some(ErrorCode::Internal));
        assert_eq!(err.id().map(RawValue::get), Some(r#""x""#));
    }

    fn failing(_: &Response) -> serde_json::Result<String> {
        serde_json::from_str::<String>("not a string")
    }

    #[test]
    fn encode_failure_keeps_id_in_error_envelope() {
        let resp = Response::success(Some(raw("7")), raw("true"));
        let out = resp.encode_with(|r| {
            if r.result.is_some() {
                failing(r)
            } else {
                serde_json::to_string(r)
            }
        });
        let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&out) else {
            panic!("invalid envelope {out}");
        };
        assert_eq!(parsed["error"]["code"], -32603);
        assert!(parsed["result"].is_null());
        assert_eq!(parsed["id"], 7);
    }

    #[test]
    fn encode_falls_back_to_fixed_envelope() {
        let resp = Response::success(Some(raw("7")), raw("true"));
        assert_eq!(resp.encode_with(failing), FALLBACK);
        let parsed: Result<serde_json::Value, _> = serde_json::from_str(FALLBACK);
        assert!(parsed.is_ok());
    }
}
