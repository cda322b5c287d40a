//! RPC error taxonomy and the wire-level error object.
//!
//! Every failure the dispatcher can produce maps to exactly one
//! [`ErrorCode`]. [`DispatchError`] is the central error type for the
//! dispatch core; it is always recovered into an [`RpcError`] and returned
//! inside a normal response envelope, never as a transport fault.

use serde::{Serialize, Serializer};

/// Fixed JSON-RPC 2.0 error taxonomy.
///
/// | Code   | Category         | Raised when                                  |
/// |--------|------------------|----------------------------------------------|
/// | -32700 | Parse            | inbound bytes are not a well-formed envelope |
/// | -32600 | Invalid request  | wrong protocol version                       |
/// | -32601 | Method not found | identifier does not resolve in the registry  |
/// | -32602 | Invalid params   | missing or malformed parameter payload       |
/// | -32603 | Internal         | invoked method reported a failure            |
/// | -32000 | Server           | adapter-level failures such as auth denial   |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Inbound bytes are not a well-formed envelope.
    Parse,
    /// Envelope is well-formed but violates protocol invariants.
    InvalidRequest,
    /// Method identifier does not resolve.
    MethodNotFound,
    /// Missing or malformed parameters for a method requiring them.
    InvalidParams,
    /// The resolved method ran and reported a failure outcome.
    Internal,
    /// Reserved band for adapter/transport-level failures.
    Server,
}

impl ErrorCode {
    /// Returns the numeric JSON-RPC code for this category.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Parse => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::Internal => -32603,
            Self::Server => -32000,
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.as_i32())
    }
}

/// Wire error object carried in the `error` member of a response.
///
/// ```json
/// { "code": -32601, "message": "rpc: can't find service \"ghost\"", "data": null }
/// ```
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct RpcError {
    /// Category code from the fixed taxonomy.
    pub code: ErrorCode,
    /// Short human-readable description.
    pub message: String,
    /// Optional structured auxiliary data. Serialized as `null` when absent.
    pub data: Option<serde_json::Value>,
}

impl RpcError {
    /// Creates an error without auxiliary data.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// Failure while resolving a `"<Service>.<Method>"` identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// The identifier has no `.` or `_` separator, or an empty component.
    #[error("rpc: service/method request ill-formed: {0:?}")]
    IllFormed(String),

    /// No service is registered under this name.
    #[error("rpc: can't find service {0:?}")]
    ServiceNotFound(String),

    /// The service exists but exposes no method with this name.
    #[error("rpc: can't find method {method:?}")]
    MethodNotFound {
        /// Service that was found.
        service: String,
        /// Method that was not.
        method: String,
    },
}

/// Failure while decoding the parameter payload of a call.
#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    /// The method declares a parameter structure but none was supplied.
    #[error("bad params: method requires params")]
    Missing,

    /// The payload does not decode into the declared parameter structure.
    #[error("bad params: {0}")]
    Malformed(#[source] serde_json::Error),
}

/// Failure while registering a service receiver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    /// The receiver exposes no methods.
    #[error("rpc: service {0:?} has no methods")]
    NoMethods(String),
}

/// One variant per dispatcher step that can fail.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Step 1: bytes did not decode into a request envelope.
    #[error("{0}")]
    Parse(#[source] serde_json::Error),

    /// Step 2: the envelope carries a protocol version other than `"2.0"`.
    #[error("protocol error, only 2.0 is supported (got {0:?})")]
    InvalidRequest(String),

    /// Step 3: the method identifier did not resolve.
    #[error(transparent)]
    MethodNotFound(#[from] LookupError),

    /// Step 4: parameters missing or malformed.
    #[error(transparent)]
    InvalidParams(#[from] ParamsError),

    /// Step 5: the invoked method reported a failure outcome.
    #[error("{0}")]
    Internal(String),

    /// Adapter-level access denial.
    #[error("auth fail")]
    AccessDenied,
}

impl DispatchError {
    /// Returns the taxonomy category for this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Parse(_) => ErrorCode::Parse,
            Self::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Self::MethodNotFound(_) => ErrorCode::MethodNotFound,
            Self::InvalidParams(_) => ErrorCode::InvalidParams,
            Self::Internal(_) => ErrorCode::Internal,
            Self::AccessDenied => ErrorCode::Server,
        }
    }

    /// Converts this failure into the wire error object.
    #[must_use]
    pub fn into_rpc_error(self) -> RpcError {
        RpcError::new(self.code(), self.to_string())
    }
}
