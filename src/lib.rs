//! # agentx
//!
//! Remote agent that exposes registered services over JSON-RPC 2.0.
//!
//! Each inbound connection is classified by its headers. Plain requests get
//! one request/response exchange over HTTP, and WebSocket handshakes are
//! upgraded to a stream of calls. Both transports decode the same envelope
//! and share one dispatcher backed by a write-once service registry.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── Transport selector + auth gate (api/)
//!     ├── HTTP adapter (api/http)   WebSocket adapter (ws/)
//!     │
//!     ├── Dispatcher (rpc/dispatcher)
//!     ├── Envelope codec (rpc/envelope)
//!     │
//!     ├── ServiceRegistry (rpc/registry)
//!     │
//!     └── Services: system, git (service/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod error;
pub mod rpc;
pub mod service;
pub mod ws;
