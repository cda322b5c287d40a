//! Dispatch core: service registry, envelope codec and dispatcher.
//!
//! Nothing in this module knows about HTTP or WebSocket. Transport adapters
//! hand raw message bytes to [`Dispatcher::call`] and write back the bytes it
//! returns.

pub mod dispatcher;
pub mod envelope;
pub mod registry;

pub use dispatcher::Dispatcher;
pub use envelope::{Request, Response};
pub use registry::{MethodEntry, MethodSet, RpcService, ServiceEntry, ServiceRegistry};
