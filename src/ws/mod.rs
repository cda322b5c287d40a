//! WebSocket adapter: handshake upgrade and the per-connection call loop.
//!
//! After the upgrade each text or binary frame is one request envelope, and
//! each reply is written as one frame of the same type. Calls on a
//! connection are served strictly in order.

pub mod connection;
pub mod handler;
