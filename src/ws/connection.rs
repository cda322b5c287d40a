//! WebSocket connection loop.
//!
//! Reads one frame, dispatches it, writes the reply, and only then reads the
//! next frame. Any read error, close frame or write error ends the loop, and
//! the socket is closed on every exit path.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::SinkExt;

use crate::rpc::Dispatcher;

/// Runs the call loop for a single upgraded connection.
pub async fn run_connection(mut socket: WebSocket, dispatcher: Arc<Dispatcher>) {
    let conn_id = uuid::Uuid::new_v4();
    tracing::debug!(%conn_id, "ws connection opened");

    loop {
        let reply = match socket.recv().await {
            Some(Ok(Message::Text(text))) => {
                let out = dispatcher.call(text.as_str().as_bytes()).await;
                Message::Text(out.into())
            }
            Some(Ok(Message::Binary(data))) => {
                let out = dispatcher.call(&data).await;
                Message::Binary(out.into_bytes().into())
            }
            // Pongs to inbound pings are queued by the protocol layer.
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Close(frame))) => {
                tracing::debug!(%conn_id, ?frame, "ws peer closed");
                break;
            }
            Some(Err(err)) => {
                tracing::debug!(%conn_id, %err, "ws read failed");
                break;
            }
            None => break,
        };

        if let Err(err) = socket.send(reply).await {
            tracing::warn!(%conn_id, %err, "ws write failed");
            break;
        }
    }

    let _ = socket.close().await;
    tracing::debug!(%conn_id, "ws connection closed");
}
