//! Stream a broadcast channel to a WebSocket client.
//!
//! The application decides what goes on the channel and which items a given
//! client may see. This module only owns the socket plumbing.
//!
//! # Message Protocol
//!
//! **Server → Client (Event):**
//! ```json
//! { "type": "event", "payload": { ... } }
//! ```
//!
//! **Server → Client (Error):**
//! ```json
//! { "type": "error", "message": "Missed 3 events" }
//! ```
//!
//! **Client → Server:** `{ "type": "ping" }` is answered with `{ "type": "pong" }`.
//! Anything else is ignored.

use axum::extract::ws::{Message, WebSocket};
use futures::{stream::StreamExt, SinkExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// WebSocket message envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WsMessage<T> {
    /// Item forwarded from the broadcast channel
    Event {
        /// The item
        payload: T,
    },
    /// Something went wrong on the server side
    Error {
        /// Description
        message: String,
    },
    /// Keepalive request
    Ping,
    /// Keepalive reply
    Pong,
}

/// Forward items from `rx` to `socket` until either side goes away.
///
/// `filter` maps each broadcast item to what this client should receive;
/// `None` skips the item.
pub async fn stream_broadcast<T, U, F>(socket: WebSocket, mut rx: broadcast::Receiver<T>, filter: F)
where
    T: Clone + Send + 'static,
    U: Serialize + Send + 'static,
    F: Fn(T) -> Option<U> + Send + 'static,
{
    info!("WebSocket stream opened");

    let (mut sender, mut receiver) = socket.split();
    let (reply_tx, mut reply_rx) = mpsc::channel::<WsMessage<U>>(8);

    let mut send_task = tokio::spawn(async move {
        loop {
            let outgoing = tokio::select! {
                item = rx.recv() => match item {
                    Ok(item) => match filter(item) {
                        Some(payload) => WsMessage::Event { payload },
                        None => continue,
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "WebSocket client lagged");
                        WsMessage::Error { message: format!("Missed {skipped} events") }
                    },
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(reply) => reply,
                    None => break,
                },
            };

            let text = match serde_json::to_string(&outgoing) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize WebSocket message");
                    continue;
                },
            };

            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        debug!("WebSocket send task terminated");
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if let Ok(WsMessage::<serde_json::Value>::Ping) = serde_json::from_str(&text) {
                        if reply_tx.send(WsMessage::Pong).await.is_err() {
                            break;
                        }
                    }
                },
                Message::Close(_) => break,
                Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {},
            }
        }
        debug!("WebSocket receive task terminated");
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    info!("WebSocket stream closed");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn event_envelope_is_tagged() {
        let msg = WsMessage::Event { payload: 7 };
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"type":"event","payload":7}"#
        );
    }

    #[test]
    fn ping_parses_without_payload_type() {
        let msg: WsMessage<serde_json::Value> = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg, WsMessage::Ping);
    }
}
