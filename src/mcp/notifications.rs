//! Notification fan-out (C9): subscriber set plus a [`crate::configuration::ChangeNotifier`]
//! implementation so C4 mutations reach every connected subscriber.
//!
//! Grounded on `original_source/src/mcp/mcp2025_server.py::notify_tools_changed` (broadcast,
//! then drop any subscriber whose send failed) and the axum WebSocket idiom in
//! `tacryt-socryp-cinch-rs/crates/cinch-web/src/ws.rs` (a `tokio::sync::broadcast` channel feeding
//! one forwarding task per connection).

use crate::configuration::ChangeNotifier;
use crate::mcp::jsonrpc::make_notification;
use serde_json::Value;
use tokio::sync::broadcast;

/// Fan-out hub. Cheap to clone; every clone shares the same broadcast channel.
#[derive(Clone)]
pub struct NotificationHub {
    sender: broadcast::Sender<Value>,
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationHub {
    pub fn new() -> Self {
        let (sender, _receiver) = broadcast::channel(256);
        Self { sender }
    }

    /// Register a new subscriber; each connection handler owns one receiver and forwards
    /// whatever arrives to its own transport.
    pub fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.sender.subscribe()
    }

    /// Current subscriber count, used by the health accessor (§4.9.1).
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Broadcast a JSON-RPC notification. A `send` only fails when there are zero subscribers,
    /// which is not an error condition here — unlike a per-connection mpsc send, a lagging or
    /// dropped receiver is handled by the receiving task itself (`RecvError::Lagged`/`Closed`),
    /// so there is no per-subscriber cleanup to perform at the send site.
    pub fn broadcast(&self, method: &str, params: Value) {
        let notification = make_notification(method, params);
        let payload = serde_json::to_value(&notification).unwrap_or(Value::Null);
        let _ = self.sender.send(payload);
    }

    /// Emit the idle keepalive ping carried by every open subscriber connection.
    pub fn ping_payload(timestamp: i64) -> Value {
        serde_json::to_value(make_notification("ping", serde_json::json!({ "timestamp": timestamp }))).unwrap()
    }
}

impl ChangeNotifier for NotificationHub {
    fn notify(&self, method: &str, params: Value) {
        self.broadcast(method, params);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_broadcast() {
        let hub = NotificationHub::new();
        let mut rx = hub.subscribe();
        hub.broadcast("configuration/changed", serde_json::json!({ "provider": "openai" }));
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg["method"], "configuration/changed");
    }

    #[tokio::test]
    async fn dropped_receiver_does_not_panic_on_broadcast() {
        let hub = NotificationHub::new();
        {
            let _rx = hub.subscribe();
        }
        hub.broadcast("ping", serde_json::json!({}));
    }
}
