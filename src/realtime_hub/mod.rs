//! RealtimeHub - channel-keyed WebSocket fan-out
//!
//! ## Responsibilities
//!
//! - Connection registry: channel key (site id or node type) -> live connections
//! - Broadcast: serialize once, deliver to every connection registered at call time
//! - Dead connection pruning after each broadcast
//!
//! Channels exist only while they have subscribers. Methods are synchronous so
//! worker threads and the workflow engine can broadcast without a runtime.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Outbound message: `{"type": "<category>_<kind>", ...payload}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl HubMessage {
    fn build(category: &str, kind: &str, payload: Value) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        Self {
            message_type: format!("{}_{}", category, kind),
            payload,
        }
    }

    pub fn update(category: &str, payload: Value) -> Self {
        Self::build(category, "update", payload)
    }

    pub fn alert(category: &str, payload: Value) -> Self {
        Self::build(category, "alert", payload)
    }

    pub fn delete(category: &str, payload: Value) -> Self {
        Self::build(category, "delete", payload)
    }
}

/// Connection registry / broadcaster
pub struct RealtimeHub {
    channels: DashMap<String, HashMap<Uuid, mpsc::UnboundedSender<String>>>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Register a new connection under `channel`
    pub fn connect(&self, channel: &str) -> (Uuid, mpsc::UnboundedReceiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        self.channels
            .entry(channel.to_string())
            .or_default()
            .insert(id, tx);

        tracing::info!(connection_id = %id, channel = %channel, "Client connected");
        (id, rx)
    }

    /// Remove a connection; the channel goes away with its last subscriber
    pub fn disconnect(&self, id: &Uuid, channel: &str) {
        let removed = match self.channels.get_mut(channel) {
            Some(mut conns) => conns.remove(id).is_some(),
            None => false,
        };
        self.channels.remove_if(channel, |_, conns| conns.is_empty());

        if removed {
            tracing::info!(connection_id = %id, channel = %channel, "Client disconnected");
        }
    }

    /// Deliver `message` to every connection on `channel`. Returns the number
    /// of successful deliveries; failed connections are pruned.
    pub fn broadcast(&self, channel: &str, message: &HubMessage) -> usize {
        let json = match serde_json::to_string(message) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize message");
                return 0;
            }
        };

        // snapshot so no shard lock is held while sending
        let targets: Vec<(Uuid, mpsc::UnboundedSender<String>)> =
            match self.channels.get(channel) {
                Some(conns) => conns.iter().map(|(id, tx)| (*id, tx.clone())).collect(),
                None => return 0,
            };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, tx) in &targets {
            match tx.send(json.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        connection_id = %id,
                        channel = %channel,
                        error = %e,
                        "Failed to send message"
                    );
                    dead.push(*id);
                }
            }
        }

        if !dead.is_empty() {
            if let Some(mut conns) = self.channels.get_mut(channel) {
                for id in &dead {
                    conns.remove(id);
                }
            }
            self.channels.remove_if(channel, |_, conns| conns.is_empty());
        }

        tracing::debug!(
            channel = %channel,
            message_type = %message.message_type,
            delivered = delivered,
            pruned = dead.len(),
            "Broadcast"
        );
        delivered
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels.get(channel).map(|c| c.len()).unwrap_or(0)
    }

    pub fn has_channel(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_shape() {
        let msg = HubMessage::update("detection", json!({"camera_id": "a", "count": 2}));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "detection_update");
        assert_eq!(value["camera_id"], "a");
        assert_eq!(value["count"], 2);

        let scalar = HubMessage::alert("widget", json!(3));
        assert_eq!(serde_json::to_value(&scalar).unwrap()["data"], 3);
        assert_eq!(HubMessage::delete("widget", Value::Null).message_type, "widget_delete");
    }

    #[test]
    fn test_broadcast_reaches_channel_only() {
        let hub = RealtimeHub::new();
        let (_a, mut rx_a) = hub.connect("site-1");
        let (_b, mut rx_b) = hub.connect("site-1");
        let (_c, mut rx_c) = hub.connect("site-2");

        let delivered = hub.broadcast("site-1", &HubMessage::update("detection", json!({})));
        assert_eq!(delivered, 2);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_c.try_recv().is_err());
    }

    #[test]
    fn test_dead_connections_pruned() {
        let hub = RealtimeHub::new();
        let (_live, mut rx_live) = hub.connect("output");
        let (_dead, rx_dead) = hub.connect("output");
        drop(rx_dead);

        let delivered = hub.broadcast("output", &HubMessage::update("output", json!({"x": 1})));
        assert_eq!(delivered, 1);
        assert_eq!(hub.subscriber_count("output"), 1);
        assert!(rx_live.try_recv().is_ok());
    }

    #[test]
    fn test_pruning_last_connection_removes_channel() {
        let hub = RealtimeHub::new();
        let (_id, rx) = hub.connect("site-9");
        drop(rx);
        assert_eq!(hub.broadcast("site-9", &HubMessage::update("x", json!({}))), 0);
        assert!(!hub.has_channel("site-9"));
    }

    #[test]
    fn test_connect_disconnect_cycles_leave_no_channels() {
        let hub = RealtimeHub::new();
        for _ in 0..50 {
            let (a, _rx_a) = hub.connect("lobby");
            let (b, _rx_b) = hub.connect("lobby");
            hub.disconnect(&a, "lobby");
            assert!(hub.has_channel("lobby"));
            hub.disconnect(&b, "lobby");
            assert!(!hub.has_channel("lobby"));
        }
        assert_eq!(hub.channel_count(), 0);
        // unknown ids and channels are ignored
        hub.disconnect(&Uuid::new_v4(), "nowhere");
        assert_eq!(hub.broadcast("nowhere", &HubMessage::update("x", json!({}))), 0);
    }
}
