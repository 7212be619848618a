//! Fan-out of family document updates to live subscribers.
//!
//! Every accepted `PUT` is broadcast to the WebSocket connections watching
//! that family, including the connection of the device that wrote it.

use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

/// Buffered updates per family before slow subscribers start lagging.
const CHANNEL_CAPACITY: usize = 16;

/// Tracks broadcast channels per family.
pub struct FamilyHub {
    channels: RwLock<HashMap<String, broadcast::Sender<Value>>>,
}

impl FamilyHub {
    /// Creates a new hub.
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribes to updates for a family.
    pub async fn subscribe(&self, family_id: &str) -> broadcast::Receiver<Value> {
        let mut channels = self.channels.write().await;

        if let Some(sender) = channels.get(family_id) {
            sender.subscribe()
        } else {
            let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
            channels.insert(family_id.to_string(), sender);
            receiver
        }
    }

    /// Broadcasts a new document to all subscribers of a family.
    ///
    /// Returns the number of subscribers reached.
    pub async fn broadcast(&self, family_id: &str, doc: Value) -> usize {
        let mut channels = self.channels.write().await;

        let Some(sender) = channels.get(family_id) else {
            return 0;
        };
        match sender.send(doc) {
            Ok(count) => count,
            Err(_) => {
                // Nobody is listening any more.
                channels.remove(family_id);
                0
            }
        }
    }

    /// Drops the family's channel once its last subscriber has gone.
    ///
    /// Called when a subscription ends, so families that are watched but
    /// never written do not keep a channel forever.
    pub async fn release(&self, family_id: &str) {
        let mut channels = self.channels.write().await;
        if channels
            .get(family_id)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(family_id);
        }
    }

    /// Number of families with an open channel.
    pub async fn family_count(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Number of live subscribers for a family.
    pub async fn subscriber_count(&self, family_id: &str) -> usize {
        self.channels
            .read()
            .await
            .get(family_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for FamilyHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_subscribe_and_broadcast() {
        let hub = FamilyHub::new();
        let mut rx = hub.subscribe("ABCD-1234").await;

        let reached = hub.broadcast("ABCD-1234", json!({ "lastUpdated": 1 })).await;

        assert_eq!(reached, 1);
        assert_eq!(rx.try_recv().unwrap()["lastUpdated"], 1);
    }

    #[tokio::test]
    async fn test_families_are_isolated() {
        let hub = FamilyHub::new();
        let mut rx1 = hub.subscribe("AAAA-0001").await;
        let mut rx2 = hub.subscribe("BBBB-0002").await;

        hub.broadcast("AAAA-0001", json!({})).await;

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers() {
        let hub = FamilyHub::new();
        assert_eq!(hub.broadcast("AAAA-0001", json!({})).await, 0);

        let rx = hub.subscribe("AAAA-0001").await;
        assert_eq!(hub.subscriber_count("AAAA-0001").await, 1);
        drop(rx);

        assert_eq!(hub.broadcast("AAAA-0001", json!({})).await, 0);
        assert_eq!(hub.subscriber_count("AAAA-0001").await, 0);
    }

    #[tokio::test]
    async fn test_release_drops_unused_channel() {
        let hub = FamilyHub::new();
        let first = hub.subscribe("AAAA-0001").await;
        let second = hub.subscribe("AAAA-0001").await;
        assert_eq!(hub.family_count().await, 1);

        drop(first);
        hub.release("AAAA-0001").await;
        assert_eq!(hub.family_count().await, 1);

        drop(second);
        hub.release("AAAA-0001").await;
        assert_eq!(hub.family_count().await, 0);

        // Releasing an unknown family is harmless.
        hub.release("BBBB-0002").await;
    }
}
