//! Shared keyed document stores.
//!
//! A [`RemoteStore`] holds one document per family group and lets every
//! device push a new version or watch for versions pushed by others. The
//! engine only sees this trait; which variant sits behind it is decided once,
//! by [`connect`], when the remote is first needed:
//!
//! - [`LiveStore`]: talks to a relay server over HTTP and WebSocket.
//! - [`DemoStore`]: no-op stand-in used when the live store is not
//!   configured or cannot authenticate.
//! - [`MemoryStore`]: in-process store with live semantics, for running
//!   several engines against each other.

mod demo;
mod live;
mod memory;
mod protocol;

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::document::Document;
use crate::error::SyncResult;
use crate::group_key::GroupKey;

pub use demo::DemoStore;
pub use live::LiveStore;
pub use memory::MemoryStore;
pub use protocol::{
    family_path, subscribe_path, AuthResponse, HealthResponse, AUTH_PATH, HEALTH_PATH,
};

/// Abstraction over the shared document service.
pub trait RemoteStore: Send + Sync {
    /// Writes `doc` as the group's current version.
    ///
    /// The returned future resolves once the store acknowledged the write.
    fn push(&self, group: &GroupKey, doc: &Document) -> BoxFuture<'static, SyncResult<()>>;

    /// Opens a subscription to the group's document.
    ///
    /// The subscription yields the value already stored first (`null` when
    /// the group has none yet) and then every later version. Dropping it
    /// unsubscribes.
    fn subscribe(&self, group: &GroupKey) -> BoxFuture<'static, SyncResult<Subscription>>;

    /// True for the offline stand-in.
    fn is_demo(&self) -> bool {
        false
    }
}

/// A live feed of remote document versions for one group.
///
/// Versions arrive as raw JSON; the engine sanitizes them. The feed ends when
/// the remote side closes, and dropping the subscription tears down whatever
/// task feeds it.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<Value>,
    feeder: Option<JoinHandle<()>>,
    // Held so that a feed with no producer stays open instead of ending.
    _keepalive: Option<mpsc::UnboundedSender<Value>>,
}

impl Subscription {
    /// A subscription fed through `receiver` by some other owner.
    pub fn new(receiver: mpsc::UnboundedReceiver<Value>) -> Self {
        Self {
            receiver,
            feeder: None,
            _keepalive: None,
        }
    }

    /// A subscription fed by `feeder`, which is aborted on drop.
    pub fn with_feeder(receiver: mpsc::UnboundedReceiver<Value>, feeder: JoinHandle<()>) -> Self {
        Self {
            receiver,
            feeder: Some(feeder),
            _keepalive: None,
        }
    }

    /// A subscription that stays open and never yields.
    pub fn silent() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            receiver,
            feeder: None,
            _keepalive: Some(sender),
        }
    }

    /// Waits for the next remote version. `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<Value> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
    }
}

/// Where the live store lives, if anywhere.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Relay server URL (e.g. `http://localhost:8080`). `None` selects demo mode.
    pub server_url: Option<String>,
}

impl RemoteConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: Some(server_url.into()),
        }
    }

    /// Returns true if a live server is configured.
    pub fn is_configured(&self) -> bool {
        self.server_url.is_some()
    }
}

/// Establishes the remote store for `config`.
///
/// Tries the live store (including anonymous authentication) and falls back
/// to [`DemoStore`] on any failure, so callers always get a usable store.
pub async fn connect(config: &RemoteConfig) -> Arc<dyn RemoteStore> {
    let Some(url) = config.server_url.as_deref() else {
        tracing::warn!("No sync server configured; using demo mode");
        return Arc::new(DemoStore::new());
    };

    match LiveStore::connect(url).await {
        Ok(store) => {
            tracing::info!("Connected to sync server {}", url);
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!("Sync server unavailable ({}); using demo mode", e);
            Arc::new(DemoStore::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_connect_without_server_is_demo() {
        let store = connect(&RemoteConfig::default()).await;
        assert!(store.is_demo());
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_server_falls_back_to_demo() {
        // Port 9 (discard) is closed on loopback in test environments.
        let store = connect(&RemoteConfig::new("http://127.0.0.1:9")).await;
        assert!(store.is_demo());
    }

    #[tokio::test]
    async fn test_silent_subscription_never_yields() {
        let mut sub = Subscription::silent();
        let next = tokio::time::timeout(Duration::from_millis(20), sub.next()).await;
        assert!(next.is_err());
    }

    #[tokio::test]
    async fn test_dropping_subscription_aborts_feeder() {
        let marker = Arc::new(());
        let held = Arc::clone(&marker);
        let (tx, rx) = mpsc::unbounded_channel();
        let feeder = tokio::spawn(async move {
            let _held = held;
            loop {
                if tx.send(Value::Bool(true)).is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        });

        let sub = Subscription::with_feeder(rx, feeder);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(Arc::strong_count(&marker), 2);

        drop(sub);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(Arc::strong_count(&marker), 1);
    }
}
