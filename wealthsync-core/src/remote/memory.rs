//! In-process shared store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{self, BoxFuture, FutureExt};
use serde_json::Value;
use tokio::sync::mpsc;

use super::{RemoteStore, Subscription};
use crate::document::Document;
use crate::error::SyncResult;
use crate::group_key::GroupKey;

#[derive(Debug, Default)]
struct Family {
    current: Option<Value>,
    subscribers: Vec<mpsc::UnboundedSender<Value>>,
}

/// Remote store kept entirely in memory.
///
/// Behaves like the live service: a subscription first receives the stored
/// value (`null` when nothing is stored yet), then every value pushed
/// afterwards (including the subscriber's own pushes). Clones share the same families, so several engines handed clones
/// of one store see each other's writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    families: Arc<Mutex<HashMap<GroupKey, Family>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn families(&self) -> MutexGuard<'_, HashMap<GroupKey, Family>> {
        self.families.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `value` for `group` and fans it out to every live subscriber.
    ///
    /// Delivery happens under the lock, so every subscriber observes writes
    /// in the same order.
    pub fn put_value(&self, group: &GroupKey, value: Value) {
        let mut families = self.families();
        let family = families.entry(group.clone()).or_default();
        family
            .subscribers
            .retain(|subscriber| subscriber.send(value.clone()).is_ok());
        family.current = Some(value);
    }

    /// The value currently stored for `group`.
    pub fn get_value(&self, group: &GroupKey) -> Option<Value> {
        self.families()
            .get(group)
            .and_then(|family| family.current.clone())
    }

    /// The stored document for `group`, sanitized.
    pub fn get(&self, group: &GroupKey) -> Option<Document> {
        self.get_value(group).map(|v| Document::from_value(&v))
    }

    /// Number of open subscriptions for `group`.
    pub fn subscriber_count(&self, group: &GroupKey) -> usize {
        let mut families = self.families();
        match families.get_mut(group) {
            Some(family) => {
                family.subscribers.retain(|s| !s.is_closed());
                family.subscribers.len()
            }
            None => 0,
        }
    }
}

impl RemoteStore for MemoryStore {
    fn push(&self, group: &GroupKey, doc: &Document) -> BoxFuture<'static, SyncResult<()>> {
        self.put_value(group, doc.to_value());
        future::ready(Ok(())).boxed()
    }

    fn subscribe(&self, group: &GroupKey) -> BoxFuture<'static, SyncResult<Subscription>> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut families = self.families();
        let family = families.entry(group.clone()).or_default();
        // The receiver is alive, so this cannot fail.
        let _ = sender.send(family.current.clone().unwrap_or(Value::Null));
        family.subscribers.push(sender);
        future::ready(Ok(Subscription::new(receiver))).boxed()
    }
}
