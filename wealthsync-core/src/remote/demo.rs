//! Offline stand-in for the live store.

use futures::future::{self, BoxFuture, FutureExt};

use super::{RemoteStore, Subscription};
use crate::document::Document;
use crate::error::SyncResult;
use crate::group_key::GroupKey;

/// Remote store with no peers: pushes succeed immediately and go nowhere,
/// subscriptions stay open and never deliver anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoStore;

impl DemoStore {
    pub fn new() -> Self {
        Self
    }
}

impl RemoteStore for DemoStore {
    fn push(&self, group: &GroupKey, doc: &Document) -> BoxFuture<'static, SyncResult<()>> {
        tracing::debug!(
            "[demo] push to {} (clock {}) discarded",
            group,
            doc.logical_clock
        );
        future::ready(Ok(())).boxed()
    }

    fn subscribe(&self, group: &GroupKey) -> BoxFuture<'static, SyncResult<Subscription>> {
        tracing::debug!("[demo] subscribed to {}", group);
        future::ready(Ok(Subscription::silent())).boxed()
    }

    fn is_demo(&self) -> bool {
        true
    }
}
