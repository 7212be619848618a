//! Debounced pushes raced against the UI timeout.

use futures::future::BoxFuture;

use super::{cancel, EngineState, SyncEngine, SyncStatus};
use crate::error::SyncResult;

impl SyncEngine {
    /// (Re)starts the quiet period; the push fires when it elapses.
    ///
    /// Only a push that has not been sent yet is replaced. One already on
    /// the network runs to completion.
    pub(super) fn schedule_push(&self, state: &mut EngineState) {
        cancel(&mut state.pending_push);
        state.push_id += 1;
        let epoch = state.epoch;
        let push_id = state.push_id;

        let engine = self.clone();
        state.pending_push = Some(tokio::spawn(async move {
            tokio::time::sleep(engine.inner.timing.debounce).await;
            engine.flush(epoch, push_id).await;
        }));
    }

    async fn flush(&self, epoch: u64, push_id: u64) {
        let (group, doc) = {
            let mut state = self.inner.lock();
            if state.disposed || state.epoch != epoch || state.push_id != push_id {
                return;
            }
            // Past this point the push is no longer cancellable.
            state.pending_push = None;
            match &state.doc.group_id {
                Some(group) if !state.doc.awaiting_remote() => {
                    (group.clone(), state.doc.clone())
                }
                _ => return,
            }
        };

        let store = self.inner.ensure_remote().await;
        tracing::debug!(
            "Pushing version {} to family group {}",
            doc.logical_clock,
            group
        );
        self.deliver(epoch, store.push(&group, &doc)).await;
    }

    /// Reports the first of push completion or UI timeout, then keeps
    /// waiting for the push so a late failure still shows up as an error.
    async fn deliver(&self, epoch: u64, mut push: BoxFuture<'static, SyncResult<()>>) {
        tokio::select! {
            result = &mut push => {
                self.settle_push(epoch, result);
                return;
            }
            _ = tokio::time::sleep(self.inner.timing.ui_timeout) => {
                tracing::debug!("Push still pending after UI timeout");
                self.inner.settle(epoch, SyncStatus::Saved);
            }
        }

        if let Err(e) = push.await {
            tracing::warn!("Push failed after timeout: {}", e);
            self.inner.settle(epoch, SyncStatus::Error);
        }
    }

    fn settle_push(&self, epoch: u64, result: SyncResult<()>) {
        match result {
            Ok(()) => self.inner.settle(epoch, SyncStatus::Saved),
            Err(e) => {
                tracing::warn!("Push failed: {}", e);
                self.inner.settle(epoch, SyncStatus::Error);
            }
        }
    }
}
