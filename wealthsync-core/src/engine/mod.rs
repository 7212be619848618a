//! Local-first replication engine.
//!
//! A [`SyncEngine`] owns the canonical in-memory [`Document`]. Every change
//! goes through it: local edits via [`SyncEngine::mutate`], remote versions
//! via the group subscription. Each accepted change is written to
//! [`LocalPersistence`] before the call returns, and local edits made while
//! the document is shared are pushed to the [`RemoteStore`] after a quiet
//! period.
//!
//! ## Conflict resolution
//!
//! Whole-document last-write-wins on the logical clock. A remote version
//! replaces the local document when the local clock is `0` (just joined, or
//! a forced pull) or when the remote clock is strictly greater. Concurrent
//! edits from two devices between syncs are therefore not merged: the later
//! stamp wins and the other edit is lost.
//!
//! ## Tasks
//!
//! Network work runs on spawned Tokio tasks, so every method that may start
//! one must be called from within a runtime. A subscription feed that ends
//! reports [`SyncStatus::Error`] and is reopened with exponential backoff.
//! Tasks carry the `epoch` they were started in; the epoch is bumped on every group change and on
//! [`SyncEngine::dispose`], which turns late results from an older group
//! into no-ops.

mod push;
mod status;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, OnceCell};
use tokio::task::JoinHandle;

use crate::clock;
use crate::document::{Document, DocumentUpdate, UNSYNCED_CLOCK};
use crate::error::SyncResult;
use crate::group_key::GroupKey;
use crate::persistence::LocalPersistence;
use crate::remote::{self, RemoteConfig, RemoteStore};

pub use status::{SyncEvent, SyncStatus, SyncTiming};

/// Capacity of the event channel; slow listeners skip ahead.
const EVENT_CAPACITY: usize = 64;

/// Delay before the first resubscription attempt; doubles up to the max.
const RESUBSCRIBE_MIN_DELAY: Duration = Duration::from_secs(1);
const RESUBSCRIBE_MAX_DELAY: Duration = Duration::from_secs(30);

/// How the engine obtains its remote store.
pub enum RemoteProvider {
    /// Use this store as-is.
    Ready(Arc<dyn RemoteStore>),
    /// Connect on first need, falling back to demo mode on failure.
    Configured(RemoteConfig),
}

impl From<RemoteConfig> for RemoteProvider {
    fn from(config: RemoteConfig) -> Self {
        RemoteProvider::Configured(config)
    }
}

impl From<Arc<dyn RemoteStore>> for RemoteProvider {
    fn from(store: Arc<dyn RemoteStore>) -> Self {
        RemoteProvider::Ready(store)
    }
}

#[derive(Debug, Default)]
struct EngineState {
    doc: Document,
    status: SyncStatus,
    epoch: u64,
    listener_id: u64,
    listener: Option<JoinHandle<()>>,
    /// The current group's stored value has been delivered at least once.
    caught_up: bool,
    push_id: u64,
    pending_push: Option<JoinHandle<()>>,
    disposed: bool,
}

struct Inner {
    state: Mutex<EngineState>,
    persistence: Arc<dyn LocalPersistence>,
    remote: OnceCell<Arc<dyn RemoteStore>>,
    remote_config: RemoteConfig,
    timing: SyncTiming,
    events: broadcast::Sender<SyncEvent>,
}

/// Replication engine for one local document.
///
/// Cheap to clone; clones share the same document and tasks.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<Inner>,
}

impl SyncEngine {
    /// Creates an engine, loading the document from `persistence`.
    ///
    /// A missing or unreadable local copy is not fatal: the engine starts
    /// from the default document and keeps working in memory.
    pub fn new(
        persistence: Arc<dyn LocalPersistence>,
        remote: impl Into<RemoteProvider>,
        timing: SyncTiming,
    ) -> Self {
        let doc = match persistence.load() {
            Ok(Some(doc)) => doc,
            Ok(None) => Document::default(),
            Err(e) => {
                tracing::warn!("Failed to load local document, starting fresh: {}", e);
                Document::default()
            }
        };

        let (remote, remote_config) = match remote.into() {
            RemoteProvider::Ready(store) => (OnceCell::from(store), RemoteConfig::default()),
            RemoteProvider::Configured(config) => (OnceCell::new(), config),
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(EngineState {
                    doc,
                    ..Default::default()
                }),
                persistence,
                remote,
                remote_config,
                timing,
                events,
            }),
        }
    }

    /// Opens the group subscription if the loaded document is already shared.
    pub fn start(&self) {
        let mut state = self.inner.lock();
        if state.disposed || state.listener.is_some() || !state.doc.is_shared() {
            return;
        }
        self.open_listener(&mut state);
    }

    /// Cancels the pending push and closes the subscription.
    ///
    /// Pushes already sent still complete but no longer affect the engine.
    /// Further edits are ignored.
    pub fn dispose(&self) {
        let mut state = self.inner.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;
        state.epoch += 1;
        cancel(&mut state.pending_push);
        cancel(&mut state.listener);
        tracing::debug!("Sync engine disposed");
    }

    /// Applies a local edit.
    ///
    /// The document is stamped, persisted and broadcast before this returns;
    /// pushing happens in the background.
    pub fn mutate(&self, update: DocumentUpdate) {
        let mut state = self.inner.lock();
        if state.disposed {
            tracing::warn!("Ignoring edit on disposed sync engine");
            return;
        }

        let group_change = update.changes_group(&state.doc);
        let explicit_clock = update.logical_clock;
        update.apply_to(&mut state.doc);

        state.doc.logical_clock = if group_change {
            explicit_clock.unwrap_or(UNSYNCED_CLOCK)
        } else {
            clock::next_after(state.doc.logical_clock)
        };

        self.inner.commit(&state.doc);

        if group_change {
            state.epoch += 1;
            cancel(&mut state.pending_push);
            cancel(&mut state.listener);
            if let Some(group) = state.doc.group_id.clone() {
                tracing::info!("Switched to family group {}", group);
                self.open_listener(&mut state);
            } else {
                tracing::info!("Left family group");
                self.inner.set_status(&mut state, SyncStatus::Idle);
            }
        }

        if state.doc.is_shared() && !state.doc.awaiting_remote() {
            self.inner.set_status(&mut state, SyncStatus::Syncing);
            self.schedule_push(&mut state);
        }
    }

    /// Makes the next remote version win unconditionally.
    ///
    /// Resets the logical clock without touching the payload, drops any
    /// scheduled push and resubscribes so the store redelivers its current
    /// value. Does nothing when the document is not shared.
    pub fn force_pull(&self) {
        let mut state = self.inner.lock();
        if state.disposed || !state.doc.is_shared() {
            return;
        }

        cancel(&mut state.pending_push);
        state.doc.logical_clock = UNSYNCED_CLOCK;
        self.inner.commit(&state.doc);

        tracing::info!("Forcing pull from family group");
        self.open_listener(&mut state);
    }

    /// Stops sharing. The payload is kept locally.
    pub fn disconnect(&self) {
        self.mutate(DocumentUpdate::new().group(None));
    }

    /// Starts a new family group seeded with the local document.
    ///
    /// The document is stamped with the current time so that it is pushed and
    /// wins against anything already stored under the fresh key.
    pub async fn create_group(&self) -> GroupKey {
        self.inner.ensure_remote().await;

        let group = GroupKey::generate();
        self.mutate(
            DocumentUpdate::new()
                .group(Some(group.clone()))
                .logical_clock(clock::now_millis()),
        );
        group
    }

    /// Joins an existing family group, taking its stored document.
    ///
    /// Invalid keys are rejected before anything else happens.
    pub async fn join_group(&self, input: &str) -> SyncResult<GroupKey> {
        let group = GroupKey::parse(input)?;
        self.inner.ensure_remote().await;

        if self.group().as_ref() == Some(&group) {
            tracing::debug!("Already in family group {}", group);
            return Ok(group);
        }

        self.mutate(DocumentUpdate::new().group(Some(group.clone())));
        Ok(group)
    }

    /// Snapshot of the current document.
    pub fn document(&self) -> Document {
        self.inner.lock().doc.clone()
    }

    pub fn status(&self) -> SyncStatus {
        self.inner.lock().status
    }

    pub fn group(&self) -> Option<GroupKey> {
        self.inner.lock().doc.group_id.clone()
    }

    /// Whether replication is running against the offline stand-in.
    ///
    /// Before the remote is first needed this reports whether it will be.
    pub fn is_demo(&self) -> bool {
        match self.inner.remote.get() {
            Some(store) => store.is_demo(),
            None => !self.inner.remote_config.is_configured(),
        }
    }

    /// Subscribes to status and document changes.
    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// Whether the document reflects the group's stored version.
    ///
    /// True once the subscription has delivered the stored value (whether it
    /// was accepted or not), and always true for local-only documents and in
    /// demo mode, where there is nothing to wait for.
    pub fn is_caught_up(&self) -> bool {
        let (shared, caught_up) = {
            let state = self.inner.lock();
            (state.doc.is_shared(), state.caught_up)
        };
        !shared || caught_up || self.is_demo()
    }

    /// Waits until [`is_caught_up`](Self::is_caught_up) holds.
    ///
    /// Returns `false` without waiting further if the subscription fails or
    /// the engine is disposed. Callers bound the wait with a timeout.
    pub async fn caught_up(&self) -> bool {
        let mut events = self.events();
        loop {
            if self.is_caught_up() {
                return true;
            }
            {
                let state = self.inner.lock();
                if state.disposed || state.status == SyncStatus::Error {
                    return false;
                }
            }
            match events.recv().await {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
    }

    /// Replaces the subscription task with a fresh one for the current group.
    fn open_listener(&self, state: &mut EngineState) {
        cancel(&mut state.listener);
        let Some(group) = state.doc.group_id.clone() else {
            return;
        };

        state.listener_id += 1;
        state.caught_up = false;
        let epoch = state.epoch;
        let listener_id = state.listener_id;
        self.inner.set_status(state, SyncStatus::Connecting);

        let engine = self.clone();
        state.listener = Some(tokio::spawn(async move {
            let store = engine.inner.ensure_remote().await;
            if store.is_demo() {
                // Nothing will ever be delivered; there is nothing to wait for.
                engine.inner.mark_caught_up(epoch, listener_id);
            }
            let mut delay = RESUBSCRIBE_MIN_DELAY;

            loop {
                match store.subscribe(&group).await {
                    Ok(mut subscription) => {
                        tracing::debug!("Subscribed to family group {}", group);
                        let mut first = true;
                        while let Some(value) = subscription.next().await {
                            engine.apply_remote(epoch, listener_id, value, first);
                            first = false;
                            delay = RESUBSCRIBE_MIN_DELAY;
                        }
                        tracing::warn!("Subscription to family group {} ended", group);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to subscribe to family group {}: {}", group, e);
                    }
                }

                if !engine.inner.settle_listener(epoch, listener_id, SyncStatus::Error) {
                    return;
                }
                tracing::debug!("Resubscribing to family group {} in {:?}", group, delay);
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(RESUBSCRIBE_MAX_DELAY);
            }
        }));
    }

    /// Handles one version delivered by the subscription.
    ///
    /// `first` marks the value a fresh subscription delivers on open, which
    /// is the store's current version (`null` for an empty group). If that
    /// turns out older than the local document, the local one is pushed so
    /// the group catches up with edits that never made it out.
    fn apply_remote(&self, epoch: u64, listener_id: u64, value: Value, first: bool) {
        let mut state = self.inner.lock();
        if state.disposed || state.epoch != epoch || state.listener_id != listener_id {
            return;
        }

        let newly_caught_up = first && !state.caught_up;
        if first {
            state.caught_up = true;
        }

        let empty = value.is_null() || value.as_object().is_some_and(|obj| obj.is_empty());
        let mut incoming = Document::from_value(&value);
        let local_clock = state.doc.logical_clock;
        let remote_clock = if empty { 0 } else { incoming.logical_clock };

        if !empty && (local_clock == UNSYNCED_CLOCK || remote_clock > local_clock) {
            tracing::info!(
                "Accepting remote version {} (local {})",
                remote_clock,
                local_clock
            );
            incoming.group_id = state.doc.group_id.clone();
            state.doc = incoming;
            cancel(&mut state.pending_push);
            self.inner.commit(&state.doc);
            self.inner.set_status(&mut state, SyncStatus::Saved);
        } else {
            tracing::debug!(
                "Discarding remote version {} (local {})",
                remote_clock,
                local_clock
            );
            if first && local_clock > remote_clock {
                tracing::info!("Family group is behind local version {}; pushing", local_clock);
                self.inner.set_status(&mut state, SyncStatus::Syncing);
                self.schedule_push(&mut state);
            } else if first && matches!(state.status, SyncStatus::Connecting | SyncStatus::Error) {
                self.inner.set_status(&mut state, SyncStatus::Saved);
            }
        }

        if newly_caught_up {
            let _ = self.inner.events.send(SyncEvent::CaughtUp);
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn ensure_remote(&self) -> Arc<dyn RemoteStore> {
        self.remote
            .get_or_init(|| remote::connect(&self.remote_config))
            .await
            .clone()
    }

    /// Persists `doc` and announces it.
    fn commit(&self, doc: &Document) {
        if let Err(e) = self.persistence.save(doc) {
            tracing::warn!("Failed to persist document: {}", e);
        }
        let _ = self.events.send(SyncEvent::Document(doc.clone()));
    }

    fn set_status(&self, state: &mut EngineState, status: SyncStatus) {
        if state.status == status {
            return;
        }
        tracing::debug!("Sync status {} -> {}", state.status, status);
        state.status = status;
        let _ = self.events.send(SyncEvent::Status(status));
    }

    /// Sets `status` on behalf of a task started in `epoch`.
    fn settle(&self, epoch: u64, status: SyncStatus) {
        let mut state = self.lock();
        if state.disposed || state.epoch != epoch {
            return;
        }
        self.set_status(&mut state, status);
    }

    fn mark_caught_up(&self, epoch: u64, listener_id: u64) {
        let mut state = self.lock();
        if state.disposed || state.epoch != epoch || state.listener_id != listener_id {
            return;
        }
        if !state.caught_up {
            state.caught_up = true;
            let _ = self.events.send(SyncEvent::CaughtUp);
        }
    }

    /// Sets `status` on behalf of the listener `listener_id`.
    ///
    /// Returns false once that listener has been replaced or the engine
    /// disposed, telling the task to stop.
    fn settle_listener(&self, epoch: u64, listener_id: u64, status: SyncStatus) -> bool {
        let mut state = self.lock();
        if state.disposed || state.epoch != epoch || state.listener_id != listener_id {
            return false;
        }
        self.set_status(&mut state, status);
        true
    }
}

fn cancel(task: &mut Option<JoinHandle<()>>) {
    if let Some(task) = task.take() {
        task.abort();
    }
}
