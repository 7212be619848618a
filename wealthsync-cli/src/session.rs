//! Engine lifecycle for a single CLI invocation.
//!
//! A command opens a session, catches up with its family group, reads or
//! edits the document through the engine, then waits for replication to
//! settle before the process exits. Editing before catching up would stamp a
//! stale local copy as the newest version and overwrite the group's data.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::time::{timeout, timeout_at, Instant};
use wealthsync_core::{FilePersistence, SyncEngine, SyncStatus};

use crate::config::Config;

/// Upper bound on waiting for a push, on top of the configured timings.
const SETTLE_GRACE: Duration = Duration::from_secs(5);

/// How long to wait for the family group's stored version.
pub const CATCH_UP_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Session {
    engine: SyncEngine,
    settle_timeout: Duration,
}

impl Session {
    /// Loads the local document and starts replication if it is shared.
    pub fn open(config: &Config) -> Self {
        let persistence = FilePersistence::new(config.data_dir.value.clone());
        let timing = config.sync.timing();
        let engine = SyncEngine::new(Arc::new(persistence), config.sync.remote(), timing);
        engine.start();

        Self {
            engine,
            settle_timeout: timing.debounce + timing.ui_timeout + SETTLE_GRACE,
        }
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Waits until the last edit has been pushed (or failed to).
    ///
    /// Returns the status at that point, or the current one on timeout.
    pub async fn settle(&self) -> SyncStatus {
        self.wait_until(self.settle_timeout, |status| {
            matches!(
                status,
                SyncStatus::Saved | SyncStatus::Error | SyncStatus::Idle
            )
        })
        .await
    }

    /// Waits for the group's stored version to arrive, up to `limit`.
    ///
    /// Returns immediately for local-only documents and in demo mode.
    /// Returns false if the group could not be reached in time.
    pub async fn catch_up(&self, limit: Duration) -> bool {
        if self.engine.is_caught_up() {
            return true;
        }
        match timeout(limit, self.engine.caught_up()).await {
            Ok(true) => true,
            Ok(false) | Err(_) => {
                tracing::debug!("Not caught up with status {}", self.engine.status());
                false
            }
        }
    }

    /// Opens a session ready for editing.
    ///
    /// If the group cannot be reached the local copy is used as-is; its edits
    /// are pushed once the group is reachable again.
    pub async fn open_for_edit(config: &Config) -> Self {
        let session = Self::open(config);
        if !session.catch_up(CATCH_UP_TIMEOUT).await {
            eprintln!("Warning: family group unreachable; editing the local copy.");
        }
        session
    }

    async fn wait_until(&self, limit: Duration, done: impl Fn(SyncStatus) -> bool) -> SyncStatus {
        let deadline = Instant::now() + limit;
        let mut events = self.engine.events();

        loop {
            let status = self.engine.status();
            if done(status) {
                return status;
            }
            match timeout_at(deadline, events.recv()).await {
                Ok(Ok(_)) | Ok(Err(RecvError::Lagged(_))) => continue,
                Ok(Err(RecvError::Closed)) | Err(_) => {
                    tracing::debug!("Stopped waiting with status {}", status);
                    return self.engine.status();
                }
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.engine.dispose();
    }
}

/// Prints how replication of the last edit went.
pub fn report(session: &Session, status: SyncStatus) {
    let engine = session.engine();
    if engine.group().is_none() {
        return;
    }
    match status {
        SyncStatus::Saved if engine.is_demo() => {
            println!("Saved locally (demo mode, not shared)");
        }
        SyncStatus::Saved => println!("Synced with family group"),
        SyncStatus::Error => {
            println!("Saved locally; sync failed. It will be retried on the next run.")
        }
        other => println!("Saved locally; sync still {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigSource, ConfigValue, SyncConfig};
    use tempfile::tempdir;
    use wealthsync_core::{Document, DocumentUpdate, GroupKey, LocalPersistence};

    fn local_config(dir: &std::path::Path) -> Config {
        Config {
            data_dir: ConfigValue::new(dir.to_path_buf(), ConfigSource::Default),
            config_file: None,
            sync: SyncConfig {
                server_url: None,
                debounce_ms: 20,
                ui_timeout_ms: 50,
            },
        }
    }

    #[tokio::test]
    async fn test_edits_survive_sessions() {
        let dir = tempdir().unwrap();
        let config = local_config(dir.path());

        {
            let session = Session::open(&config);
            session
                .engine()
                .mutate(DocumentUpdate::new().monthly_contribution(12_000.0));
            assert_eq!(session.settle().await, SyncStatus::Idle);
        }

        let session = Session::open(&config);
        assert_eq!(
            session.engine().document().payload.monthly_contribution,
            12_000.0
        );
    }

    #[tokio::test]
    async fn test_demo_group_settles_saved() {
        let dir = tempdir().unwrap();
        let session = Session::open(&local_config(dir.path()));

        let key = session.engine().create_group().await;
        assert!(session.engine().is_demo());
        assert_eq!(session.settle().await, SyncStatus::Saved);

        let reopened = Session::open(&local_config(dir.path()));
        assert_eq!(reopened.engine().group(), Some(key));
    }

    #[tokio::test]
    async fn test_catch_up_is_immediate_when_not_shared() {
        let dir = tempdir().unwrap();
        let session = Session::open(&local_config(dir.path()));

        assert!(session.catch_up(Duration::from_secs(30)).await);
        assert_eq!(session.engine().status(), SyncStatus::Idle);
    }

    #[tokio::test]
    async fn test_catch_up_with_unreachable_server_uses_local_copy() {
        let dir = tempdir().unwrap();
        FilePersistence::new(dir.path().to_path_buf())
            .save(&Document {
                group_id: Some(GroupKey::parse("ABCD-1234").unwrap()),
                logical_clock: 100,
                ..Default::default()
            })
            .unwrap();
        let mut config = local_config(dir.path());
        config.sync.server_url = Some("http://127.0.0.1:9".to_string());

        let session = Session::open(&config);

        assert!(session.catch_up(Duration::from_secs(5)).await);
        assert!(session.engine().is_demo());
        assert_eq!(session.engine().document().logical_clock, 100);
    }
}
