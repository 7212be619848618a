use std::fmt;
use std::time::Duration;

use crate::document::Document;

/// Observable replication state of an engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SyncStatus {
    /// Not shared, or nothing has happened since the group was set.
    #[default]
    Idle,
    /// Subscription to the group is being established.
    Connecting,
    /// A push is scheduled or in flight.
    Syncing,
    /// The last operation settled successfully.
    Saved,
    /// The last push or subscription attempt failed.
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Connecting => "connecting",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Saved => "saved",
            SyncStatus::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification sent to engine listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Status(SyncStatus),
    /// The in-memory document changed (local edit or accepted remote version).
    Document(Document),
    /// The group's stored version has been delivered since the group was
    /// (re)opened.
    CaughtUp,
}

/// Timing knobs for outbound pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTiming {
    /// Quiet period after the last edit before a push is sent.
    pub debounce: Duration,
    /// How long a push may take before status optimistically reports saved.
    pub ui_timeout: Duration,
}

impl SyncTiming {
    pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);
    pub const DEFAULT_UI_TIMEOUT: Duration = Duration::from_millis(2000);
}

impl Default for SyncTiming {
    fn default() -> Self {
        Self {
            debounce: Self::DEFAULT_DEBOUNCE,
            ui_timeout: Self::DEFAULT_UI_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(SyncStatus::Idle.to_string(), "idle");
        assert_eq!(SyncStatus::Connecting.to_string(), "connecting");
        assert_eq!(SyncStatus::Syncing.to_string(), "syncing");
        assert_eq!(SyncStatus::Saved.to_string(), "saved");
        assert_eq!(SyncStatus::Error.to_string(), "error");
    }

    #[test]
    fn test_default_timing() {
        let timing = SyncTiming::default();
        assert_eq!(timing.debounce, Duration::from_millis(1000));
        assert_eq!(timing.ui_timeout, Duration::from_millis(2000));
    }
}
