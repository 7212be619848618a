//! Durable single-slot storage for the document on one device.
//!
//! The engine reads the slot once at startup and writes it through after
//! every accepted change. Implementations must never panic on bad data:
//! unreadable or corrupt state is reported as a [`PersistenceError`] and the
//! engine continues with a default document.

mod file;
mod memory;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::document::Document;

pub use file::FilePersistence;
pub use memory::MemoryPersistence;

/// Versioned key under which the document is stored.
pub const STORAGE_KEY: &str = "family_wealth_tracker_v1";

/// Single-slot document storage.
pub trait LocalPersistence: Send + Sync {
    /// Loads the stored document.
    ///
    /// Returns `Ok(None)` if nothing has been saved yet.
    fn load(&self) -> Result<Option<Document>, PersistenceError>;

    /// Replaces the stored document.
    fn save(&self, doc: &Document) -> Result<(), PersistenceError>;
}

/// Errors that can occur reading or writing local state.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// I/O error reading or writing the slot.
    #[error("I/O error for {}: {}", .0.display(), .1)]
    IoError(PathBuf, #[source] io::Error),
    /// Stored bytes are not valid JSON.
    #[error("Stored document {} is corrupt: {}", .0.display(), .1)]
    Corrupt(PathBuf, #[source] serde_json::Error),
    /// The document could not be serialized.
    #[error("Failed to encode document: {0}")]
    Encode(#[source] serde_json::Error),
}

impl From<PersistenceError> for crate::error::SyncError {
    fn from(e: PersistenceError) -> Self {
        crate::error::SyncError::PersistenceUnavailable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_messages_name_the_slot() {
        let err = PersistenceError::IoError(
            PathBuf::from("/data/wealth.json"),
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "I/O error for /data/wealth.json: denied");
        assert!(err.source().is_some());

        let corrupt = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = PersistenceError::Corrupt(PathBuf::from("/data/wealth.json"), corrupt);
        assert!(err
            .to_string()
            .starts_with("Stored document /data/wealth.json is corrupt:"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_converts_to_persistence_unavailable() {
        let err = PersistenceError::IoError(
            PathBuf::from("/data"),
            io::Error::new(io::ErrorKind::Other, "disk full"),
        );
        let sync: crate::error::SyncError = err.into();
        assert!(matches!(
            sync,
            crate::error::SyncError::PersistenceUnavailable(ref msg) if msg.contains("disk full")
        ));
    }
}
