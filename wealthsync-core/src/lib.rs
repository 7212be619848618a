//! WealthSync Core Library
//!
//! Local-first replication of a family net-worth document: the document
//! model, local persistence, remote stores and the sync engine tying them
//! together.

pub mod clock;
pub mod document;
pub mod engine;
pub mod error;
pub mod group_key;
pub mod models;
pub mod persistence;
pub mod remote;

pub use document::{Document, DocumentUpdate, Payload};
pub use engine::{RemoteProvider, SyncEngine, SyncEvent, SyncStatus, SyncTiming};
pub use error::{SyncError, SyncResult};
pub use group_key::{GroupKey, GroupKeyError};
pub use models::{Asset, AssetType, Liability, LiabilityType, Milestone, Snapshot};
pub use persistence::{
    FilePersistence, LocalPersistence, MemoryPersistence, PersistenceError, STORAGE_KEY,
};
pub use remote::{DemoStore, LiveStore, MemoryStore, RemoteConfig, RemoteStore, Subscription};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
