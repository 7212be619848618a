//! Error taxonomy for the replication engine.

use thiserror::Error;

use crate::group_key::GroupKeyError;

/// Errors surfaced by persistence, remote stores and the sync engine.
///
/// Only [`SyncError::InvalidGroupKey`] is ever returned to a caller editing
/// data; the others are absorbed by the engine, logged, and reflected in
/// the sync status.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Local storage could not be read or written.
    #[error("Local persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    /// The live store could not be reached, initialised or authenticated.
    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),

    /// A push reached the remote store and was rejected.
    #[error("Push failed: {0}")]
    PushFailed(String),

    /// A join key was rejected before any network call.
    #[error("Invalid group key: {0}")]
    InvalidGroupKey(#[from] GroupKeyError),
}

pub type SyncResult<T> = Result<T, SyncError>;
