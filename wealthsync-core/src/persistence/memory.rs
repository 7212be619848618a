use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use super::{LocalPersistence, PersistenceError};
use crate::document::Document;

/// In-memory slot holding the serialized document.
///
/// Keeps the exact bytes written so callers can compare persisted state.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    slot: Mutex<Option<Vec<u8>>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the slot with `doc`, as if it had been saved by an earlier run.
    pub fn with_document(doc: &Document) -> Self {
        let store = Self::new();
        // Cannot fail for an in-memory slot.
        let _ = store.save(doc);
        store
    }

    /// Seeds the slot with raw bytes.
    pub fn with_raw(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            slot: Mutex::new(Some(bytes.into())),
        }
    }

    /// The bytes most recently written.
    pub fn raw(&self) -> Option<Vec<u8>> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LocalPersistence for MemoryPersistence {
    fn load(&self) -> Result<Option<Document>, PersistenceError> {
        match self.raw() {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| PersistenceError::Corrupt(PathBuf::from("<memory>"), e)),
            None => Ok(None),
        }
    }

    fn save(&self, doc: &Document) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec(doc).map_err(PersistenceError::Encode)?;
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(bytes);
        Ok(())
    }
}
