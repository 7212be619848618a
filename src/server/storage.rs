//! Server-side family document storage.
//!
//! Stores one JSON document per family group:
//! ```text
//! <DATA_DIR>/
//!   families/
//!     ABCD-1234.json
//!     WXYZ-9876.json
//! ```
//!
//! Documents are opaque to the server apart from being JSON objects.
//! Writes go through a temp file and a rename, so a crash never leaves a
//! half-written document behind.

use serde_json::Value;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;

/// Errors that can occur during server storage operations.
#[derive(Debug)]
pub enum FamilyStorageError {
    /// I/O error reading or writing a file.
    IoError(PathBuf, io::Error),
    /// Stored file is not valid JSON.
    Corrupt(PathBuf, serde_json::Error),
    /// Invalid family ID (e.g., contains path separators).
    InvalidFamilyId(String),
}

impl std::fmt::Display for FamilyStorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FamilyStorageError::IoError(path, e) => {
                write!(f, "I/O error for {}: {}", path.display(), e)
            }
            FamilyStorageError::Corrupt(path, e) => {
                write!(f, "Failed to parse document {}: {}", path.display(), e)
            }
            FamilyStorageError::InvalidFamilyId(id) => {
                write!(f, "Invalid family ID: {}", id)
            }
        }
    }
}

impl std::error::Error for FamilyStorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FamilyStorageError::IoError(_, e) => Some(e),
            FamilyStorageError::Corrupt(_, e) => Some(e),
            FamilyStorageError::InvalidFamilyId(_) => None,
        }
    }
}

/// File-backed storage for family documents.
#[derive(Debug, Clone)]
pub struct FamilyStorage {
    data_dir: PathBuf,
}

impl FamilyStorage {
    /// Creates a new storage instance rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Validates a family ID to prevent path traversal attacks.
    pub fn validate_family_id(family_id: &str) -> Result<(), FamilyStorageError> {
        if family_id.is_empty()
            || family_id.starts_with('.')
            || !family_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(FamilyStorageError::InvalidFamilyId(family_id.to_string()));
        }
        Ok(())
    }

    fn families_dir(&self) -> PathBuf {
        self.data_dir.join("families")
    }

    fn doc_path(&self, family_id: &str) -> PathBuf {
        self.families_dir().join(format!("{}.json", family_id))
    }

    /// Loads a family's document.
    ///
    /// Returns `Ok(None)` if nothing has been stored yet.
    pub fn load(&self, family_id: &str) -> Result<Option<Value>, FamilyStorageError> {
        Self::validate_family_id(family_id)?;

        let path = self.doc_path(family_id);
        match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| FamilyStorageError::Corrupt(path, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FamilyStorageError::IoError(path, e)),
        }
    }

    /// Replaces a family's document.
    pub fn save(&self, family_id: &str, doc: &Value) -> Result<(), FamilyStorageError> {
        Self::validate_family_id(family_id)?;

        let dir = self.families_dir();
        let path = self.doc_path(family_id);

        fs::create_dir_all(&dir).map_err(|e| FamilyStorageError::IoError(dir.clone(), e))?;

        let bytes =
            serde_json::to_vec(doc).map_err(|e| FamilyStorageError::Corrupt(path.clone(), e))?;

        // Write atomically using temp file + rename
        let temp_path = path.with_extension("json.tmp");

        let mut file = File::create(&temp_path)
            .map_err(|e| FamilyStorageError::IoError(temp_path.clone(), e))?;

        file.write_all(&bytes)
            .map_err(|e| FamilyStorageError::IoError(temp_path.clone(), e))?;

        file.sync_all()
            .map_err(|e| FamilyStorageError::IoError(temp_path.clone(), e))?;

        fs::rename(&temp_path, &path).map_err(|e| FamilyStorageError::IoError(path, e))?;

        Ok(())
    }

    /// Checks if a document exists for a family.
    pub fn exists(&self, family_id: &str) -> Result<bool, FamilyStorageError> {
        Self::validate_family_id(family_id)?;
        Ok(self.doc_path(family_id).exists())
    }
}
