use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{LocalPersistence, PersistenceError, STORAGE_KEY};
use crate::document::Document;

/// Stores the document as compact JSON in `<data_dir>/<STORAGE_KEY>.json`.
#[derive(Debug, Clone)]
pub struct FilePersistence {
    data_dir: PathBuf,
}

impl FilePersistence {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Returns the full path of the storage slot.
    pub fn path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.json", STORAGE_KEY))
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }
}

impl LocalPersistence for FilePersistence {
    fn load(&self) -> Result<Option<Document>, PersistenceError> {
        let path = self.path();

        match fs::read(&path) {
            Ok(bytes) => {
                let doc = serde_json::from_slice(&bytes)
                    .map_err(|e| PersistenceError::Corrupt(path, e))?;
                Ok(Some(doc))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::IoError(path, e)),
        }
    }

    /// Writes to a sibling temp file and renames it over the slot so a crash
    /// mid-write leaves the previous version intact.
    fn save(&self, doc: &Document) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.data_dir)
            .map_err(|e| PersistenceError::IoError(self.data_dir.clone(), e))?;

        let bytes = serde_json::to_vec(doc).map_err(PersistenceError::Encode)?;
        let path = self.path();
        let tmp = path.with_extension("json.tmp");

        fs::write(&tmp, bytes).map_err(|e| PersistenceError::IoError(tmp.clone(), e))?;
        fs::rename(&tmp, &path).map_err(|e| PersistenceError::IoError(path, e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group_key::GroupKey;
    use crate::models::{Asset, AssetType};
    use tempfile::TempDir;

    fn test_storage() -> (FilePersistence, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = FilePersistence::new(temp_dir.path().to_path_buf());
        (storage, temp_dir)
    }

    fn sample_doc() -> Document {
        let mut doc = Document {
            group_id: Some(GroupKey::parse("ABCD-1234").unwrap()),
            logical_clock: 1_700_000_000_000,
            ..Default::default()
        };
        doc.payload
            .assets
            .push(Asset::new("Savings", 12_500.5, AssetType::Cash).with_growth_rate(4.0));
        doc
    }

    #[test]
    fn test_storage_path() {
        let (storage, _temp) = test_storage();
        assert!(storage
            .path()
            .ends_with("family_wealth_tracker_v1.json"));
    }

    #[test]
    fn test_load_nonexistent_returns_none() {
        let (storage, _temp) = test_storage();
        assert!(storage.load().unwrap().is_none());
        assert!(!storage.exists());
    }

    #[test]
    fn test_save_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested_dir = temp_dir.path().join("nested").join("data");
        let storage = FilePersistence::new(nested_dir.clone());

        storage.save(&Document::default()).unwrap();

        assert!(nested_dir.exists());
        assert!(storage.exists());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let (storage, _temp) = test_storage();
        let doc = sample_doc();

        storage.save(&doc).unwrap();
        let loaded = storage.load().unwrap().unwrap();

        assert_eq!(loaded, doc);
    }

    #[test]
    fn test_resave_is_byte_identical() {
        let (storage, _temp) = test_storage();
        storage.save(&sample_doc()).unwrap();
        let first = fs::read(storage.path()).unwrap();

        let loaded = storage.load().unwrap().unwrap();
        storage.save(&loaded).unwrap();
        let second = fs::read(storage.path()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let (storage, _temp) = test_storage();
        fs::write(storage.path(), b"{ not json").unwrap();

        let err = storage.load().unwrap_err();
        assert!(matches!(err, PersistenceError::Corrupt(_, _)));
    }

    #[test]
    fn test_partial_document_loads_with_defaults() {
        let (storage, _temp) = test_storage();
        fs::write(storage.path(), br#"{"familyId":"wxyz-9999","assets":null}"#).unwrap();

        let loaded = storage.load().unwrap().unwrap();
        assert_eq!(loaded.group_id.unwrap().as_str(), "WXYZ-9999");
        assert!(loaded.payload.assets.is_empty());
        assert_eq!(loaded.payload.milestones.len(), 2);
        assert_eq!(loaded.logical_clock, 0);
    }

    #[test]
    fn test_overwrite_existing_document() {
        let (storage, _temp) = test_storage();

        let mut doc = sample_doc();
        storage.save(&doc).unwrap();

        doc.payload.monthly_contribution = 1.0;
        storage.save(&doc).unwrap();

        let loaded = storage.load().unwrap().unwrap();
        assert_eq!(loaded.payload.monthly_contribution, 1.0);
        assert!(!storage.path().with_extension("json.tmp").exists());
    }
}
