//! JSON-file store backend.
//!
//! The whole store is one JSON object. Writes go to a sibling temp file
//! which is renamed over the target, so a reader never observes a torn
//! file; the in-memory map is the source of truth between flushes.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;

use super::KeyValueStore;
use crate::error::BridgeError;

/// A [`KeyValueStore`] persisted as a single JSON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    slots: Mutex<HashMap<String, Value>>,
}

impl FileStore {
    /// Opens the store at `path`, loading existing contents if the file
    /// exists.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let path = path.as_ref().to_path_buf();
        let slots = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(BridgeError::storage)?;
            serde_json::from_str(&raw).map_err(BridgeError::serialization)?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            slots: Mutex::new(slots),
        })
    }

    fn flush(&self, slots: &HashMap<String, Value>) -> Result<(), BridgeError> {
        let raw = serde_json::to_string(slots).map_err(BridgeError::serialization)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw).map_err(BridgeError::storage)?;
        fs::rename(&tmp, &self.path).map_err(BridgeError::storage)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.slots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl KeyValueStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<Value>, BridgeError> {
        Ok(self.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: Value) -> Result<(), BridgeError> {
        let mut slots = self.lock();
        slots.insert(key.to_string(), value);
        self.flush(&slots)
    }

    fn remove(&self, key: &str) -> Result<(), BridgeError> {
        let mut slots = self.lock();
        if slots.remove(key).is_none() {
            return Ok(());
        }
        self.flush(&slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_contents_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.json");

        {
            let store = FileStore::open(&path).unwrap();
            store.write("walletLocked", json!(true)).unwrap();
            store.write("savedVCs", json!([{"id": "urn:uuid:1"}])).unwrap();
        }

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.read("walletLocked").unwrap(), Some(json!(true)));
        assert_eq!(
            reopened.read("savedVCs").unwrap(),
            Some(json!([{"id": "urn:uuid:1"}]))
        );
    }

    #[test]
    fn test_remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.json");

        let store = FileStore::open(&path).unwrap();
        store.write("k", json!(1)).unwrap();
        store.remove("k").unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert!(reopened.read("k").unwrap().is_none());
    }

    #[test]
    fn test_open_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.json");
        fs::write(&path, b"{ not json").unwrap();

        assert!(matches!(
            FileStore::open(&path),
            Err(BridgeError::Serialization(_))
        ));
    }
}
