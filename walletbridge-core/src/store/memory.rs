//! In-memory store backend for tests and the demo CLI.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use super::KeyValueStore;
use crate::error::BridgeError;

/// A [`KeyValueStore`] holding everything in a process-local map.
///
/// Survives surface restarts within one process, which is all the demo and
/// the test harness need.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.slots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<Value>, BridgeError> {
        Ok(self.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: Value) -> Result<(), BridgeError> {
        self.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), BridgeError> {
        self.lock().remove(key);
        Ok(())
    }
}
