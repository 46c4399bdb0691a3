//! The durable request store.
//!
//! A small key/value store visible to all contexts. It persists one
//! in-flight request record per class, the saved credential and soulbound
//! lists, and the wallet lock flag, so that closing and reopening the
//! approval surface loses nothing. The orchestrator is the sole writer;
//! other contexts only ever read.

use std::sync::Arc;

use serde_json::Value;

use crate::defaults;
use crate::error::BridgeError;
use crate::pending::{PendingRequest, RequestClass};

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Backend contract for the durable request store.
///
/// Implementations must make each `write` atomic with respect to concurrent
/// readers (a reader sees either the old or the new value, never a torn
/// one). In-memory and atomic-rename file implementations are provided;
/// embedders with platform storage (e.g. extension local storage) supply
/// their own.
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`, or `None` if the slot is empty.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be read.
    fn read(&self, key: &str) -> Result<Option<Value>, BridgeError>;

    /// Stores `value` under `key`, replacing any existing value.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be written.
    fn write(&self, key: &str, value: Value) -> Result<(), BridgeError>;

    /// Removes the value stored under `key`. Removing an empty slot is not
    /// an error.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), BridgeError>;
}

/// Typed slot accessors over a [`KeyValueStore`] backend.
#[derive(Clone)]
pub struct BridgeStore {
    backend: Arc<dyn KeyValueStore>,
}

impl BridgeStore {
    /// Wraps a backend.
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Reads the pending record of `class`, if any.
    ///
    /// A slot whose contents no longer deserialize (e.g. written by an
    /// incompatible build) is treated as empty rather than wedging the
    /// class.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be read.
    pub fn pending(&self, class: RequestClass) -> Result<Option<PendingRequest>, BridgeError> {
        let Some(value) = self.backend.read(class.storage_key())? else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                log::warn!("discarding undecodable {class} slot: {err}");
                Ok(None)
            }
        }
    }

    /// Persists `record` into its class slot.
    ///
    /// # Errors
    /// Returns an error if serialization or the backend write fails.
    pub fn put_pending(&self, record: &PendingRequest) -> Result<(), BridgeError> {
        let value = serde_json::to_value(record).map_err(BridgeError::serialization)?;
        self.backend.write(record.class.storage_key(), value)
    }

    /// Clears the pending slot of `class`.
    ///
    /// # Errors
    /// Returns an error if the backend write fails.
    pub fn clear_pending(&self, class: RequestClass) -> Result<(), BridgeError> {
        self.backend.remove(class.storage_key())
    }

    /// Reads a record list slot (`savedVCs`, `savedSBTs`); an empty or
    /// missing slot is an empty list.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be read.
    pub fn record_list(&self, key: &str) -> Result<Vec<Value>, BridgeError> {
        match self.backend.read(key)? {
            Some(Value::Array(items)) => Ok(items),
            Some(_) | None => Ok(Vec::new()),
        }
    }

    /// Replaces a record list slot.
    ///
    /// # Errors
    /// Returns an error if the backend write fails.
    pub fn put_record_list(&self, key: &str, items: Vec<Value>) -> Result<(), BridgeError> {
        self.backend.write(key, Value::Array(items))
    }

    /// Whether the wallet is currently locked.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be read.
    pub fn locked(&self) -> Result<bool, BridgeError> {
        Ok(self
            .backend
            .read(defaults::KEY_WALLET_LOCKED)?
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    /// Persists the wallet lock flag.
    ///
    /// # Errors
    /// Returns an error if the backend write fails.
    pub fn set_locked(&self, locked: bool) -> Result<(), BridgeError> {
        self.backend
            .write(defaults::KEY_WALLET_LOCKED, Value::Bool(locked))
    }
}
