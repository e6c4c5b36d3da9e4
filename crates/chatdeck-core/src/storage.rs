//! Key-value persistence abstraction.
//!
//! Trait-based abstraction for the durable store backing the chatroom
//! list, drafts, and other small blobs. The trait is synchronous (no
//! async) to keep callers' APIs clean; values are opaque strings and
//! callers decide the encoding (in practice, JSON documents).

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use thiserror::Error;

/// Errors from the persistence backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Read failed for a key.
    #[error("storage read failed for {key}: {reason}")]
    ReadFailed {
        /// Key that was requested.
        key: String,
        /// Backend-reported reason.
        reason: String,
    },

    /// Write failed for a key.
    #[error("storage write failed for {key}: {reason}")]
    WriteFailed {
        /// Key that was written.
        key: String,
        /// Backend-reported reason.
        reason: String,
    },
}

/// Synchronous key-value store.
///
/// Must be `Clone` (shared with multiple subsystems), `Send + Sync`,
/// and synchronous. Implementations typically share internal state via
/// `Arc`, so clones access the same underlying storage.
pub trait KvStore: Clone + Send + Sync + 'static {
    /// Read the value stored under `key`. `None` if absent.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, overwriting any existing value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove the value stored under `key`. No-op if absent.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory store for testing and simulation.
///
/// `HashMap` behind `Arc<Mutex<_>>` so clones share state. Lock
/// poisoning is absorbed rather than propagated: the map holds plain
/// strings, so a panicking writer cannot leave it torn.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.inner.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_roundtrip() {
        let store = MemoryStore::new();
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn remove_missing_key_is_noop() {
        let store = MemoryStore::new();
        assert!(store.remove("absent").is_ok());
        assert_eq!(store.get("absent").unwrap(), None);
    }

    #[test]
    fn clones_share_state() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.set("k", "v").unwrap();
        assert_eq!(other.get("k").unwrap().as_deref(), Some("v"));
    }
}
