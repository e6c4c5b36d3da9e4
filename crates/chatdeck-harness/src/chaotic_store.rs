//! Failure-injecting persistence decorator.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use chatdeck_core::{KvStore, MemoryStore, StorageError};

/// A [`KvStore`] wrapping [`MemoryStore`] with switchable fault
/// injection, for exercising storage-failure policies.
#[derive(Debug, Clone, Default)]
pub struct ChaoticStore {
    inner: MemoryStore,
    fail_writes: Arc<AtomicBool>,
    fail_reads: Arc<AtomicBool>,
}

impl ChaoticStore {
    /// Create a healthy store; flip failures on when needed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent read fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// The wrapped in-memory store, for direct inspection.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

impl KvStore for ChaoticStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::ReadFailed {
                key: key.to_string(),
                reason: "injected read failure".to_string(),
            });
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::WriteFailed {
                key: key.to_string(),
                reason: "injected write failure".to_string(),
            });
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::WriteFailed {
                key: key.to_string(),
                reason: "injected write failure".to_string(),
            });
        }
        self.inner.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_fail_when_injected() {
        let store = ChaoticStore::new();
        store.set("k", "v").unwrap();

        store.fail_writes(true);
        assert!(store.set("k", "v2").is_err());

        // The earlier value is still readable.
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    }
}
