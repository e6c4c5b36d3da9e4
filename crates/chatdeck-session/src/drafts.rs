//! Per-chatroom unsent-text persistence.
//!
//! The in-memory map is authoritative; every save writes the full map
//! through to storage. A persistence failure propagates to the caller
//! (fail loud) but the in-memory value it reported on is already
//! applied, so the UI never loses what the user typed.

use std::collections::HashMap;

use chatdeck_core::{ChatroomId, KvStore};

use crate::error::SessionError;

const DRAFTS_KEY: &str = "drafts";

/// Draft storage keyed by chatroom.
#[derive(Debug, Clone)]
pub struct DraftStore<S: KvStore> {
    store: S,
    drafts: HashMap<ChatroomId, String>,
}

impl<S: KvStore> DraftStore<S> {
    /// Create a store, restoring persisted drafts.
    ///
    /// Malformed or unreadable stored data degrades to an empty map.
    pub fn new(store: S) -> Self {
        let drafts = match store.get(DRAFTS_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "discarding malformed persisted drafts");
                HashMap::new()
            }),
            Ok(None) => HashMap::new(),
            Err(e) => {
                tracing::warn!(error = %e, "draft restore failed, starting empty");
                HashMap::new()
            },
        };
        Self { store, drafts }
    }

    /// Save a draft. Empty text clears the entry instead, since a draft
    /// exists only while non-empty.
    pub fn save(&mut self, chatroom_id: ChatroomId, text: &str) -> Result<(), SessionError> {
        if text.is_empty() {
            self.drafts.remove(&chatroom_id);
        } else {
            self.drafts.insert(chatroom_id, text.to_string());
        }
        self.persist()
    }

    /// Draft text for a chatroom; empty string if none.
    pub fn get(&self, chatroom_id: ChatroomId) -> &str {
        self.drafts.get(&chatroom_id).map_or("", String::as_str)
    }

    /// Discard a chatroom's draft.
    pub fn clear(&mut self, chatroom_id: ChatroomId) -> Result<(), SessionError> {
        if self.drafts.remove(&chatroom_id).is_none() {
            return Ok(());
        }
        self.persist()
    }

    fn persist(&self) -> Result<(), SessionError> {
        let raw = serde_json::to_string(&self.drafts).map_err(|e| {
            chatdeck_core::StorageError::WriteFailed {
                key: DRAFTS_KEY.to_string(),
                reason: e.to_string(),
            }
        })?;
        self.store.set(DRAFTS_KEY, &raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chatdeck_core::MemoryStore;

    use super::*;

    #[test]
    fn save_then_get() {
        let mut drafts = DraftStore::new(MemoryStore::new());
        drafts.save(1, "half-typed").unwrap();
        assert_eq!(drafts.get(1), "half-typed");
        assert_eq!(drafts.get(2), "");
    }

    #[test]
    fn empty_save_clears() {
        let mut drafts = DraftStore::new(MemoryStore::new());
        drafts.save(1, "text").unwrap();
        drafts.save(1, "").unwrap();
        assert_eq!(drafts.get(1), "");
    }

    #[test]
    fn drafts_survive_reload() {
        let store = MemoryStore::new();
        let mut drafts = DraftStore::new(store.clone());
        drafts.save(1, "persisted").unwrap();

        let reloaded = DraftStore::new(store);
        assert_eq!(reloaded.get(1), "persisted");
    }

    #[test]
    fn malformed_stored_drafts_degrade_to_empty() {
        let store = MemoryStore::new();
        store.set(DRAFTS_KEY, "not json").unwrap();
        let drafts = DraftStore::new(store);
        assert_eq!(drafts.get(1), "");
    }
}
