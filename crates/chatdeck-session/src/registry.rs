//! The subscribed-chatroom collection.
//!
//! Owns add/remove/rename/reorder and the write-through persistence of
//! the chatroom list. Adding is two-phase because the handle must be
//! resolved by an external lookup: `begin_add` records the pending
//! handle and the session emits the lookup action; `complete_add` /
//! `fail_add` settle it. A failed or duplicate resolution leaves no
//! partial state behind: add is all-or-nothing.

use std::collections::{HashMap, HashSet};

use chatdeck_core::{ChatroomId, KvStore, StorageError};

use crate::{
    chatroom::{Chatroom, StreamerProfile},
    error::SessionError,
    event::ResolvedProfile,
};

const CHATROOMS_KEY: &str = "chatrooms";

/// Subscribed chatrooms plus in-flight lookups.
#[derive(Debug, Clone)]
pub struct ChatroomRegistry<S: KvStore> {
    store: S,
    /// Insertion order is preserved; `order` ties resolve by position.
    chatrooms: Vec<Chatroom>,
    /// Lowercased handles with a lookup in flight.
    pending_lookups: HashSet<String>,
}

impl<S: KvStore> ChatroomRegistry<S> {
    /// Create a registry, restoring the persisted chatroom list.
    ///
    /// Malformed or unreadable stored data degrades to an empty list.
    pub fn new(store: S) -> Self {
        let chatrooms = match store.get(CHATROOMS_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "discarding malformed persisted chatroom list");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "chatroom list restore failed, starting empty");
                Vec::new()
            },
        };
        Self { store, chatrooms, pending_lookups: HashSet::new() }
    }

    /// Start adding a chatroom by handle.
    ///
    /// Rejects with [`SessionError::AlreadySubscribed`] when the
    /// handle matches an existing chatroom's username or a lookup
    /// already in flight.
    pub fn begin_add(&mut self, handle: &str) -> Result<(), SessionError> {
        let key = handle.trim().to_lowercase();
        let duplicate = self.chatrooms.iter().any(|c| c.username.eq_ignore_ascii_case(&key))
            || self.pending_lookups.contains(&key);
        if duplicate {
            return Err(SessionError::AlreadySubscribed { handle: handle.to_string() });
        }
        self.pending_lookups.insert(key);
        Ok(())
    }

    /// Whether a lookup for this handle is in flight.
    pub fn is_pending(&self, handle: &str) -> bool {
        self.pending_lookups.contains(&handle.trim().to_lowercase())
    }

    /// Settle a successful lookup: create the chatroom and persist.
    ///
    /// The no-duplicate guarantee holds on the resolved identity too:
    /// if the id already exists (e.g. two handles for one channel),
    /// the pending entry is cleared and no second chatroom is created.
    pub fn complete_add(
        &mut self,
        handle: &str,
        profile: ResolvedProfile,
    ) -> Result<ChatroomId, SessionError> {
        self.pending_lookups.remove(&handle.trim().to_lowercase());

        if self.chatrooms.iter().any(|c| c.id == profile.chatroom_id) {
            return Err(SessionError::AlreadySubscribed { handle: handle.to_string() });
        }

        let order = self.chatrooms.iter().map(|c| c.order).max().map_or(0, |o| o + 1);
        let chatroom = Chatroom {
            id: profile.chatroom_id,
            username: profile.username,
            display_name: None,
            order,
            streamer: StreamerProfile { user_id: profile.user_id, metadata: profile.metadata },
            is_live: false,
        };
        let id = chatroom.id;
        self.chatrooms.push(chatroom);
        if let Err(e) = self.persist() {
            // Add is all-or-nothing: a failed write must not leave a
            // half-created chatroom behind.
            self.chatrooms.pop();
            return Err(e);
        }
        Ok(id)
    }

    /// Settle a failed lookup: clear the pending entry.
    pub fn fail_add(&mut self, handle: &str) {
        self.pending_lookups.remove(&handle.trim().to_lowercase());
    }

    /// Remove a chatroom and persist the updated list.
    ///
    /// Returns the removed chatroom so the caller can cascade cleanup;
    /// `None` for unknown ids (safe no-op).
    pub fn remove(&mut self, chatroom_id: ChatroomId) -> Result<Option<Chatroom>, SessionError> {
        let Some(removed) = self.take(chatroom_id) else {
            return Ok(None);
        };
        self.persist()?;
        Ok(Some(removed))
    }

    /// Remove a chatroom from the in-memory list without persisting.
    ///
    /// The caller pairs this with [`persist`](Self::persist) when it
    /// must finish cascading cleanup even if the write fails.
    pub fn take(&mut self, chatroom_id: ChatroomId) -> Option<Chatroom> {
        let pos = self.chatrooms.iter().position(|c| c.id == chatroom_id)?;
        Some(self.chatrooms.remove(pos))
    }

    /// Override a chatroom's display name and persist.
    ///
    /// An empty name clears the override (display falls back to the
    /// username).
    pub fn rename(&mut self, chatroom_id: ChatroomId, name: &str) -> Result<(), SessionError> {
        let room = self
            .chatrooms
            .iter_mut()
            .find(|c| c.id == chatroom_id)
            .ok_or(SessionError::ChatroomNotFound { chatroom_id })?;
        let trimmed = name.trim();
        room.display_name = if trimmed.is_empty() { None } else { Some(trimmed.to_string()) };
        self.persist()
    }

    /// Apply new order values and persist. Unknown ids are ignored.
    pub fn reorder(&mut self, orders: &HashMap<ChatroomId, u32>) -> Result<(), SessionError> {
        for room in &mut self.chatrooms {
            if let Some(order) = orders.get(&room.id) {
                room.order = *order;
            }
        }
        self.persist()
    }

    /// Whether a chatroom with this id is subscribed.
    pub fn contains(&self, chatroom_id: ChatroomId) -> bool {
        self.chatrooms.iter().any(|c| c.id == chatroom_id)
    }

    /// Chatroom by id.
    pub fn get(&self, chatroom_id: ChatroomId) -> Option<&Chatroom> {
        self.chatrooms.iter().find(|c| c.id == chatroom_id)
    }

    /// Mutable chatroom by id (feed-derived metadata updates).
    pub fn get_mut(&mut self, chatroom_id: ChatroomId) -> Option<&mut Chatroom> {
        self.chatrooms.iter_mut().find(|c| c.id == chatroom_id)
    }

    /// All chatrooms in insertion order.
    pub fn chatrooms(&self) -> &[Chatroom] {
        &self.chatrooms
    }

    /// Chatrooms sorted for display: by `order`, ties by insertion.
    pub fn ordered(&self) -> Vec<&Chatroom> {
        let mut rooms: Vec<&Chatroom> = self.chatrooms.iter().collect();
        rooms.sort_by_key(|c| c.order);
        rooms
    }

    /// Persist the current list write-through.
    pub fn persist(&self) -> Result<(), SessionError> {
        let raw = serde_json::to_string(&self.chatrooms).map_err(|e| {
            StorageError::WriteFailed { key: CHATROOMS_KEY.to_string(), reason: e.to_string() }
        })?;
        self.store.set(CHATROOMS_KEY, &raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chatdeck_core::MemoryStore;

    use super::*;

    fn profile(chatroom_id: ChatroomId, username: &str) -> ResolvedProfile {
        ResolvedProfile {
            chatroom_id,
            user_id: chatroom_id + 100,
            username: username.into(),
            metadata: serde_json::Value::Null,
        }
    }

    fn add(registry: &mut ChatroomRegistry<MemoryStore>, id: ChatroomId, handle: &str) {
        registry.begin_add(handle).unwrap();
        registry.complete_add(handle, profile(id, handle)).unwrap();
    }

    #[test]
    fn add_assigns_increasing_order() {
        let mut registry = ChatroomRegistry::new(MemoryStore::new());
        add(&mut registry, 1, "alice");
        add(&mut registry, 2, "bob");

        assert_eq!(registry.get(1).unwrap().order, 0);
        assert_eq!(registry.get(2).unwrap().order, 1);
    }

    #[test]
    fn duplicate_handle_is_rejected_before_lookup() {
        let mut registry = ChatroomRegistry::new(MemoryStore::new());
        add(&mut registry, 1, "alice");

        assert_eq!(
            registry.begin_add("Alice"),
            Err(SessionError::AlreadySubscribed { handle: "Alice".into() })
        );
    }

    #[test]
    fn concurrent_lookup_for_same_handle_is_rejected() {
        let mut registry = ChatroomRegistry::new(MemoryStore::new());
        registry.begin_add("alice").unwrap();
        assert!(registry.begin_add("alice").is_err());
    }

    #[test]
    fn duplicate_resolved_id_leaves_no_partial_state() {
        let mut registry = ChatroomRegistry::new(MemoryStore::new());
        add(&mut registry, 1, "alice");

        // A different handle resolving to the same chatroom.
        registry.begin_add("alice_alt").unwrap();
        let result = registry.complete_add("alice_alt", profile(1, "alice"));
        assert!(result.is_err());
        assert_eq!(registry.chatrooms().len(), 1);
        assert!(!registry.is_pending("alice_alt"));
    }

    #[test]
    fn failed_lookup_clears_pending() {
        let mut registry = ChatroomRegistry::new(MemoryStore::new());
        registry.begin_add("alice").unwrap();
        registry.fail_add("alice");

        assert!(!registry.is_pending("alice"));
        assert!(registry.begin_add("alice").is_ok(), "retry is possible after failure");
    }

    #[test]
    fn remove_unknown_is_noop() {
        let mut registry = ChatroomRegistry::new(MemoryStore::new());
        assert_eq!(registry.remove(99).unwrap(), None);
    }

    #[test]
    fn list_survives_reload() {
        let store = MemoryStore::new();
        let mut registry = ChatroomRegistry::new(store.clone());
        add(&mut registry, 1, "alice");
        registry.rename(1, "Alice!").unwrap();

        let reloaded = ChatroomRegistry::new(store);
        assert_eq!(reloaded.get(1).unwrap().title(), "Alice!");
    }

    #[test]
    fn malformed_stored_list_degrades_to_empty() {
        let store = MemoryStore::new();
        store.set(CHATROOMS_KEY, "{broken").unwrap();
        let registry = ChatroomRegistry::new(store);
        assert!(registry.chatrooms().is_empty());
    }

    #[test]
    fn reorder_ignores_unknown_ids() {
        let mut registry = ChatroomRegistry::new(MemoryStore::new());
        add(&mut registry, 1, "alice");
        add(&mut registry, 2, "bob");

        let mut orders = HashMap::new();
        orders.insert(2_u64, 0_u32);
        orders.insert(1, 1);
        orders.insert(99, 5);
        registry.reorder(&orders).unwrap();

        let ordered = registry.ordered();
        assert_eq!(ordered[0].id, 2);
        assert_eq!(ordered[1].id, 1);
    }

    #[test]
    fn rename_unknown_is_an_error() {
        let mut registry = ChatroomRegistry::new(MemoryStore::new());
        assert_eq!(
            registry.rename(99, "x"),
            Err(SessionError::ChatroomNotFound { chatroom_id: 99 })
        );
    }
}
