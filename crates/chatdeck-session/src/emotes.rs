//! Emote-set projections fed by the cosmetic transport.
//!
//! The cosmetic feed delivers at-least-once, so every delta applies
//! idempotently: adding an emote that exists replaces it, removing or
//! renaming a missing one is a no-op. The personal emote set is
//! persisted write-through; channel projections are feed-derived and
//! rebuilt on reconnect, so they stay in memory only.

use std::collections::HashMap;

use chatdeck_core::{ChatroomId, KvStore};
use serde::{Deserialize, Serialize};

use crate::event::CosmeticPayload;

const PERSONAL_EMOTES_KEY: &str = "personal_emote_sets";

/// One emote definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emote {
    /// Provider-assigned emote id.
    pub id: String,
    /// Name as typed in chat.
    pub name: String,
}

/// Per-chatroom emote projections plus the persisted personal set.
#[derive(Debug, Clone)]
pub struct EmoteStore<S: KvStore> {
    store: S,
    sets: HashMap<ChatroomId, Vec<Emote>>,
    personal: Vec<Emote>,
}

impl<S: KvStore> EmoteStore<S> {
    /// Create a store, restoring the persisted personal set.
    pub fn new(store: S) -> Self {
        let personal = match store.get(PERSONAL_EMOTES_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "discarding malformed personal emote set");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "personal emote restore failed, starting empty");
                Vec::new()
            },
        };
        Self { store, sets: HashMap::new(), personal }
    }

    /// Apply one cosmetic delta to a chatroom's projection.
    ///
    /// Returns whether the projection changed.
    pub fn apply(&mut self, chatroom_id: ChatroomId, payload: &CosmeticPayload) -> bool {
        let set = self.sets.entry(chatroom_id).or_default();
        match payload {
            CosmeticPayload::EmoteAdded(emote) => {
                if let Some(existing) = set.iter_mut().find(|e| e.id == emote.id) {
                    if *existing == *emote {
                        return false;
                    }
                    *existing = emote.clone();
                } else {
                    set.push(emote.clone());
                }
                true
            },
            CosmeticPayload::EmoteRemoved { emote_id } => {
                let before = set.len();
                set.retain(|e| e.id != *emote_id);
                set.len() != before
            },
            CosmeticPayload::EmoteRenamed { emote_id, name } => {
                match set.iter_mut().find(|e| e.id == *emote_id) {
                    Some(emote) if emote.name != *name => {
                        emote.name = name.clone();
                        true
                    },
                    _ => false,
                }
            },
        }
    }

    /// Replace the personal emote set and persist it.
    ///
    /// A persistence failure is logged, not propagated; the feed will
    /// re-announce the set on the next reconnect.
    pub fn set_personal(&mut self, emotes: Vec<Emote>) {
        self.personal = emotes;
        match serde_json::to_string(&self.personal) {
            Ok(raw) => {
                if let Err(e) = self.store.set(PERSONAL_EMOTES_KEY, &raw) {
                    tracing::warn!(error = %e, "failed to persist personal emote set");
                }
            },
            Err(e) => tracing::warn!(error = %e, "failed to encode personal emote set"),
        }
    }

    /// Emote projection for a chatroom.
    pub fn for_chatroom(&self, chatroom_id: ChatroomId) -> &[Emote] {
        self.sets.get(&chatroom_id).map_or(&[], Vec::as_slice)
    }

    /// The local user's personal emote set.
    pub fn personal(&self) -> &[Emote] {
        &self.personal
    }

    /// Drop a chatroom's projection.
    pub fn purge(&mut self, chatroom_id: ChatroomId) {
        self.sets.remove(&chatroom_id);
    }
}

#[cfg(test)]
mod tests {
    use chatdeck_core::MemoryStore;

    use super::*;

    fn emote(id: &str, name: &str) -> Emote {
        Emote { id: id.into(), name: name.into() }
    }

    #[test]
    fn add_is_idempotent() {
        let mut emotes = EmoteStore::new(MemoryStore::new());
        let delta = CosmeticPayload::EmoteAdded(emote("e1", "pog"));

        assert!(emotes.apply(1, &delta));
        assert!(!emotes.apply(1, &delta));
        assert_eq!(emotes.for_chatroom(1).len(), 1);
    }

    #[test]
    fn remove_missing_is_noop() {
        let mut emotes = EmoteStore::new(MemoryStore::new());
        assert!(!emotes.apply(1, &CosmeticPayload::EmoteRemoved { emote_id: "e1".into() }));
    }

    #[test]
    fn rename_updates_in_place() {
        let mut emotes = EmoteStore::new(MemoryStore::new());
        emotes.apply(1, &CosmeticPayload::EmoteAdded(emote("e1", "pog")));
        assert!(emotes.apply(
            1,
            &CosmeticPayload::EmoteRenamed { emote_id: "e1".into(), name: "pogchamp".into() }
        ));
        assert_eq!(emotes.for_chatroom(1)[0].name, "pogchamp");
    }

    #[test]
    fn personal_set_survives_reload() {
        let store = MemoryStore::new();
        let mut emotes = EmoteStore::new(store.clone());
        emotes.set_personal(vec![emote("p1", "mine")]);

        let reloaded = EmoteStore::new(store);
        assert_eq!(reloaded.personal().len(), 1);
    }
}
