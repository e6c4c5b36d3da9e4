//! Storage and read-state of messages that flag the local user.
//!
//! The tracker does no extraction itself: the session decides what
//! counts as a mention and hands finished entries in. All operations
//! are pure in-memory map mutations; read flags are monotonic (they
//! only ever flip `false -> true`).

use std::collections::HashMap;

use chatdeck_core::ChatroomId;

use crate::message::Message;

/// Why a message was flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MentionKind {
    /// The local user's name appeared in the message.
    Username,
    /// A configured highlight keyword appeared in the message.
    Keyword,
}

/// One flagged message.
#[derive(Debug, Clone, PartialEq)]
pub struct Mention {
    /// Tracker-assigned id.
    pub id: u64,
    /// Chatroom the triggering message belongs to.
    pub chatroom_id: ChatroomId,
    /// The triggering message (a copy; deleting the mention never
    /// touches history).
    pub message: Message,
    /// Why it was flagged.
    pub kind: MentionKind,
    /// Whether the user has seen it.
    pub read: bool,
    /// Unix milliseconds when the mention was recorded.
    pub timestamp: u64,
}

/// In-memory mention store.
#[derive(Debug, Clone, Default)]
pub struct MentionTracker {
    next_id: u64,
    mentions: HashMap<ChatroomId, Vec<Mention>>,
}

impl MentionTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mention; returns its assigned id.
    pub fn add(
        &mut self,
        chatroom_id: ChatroomId,
        message: Message,
        kind: MentionKind,
        timestamp: u64,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.mentions.entry(chatroom_id).or_default().push(Mention {
            id,
            chatroom_id,
            message,
            kind,
            read: false,
            timestamp,
        });
        id
    }

    /// All mentions across chatrooms, oldest first.
    pub fn all(&self) -> Vec<&Mention> {
        let mut flat: Vec<&Mention> = self.mentions.values().flatten().collect();
        flat.sort_by_key(|m| (m.timestamp, m.id));
        flat
    }

    /// Mentions for one chatroom, in arrival order.
    pub fn for_chatroom(&self, chatroom_id: ChatroomId) -> &[Mention] {
        self.mentions.get(&chatroom_id).map_or(&[], Vec::as_slice)
    }

    /// Count of unread mentions across all chatrooms.
    pub fn unread_count(&self) -> usize {
        self.mentions.values().flatten().filter(|m| !m.read).count()
    }

    /// Count of unread mentions for one chatroom.
    pub fn unread_count_for(&self, chatroom_id: ChatroomId) -> usize {
        self.for_chatroom(chatroom_id).iter().filter(|m| !m.read).count()
    }

    /// Mark one mention read. Returns whether anything changed.
    pub fn mark_read(&mut self, mention_id: u64) -> bool {
        for entries in self.mentions.values_mut() {
            if let Some(m) = entries.iter_mut().find(|m| m.id == mention_id) {
                let changed = !m.read;
                m.read = true;
                return changed;
            }
        }
        false
    }

    /// Mark every existing mention read. Mentions added afterwards
    /// start unread as usual.
    pub fn mark_all_read(&mut self) -> bool {
        let mut changed = false;
        for m in self.mentions.values_mut().flatten() {
            changed |= !m.read;
            m.read = true;
        }
        changed
    }

    /// Mark one chatroom's mentions read.
    pub fn mark_chatroom_read(&mut self, chatroom_id: ChatroomId) -> bool {
        let mut changed = false;
        if let Some(entries) = self.mentions.get_mut(&chatroom_id) {
            for m in entries {
                changed |= !m.read;
                m.read = true;
            }
        }
        changed
    }

    /// Remove one chatroom's mentions, or all when `chatroom_id` is
    /// `None`.
    pub fn clear(&mut self, chatroom_id: Option<ChatroomId>) {
        match chatroom_id {
            Some(id) => {
                self.mentions.remove(&id);
            },
            None => self.mentions.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chatdeck_core::UserIdentity;

    use super::*;
    use crate::message::MessageKind;

    fn msg(content: &str) -> Message {
        Message::confirmed("m1".into(), content, UserIdentity::new(5, "bob"), MessageKind::Chat, 10)
    }

    #[test]
    fn unread_counts_track_read_flags() {
        let mut tracker = MentionTracker::new();
        tracker.add(1, msg("@alice hey"), MentionKind::Username, 10);
        tracker.add(1, msg("@alice again"), MentionKind::Username, 20);
        tracker.add(2, msg("keyword here"), MentionKind::Keyword, 30);

        assert_eq!(tracker.unread_count(), 3);
        assert_eq!(tracker.unread_count_for(1), 2);

        assert!(tracker.mark_chatroom_read(1));
        assert_eq!(tracker.unread_count(), 1);
        assert_eq!(tracker.unread_count_for(1), 0);
    }

    #[test]
    fn mark_all_read_leaves_later_mentions_unread() {
        let mut tracker = MentionTracker::new();
        tracker.add(1, msg("one"), MentionKind::Username, 10);
        tracker.mark_all_read();
        assert_eq!(tracker.unread_count(), 0);

        tracker.add(1, msg("two"), MentionKind::Username, 20);
        assert_eq!(tracker.unread_count(), 1);
    }

    #[test]
    fn mark_read_is_monotonic() {
        let mut tracker = MentionTracker::new();
        let id = tracker.add(1, msg("one"), MentionKind::Username, 10);
        assert!(tracker.mark_read(id));
        // Second call changes nothing and never flips back.
        assert!(!tracker.mark_read(id));
        assert_eq!(tracker.unread_count(), 0);
    }

    #[test]
    fn clear_scopes_to_chatroom() {
        let mut tracker = MentionTracker::new();
        tracker.add(1, msg("one"), MentionKind::Username, 10);
        tracker.add(2, msg("two"), MentionKind::Username, 20);

        tracker.clear(Some(1));
        assert!(tracker.for_chatroom(1).is_empty());
        assert_eq!(tracker.all().len(), 1);

        tracker.clear(None);
        assert!(tracker.all().is_empty());
    }

    #[test]
    fn all_is_ordered_by_timestamp() {
        let mut tracker = MentionTracker::new();
        tracker.add(2, msg("late"), MentionKind::Username, 30);
        tracker.add(1, msg("early"), MentionKind::Username, 10);

        let all = tracker.all();
        assert_eq!(all[0].message.content, "early");
        assert_eq!(all[1].message.content, "late");
    }
}
