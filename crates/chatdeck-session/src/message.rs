//! Chat message types and the optimistic/confirmed/failed machine.
//!
//! A locally-sent message is inserted immediately under a
//! client-generated temp id ([`MessageId::Local`]) so the UI shows it
//! with zero latency. The server later echoes the message back through
//! the primary feed with its authoritative id; confirmation replaces
//! the optimistic entry in place. A send that fails transitions the
//! entry to [`MessageState::Failed`] so it renders as retryable.

use chatdeck_core::UserIdentity;

/// Message identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageId {
    /// Server-assigned id, stable once confirmed.
    Server(String),
    /// Client-generated temp id, only while optimistic or failed.
    Local(String),
}

impl MessageId {
    /// The raw id string, whichever side assigned it.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Server(id) | Self::Local(id) => id,
        }
    }
}

/// Delivery state of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    /// Locally inserted, awaiting the server echo.
    Optimistic,
    /// Server-delivered; immutable thereafter.
    Confirmed,
    /// Send failed; retryable.
    Failed,
}

/// Reply linkage carried by reply messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTarget {
    /// Server id of the message being replied to.
    pub message_id: String,
    /// Content of the original message.
    pub content: String,
    /// Sender of the original message.
    pub sender: UserIdentity,
}

/// Message category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// Plain chat message.
    Chat,
    /// Reply to an earlier message.
    Reply {
        /// The message being replied to.
        target: ReplyTarget,
    },
    /// Locally-injected notice (e.g. "log in to chat").
    System,
}

/// One entry in a chatroom's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Identity (server-assigned or local temp id).
    pub id: MessageId,
    /// Message text.
    pub content: String,
    /// Sender identity.
    pub sender: UserIdentity,
    /// Category.
    pub kind: MessageKind,
    /// Delivery state.
    pub state: MessageState,
    /// Unix milliseconds; server-assigned for inbound messages, local
    /// wall clock for optimistic ones.
    pub created_at: u64,
    /// Historical backfill flag (seeded on reconnect, not streamed).
    pub is_old: bool,
    /// Moderation tombstone; the entry keeps its position.
    pub deleted: bool,
}

impl Message {
    /// Create an optimistic entry under a local temp id.
    pub fn optimistic(
        temp_id: String,
        content: impl Into<String>,
        sender: UserIdentity,
        kind: MessageKind,
        created_at: u64,
    ) -> Self {
        Self {
            id: MessageId::Local(temp_id),
            content: content.into(),
            sender,
            kind,
            state: MessageState::Optimistic,
            created_at,
            is_old: false,
            deleted: false,
        }
    }

    /// Create a confirmed entry from server-delivered fields.
    pub fn confirmed(
        id: String,
        content: impl Into<String>,
        sender: UserIdentity,
        kind: MessageKind,
        created_at: u64,
    ) -> Self {
        Self {
            id: MessageId::Server(id),
            content: content.into(),
            sender,
            kind,
            state: MessageState::Confirmed,
            created_at,
            is_old: false,
            deleted: false,
        }
    }

    /// Create a locally-injected system notice.
    ///
    /// System messages are confirmed on creation: there is no server
    /// round trip to wait for.
    pub fn system(id: String, content: impl Into<String>, created_at: u64) -> Self {
        Self {
            id: MessageId::Local(id),
            content: content.into(),
            sender: UserIdentity::new(0, "system"),
            kind: MessageKind::System,
            state: MessageState::Confirmed,
            created_at,
            is_old: false,
            deleted: false,
        }
    }

    /// Temp id if this entry is still locally identified.
    pub fn temp_id(&self) -> Option<&str> {
        match &self.id {
            MessageId::Local(id) => Some(id),
            MessageId::Server(_) => None,
        }
    }

    /// Whether the entry awaits its server echo.
    pub fn is_optimistic(&self) -> bool {
        self.state == MessageState::Optimistic
    }

    /// Whether the entry is retryable.
    pub fn is_failed(&self) -> bool {
        self.state == MessageState::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_id_only_for_local_ids() {
        let sender = UserIdentity::new(7, "alice");
        let opt = Message::optimistic("t1".into(), "hi", sender.clone(), MessageKind::Chat, 0);
        assert_eq!(opt.temp_id(), Some("t1"));

        let conf = Message::confirmed("s1".into(), "hi", sender, MessageKind::Chat, 0);
        assert_eq!(conf.temp_id(), None);
    }

    #[test]
    fn system_messages_are_confirmed() {
        let msg = Message::system("sys1".into(), "log in to chat", 123);
        assert_eq!(msg.state, MessageState::Confirmed);
        assert_eq!(msg.kind, MessageKind::System);
    }
}
