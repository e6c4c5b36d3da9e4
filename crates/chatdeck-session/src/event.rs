//! Session input events.
//!
//! Everything that drives the orchestrator arrives here: decoded feed
//! events, completions of external collaborator calls, and time
//! ticks. Feed payloads are small tagged variants decoded at the
//! connection boundary, so session logic never inspects raw transport
//! blobs.
//!
//! Generic over `I` (instant type) to support both production
//! (`std::time::Instant`) and simulated clocks.

use chatdeck_core::{ChatroomId, Credential, UserId, UserIdentity};

use crate::{emotes::Emote, message::ReplyTarget};

/// Which of a chatroom's two live feeds an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    /// Chat-message transport.
    Primary,
    /// Cosmetic/overlay transport (emote-set updates).
    Cosmetic,
}

impl std::fmt::Display for FeedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Cosmetic => f.write_str("cosmetic"),
        }
    }
}

/// Transport status reported by the driver for one sub-connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedStatus {
    /// Handshake completed.
    Connected,
    /// Handshake or established connection failed.
    ///
    /// The driver converts every transport fault (constructor
    /// failure, handshake rejection, mid-stream drop) into this
    /// variant; faults never escalate past the connection manager.
    Failed {
        /// Transport-reported reason.
        reason: String,
    },
}

/// Channel-level metadata delivered by a feed.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelMetadata {
    /// Live/offline transition on the primary feed.
    LiveStatus {
        /// Whether the channel is now live.
        live: bool,
    },
    /// Replacement of the local user's personal emote set (cosmetic
    /// feed).
    PersonalEmoteSet {
        /// The new set.
        emotes: Vec<Emote>,
    },
}

/// A chat message as delivered by the primary feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Server-assigned message id.
    pub id: String,
    /// Message text.
    pub content: String,
    /// Sender identity.
    pub sender: UserIdentity,
    /// Reply linkage, when the message is a reply.
    pub reply: Option<ReplyTarget>,
    /// Server-assigned unix milliseconds.
    pub created_at: u64,
}

/// Payload events on the primary feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatPayload {
    /// A chat message (including the echo of our own sends).
    Message(InboundMessage),
    /// Moderation removed a message.
    MessageDeleted {
        /// Server id of the removed message.
        message_id: String,
    },
}

/// Payload events on the cosmetic feed.
///
/// Delivery is at-least-once and order-preserving per connection, so
/// every variant applies idempotently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CosmeticPayload {
    /// Emote added to the channel set (or re-announced).
    EmoteAdded(Emote),
    /// Emote removed from the channel set.
    EmoteRemoved {
        /// Id of the removed emote.
        emote_id: String,
    },
    /// Emote renamed in place.
    EmoteRenamed {
        /// Id of the renamed emote.
        emote_id: String,
        /// New name.
        name: String,
    },
}

/// Payload events, per feed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedPayload {
    /// Primary-feed payload.
    Chat(ChatPayload),
    /// Cosmetic-feed payload.
    Cosmetic(CosmeticPayload),
}

/// One decoded event from a feed connection.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Connection status transition.
    Status(FeedStatus),
    /// Channel metadata update.
    Metadata(ChannelMetadata),
    /// Payload event.
    Payload(FeedPayload),
}

/// Result of the external profile lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProfile {
    /// Stable chatroom id for the handle.
    pub chatroom_id: ChatroomId,
    /// Streamer's platform user id.
    pub user_id: UserId,
    /// Canonical login name.
    pub username: String,
    /// Opaque profile metadata.
    pub metadata: serde_json::Value,
}

/// Outcome of the external send operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Accepted by the server; confirmation arrives via the feed echo.
    Delivered,
    /// Network or API failure.
    Failed {
        /// Collaborator-reported reason.
        reason: String,
    },
    /// Server rejected the send as unauthenticated.
    AuthRejected,
}

/// Events processed by [`crate::ChatSession::handle`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent<I = std::time::Instant> {
    /// Periodic tick for deadline processing (batch flushes, reconnect
    /// backoff).
    Tick {
        /// Current time from the environment.
        now: I,
    },

    /// Decoded event from one of a chatroom's feeds.
    Feed {
        /// Chatroom the feed belongs to.
        chatroom_id: ChatroomId,
        /// Which feed delivered it.
        feed: FeedKind,
        /// The decoded event.
        event: FeedEvent,
    },

    /// The external profile lookup finished.
    ProfileResolved {
        /// Handle that was looked up.
        handle: String,
        /// Resolution result; `Err` carries the reason.
        result: Result<ResolvedProfile, String>,
    },

    /// The external send operation finished.
    SendFinished {
        /// Chatroom the send targeted.
        chatroom_id: ChatroomId,
        /// Temp id of the optimistic entry.
        temp_id: String,
        /// Outcome.
        outcome: SendOutcome,
    },

    /// The external presence update finished.
    PresenceFinished {
        /// Remote user the update targeted.
        remote_user_id: UserId,
        /// Outcome; failures are log-only.
        result: Result<(), String>,
    },

    /// The current-user fetch finished.
    SelfFetched {
        /// Fetched identity or reason.
        result: Result<UserIdentity, String>,
    },

    /// The auth accessor produced a new credential (or lost it).
    CredentialUpdated {
        /// Latest credential, if any.
        credential: Option<Credential>,
    },

    /// The application is shutting down; tear everything down.
    Shutdown,
}
