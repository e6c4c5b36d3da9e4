//! Error types for the session orchestrator.
//!
//! Strongly-typed errors per the propagation policy: lookup failures
//! surface to the caller of `add`, send rejections are typed so the
//! caller can react, storage write failures propagate without
//! corrupting in-memory state. Recoverable conditions (send failures
//! after dispatch, connection drops) never appear here; they are
//! absorbed into message/connection state instead.

use chatdeck_core::{ChatroomId, StorageError};
use thiserror::Error;

/// Errors surfaced by session operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A chatroom for this handle is already subscribed (or a lookup
    /// for it is already in flight).
    #[error("already subscribed to {handle}")]
    AlreadySubscribed {
        /// Handle that was requested.
        handle: String,
    },

    /// The external profile lookup failed; no chatroom was created.
    #[error("profile lookup for {handle} failed: {reason}")]
    LookupFailed {
        /// Handle that was requested.
        handle: String,
        /// Collaborator-reported reason.
        reason: String,
    },

    /// Operation referenced a chatroom that is not subscribed.
    #[error("unknown chatroom {chatroom_id}")]
    ChatroomNotFound {
        /// Id that was requested.
        chatroom_id: ChatroomId,
    },

    /// Send rejected: empty or whitespace-only message text.
    #[error("refusing to send empty message")]
    EmptyMessage,

    /// Send rejected: no authenticated user is cached yet.
    #[error("no authenticated user cached")]
    NotAuthenticated,

    /// Persistence backend failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
