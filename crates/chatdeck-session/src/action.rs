//! Session output actions.
//!
//! Instructions produced by [`crate::ChatSession`] for the runtime to
//! execute. The session never performs I/O itself; every external
//! effect (opening a feed, invoking the send operation, notifying
//! the UI) travels through one of these variants.

use chatdeck_core::{ChatroomId, UserId};

use crate::{event::FeedKind, message::ReplyTarget};

/// Actions produced by the session state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Resolve a handle via the external profile lookup; the result
    /// comes back as [`crate::SessionEvent::ProfileResolved`].
    ResolveProfile {
        /// Handle to resolve.
        handle: String,
    },

    /// Open one of a chatroom's feeds. Transport failures surface as
    /// [`crate::event::FeedStatus::Failed`] events, never as errors.
    OpenFeed {
        /// Target chatroom.
        chatroom_id: ChatroomId,
        /// Which feed to open.
        feed: FeedKind,
    },

    /// Close one of a chatroom's feeds.
    CloseFeed {
        /// Target chatroom.
        chatroom_id: ChatroomId,
        /// Which feed to close.
        feed: FeedKind,
    },

    /// Invoke the external send operation for a plain message.
    SendChat {
        /// Target chatroom.
        chatroom_id: ChatroomId,
        /// Temp id of the optimistic entry, echoed back in
        /// [`crate::SessionEvent::SendFinished`].
        temp_id: String,
        /// Message text.
        content: String,
    },

    /// Invoke the external send operation for a reply.
    SendReply {
        /// Target chatroom.
        chatroom_id: ChatroomId,
        /// Temp id of the optimistic entry.
        temp_id: String,
        /// Message text.
        content: String,
        /// The message being replied to.
        target: ReplyTarget,
    },

    /// Invoke the external presence update.
    SendPresence {
        /// Streamer whose channel is being viewed.
        remote_user_id: UserId,
        /// The local viewer.
        local_user_id: UserId,
    },

    /// Fetch the current user via the external self lookup.
    FetchSelf,

    /// Observable state changed; push a fresh snapshot to the UI.
    Notify,
}
