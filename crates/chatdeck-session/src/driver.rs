//! Driver trait for abstracting collaborator I/O.
//!
//! The [`Driver`] trait decouples the session runtime from the real
//! transports and HTTP collaborators. Each platform implements the
//! trait; the generic [`crate::Runtime`] handles all orchestration, so
//! the same loop runs in production and in deterministic simulation.

use std::{future::Future, ops::Sub, time::Duration};

use chatdeck_core::{ChatroomId, UserId, UserIdentity};

use crate::{
    event::{FeedKind, ResolvedProfile, SendOutcome, SessionEvent},
    message::ReplyTarget,
    state::SessionSnapshot,
};

/// Abstracts collaborator I/O for the session runtime.
///
/// # Feed contract
///
/// [`open_feed`](Driver::open_feed) must never fail to the runtime:
/// transport faults of any kind (constructor failure, handshake
/// rejection, mid-stream drop) are reported through
/// [`poll_event`](Driver::poll_event) as
/// [`crate::event::FeedStatus::Failed`] events. Payload delivery per
/// open connection is at-least-once and order-preserving.
///
/// # Associated Types
///
/// - [`Error`](Driver::Error): platform-specific error type
/// - [`Instant`](Driver::Instant): time representation (real or
///   virtual); must match the session environment's instant type
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Time instant type. Enables virtual time in simulation.
    type Instant: Copy + Ord + Send + Sync + Sub<Output = Duration>;

    /// Poll for the next session event.
    ///
    /// Should await until an event is available or a tick interval
    /// elapses, returning `None` on timeout so the runtime can drive
    /// deadline processing.
    fn poll_event(
        &mut self,
    ) -> impl Future<Output = Result<Option<SessionEvent<Self::Instant>>, Self::Error>> + Send;

    /// Resolve a handle via the external profile lookup.
    fn resolve_profile(
        &mut self,
        handle: String,
    ) -> impl Future<Output = Result<ResolvedProfile, String>> + Send;

    /// Open one of a chatroom's feeds (see the feed contract above).
    fn open_feed(
        &mut self,
        chatroom_id: ChatroomId,
        feed: FeedKind,
    ) -> impl Future<Output = ()> + Send;

    /// Close one of a chatroom's feeds.
    fn close_feed(
        &mut self,
        chatroom_id: ChatroomId,
        feed: FeedKind,
    ) -> impl Future<Output = ()> + Send;

    /// Invoke the external send operation for a plain message.
    fn send_chat(
        &mut self,
        chatroom_id: ChatroomId,
        content: String,
    ) -> impl Future<Output = SendOutcome> + Send;

    /// Invoke the external send operation for a reply.
    fn send_reply(
        &mut self,
        chatroom_id: ChatroomId,
        content: String,
        target: ReplyTarget,
    ) -> impl Future<Output = SendOutcome> + Send;

    /// Invoke the external presence update.
    fn send_presence(
        &mut self,
        remote_user_id: UserId,
        local_user_id: UserId,
    ) -> impl Future<Output = Result<(), String>> + Send;

    /// Fetch the current user.
    fn fetch_self(&mut self) -> impl Future<Output = Result<UserIdentity, String>> + Send;

    /// Current time instant.
    fn now(&self) -> Self::Instant;

    /// Push a fresh state snapshot to the UI layer.
    fn notify(&mut self, snapshot: &SessionSnapshot);

    /// Stop all transports and release resources.
    fn stop(&mut self);
}
