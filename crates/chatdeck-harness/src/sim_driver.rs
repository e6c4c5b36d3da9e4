//! Scripted driver for deterministic orchestration runs.
//!
//! Collaborator results (profile lookups, send outcomes, the current
//! user) are scripted up front; every effect the runtime executes is
//! recorded for oracle checks. All state lives behind `Arc`, so tests
//! keep a clone of the driver for inspection after the runtime
//! consumes it.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    convert::Infallible,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Instant,
};

use chatdeck_core::{ChatroomId, Environment, UserId, UserIdentity};
use chatdeck_session::{
    Driver, FeedEvent, FeedKind, FeedStatus, ReplyTarget, ResolvedProfile, SendOutcome,
    SessionEvent, SessionSnapshot,
};

use crate::SimEnv;

#[derive(Default)]
struct Inner {
    profiles: HashMap<String, Result<ResolvedProfile, String>>,
    self_result: Option<Result<UserIdentity, String>>,
    send_outcomes: VecDeque<SendOutcome>,
    fail_opens: HashSet<(ChatroomId, FeedKind)>,
    events: VecDeque<SessionEvent<Instant>>,

    opened: Vec<(ChatroomId, FeedKind)>,
    closed: Vec<(ChatroomId, FeedKind)>,
    chat_sends: Vec<(ChatroomId, String)>,
    reply_sends: Vec<(ChatroomId, String)>,
    presence_calls: Vec<(UserId, UserId)>,
    snapshots: Vec<SessionSnapshot>,
    stopped: bool,
}

/// Scripted [`Driver`] implementation over virtual time.
///
/// [`poll_event`](Driver::poll_event) drains the scripted event queue
/// and reports [`SessionEvent::Shutdown`] once it runs dry, so
/// [`chatdeck_session::Runtime::run`] terminates deterministically.
#[derive(Clone)]
pub struct SimDriver {
    env: SimEnv,
    inner: Arc<Mutex<Inner>>,
}

impl SimDriver {
    /// Create a driver sharing the given environment's clock.
    pub fn new(env: SimEnv) -> Self {
        Self { env, inner: Arc::new(Mutex::new(Inner::default())) }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Script the result of resolving `handle`.
    pub fn script_profile(&self, handle: &str, result: Result<ResolvedProfile, String>) {
        self.lock().profiles.insert(handle.to_string(), result);
    }

    /// Script the current-user fetch result.
    pub fn script_self(&self, result: Result<UserIdentity, String>) {
        self.lock().self_result = Some(result);
    }

    /// Queue an outcome for the next send operation (defaults to
    /// [`SendOutcome::Delivered`] when the queue is empty).
    pub fn push_send_outcome(&self, outcome: SendOutcome) {
        self.lock().send_outcomes.push_back(outcome);
    }

    /// Make opening this feed report a handshake failure.
    pub fn fail_open(&self, chatroom_id: ChatroomId, feed: FeedKind) {
        self.lock().fail_opens.insert((chatroom_id, feed));
    }

    /// Queue an inbound event for the runtime to poll.
    pub fn push_event(&self, event: SessionEvent<Instant>) {
        self.lock().events.push_back(event);
    }

    /// Feeds opened so far, in order.
    pub fn opened(&self) -> Vec<(ChatroomId, FeedKind)> {
        self.lock().opened.clone()
    }

    /// Feeds closed so far, in order.
    pub fn closed(&self) -> Vec<(ChatroomId, FeedKind)> {
        self.lock().closed.clone()
    }

    /// Plain-message send invocations so far.
    pub fn chat_sends(&self) -> Vec<(ChatroomId, String)> {
        self.lock().chat_sends.clone()
    }

    /// Reply send invocations so far.
    pub fn reply_sends(&self) -> Vec<(ChatroomId, String)> {
        self.lock().reply_sends.clone()
    }

    /// Presence update invocations so far.
    pub fn presence_calls(&self) -> Vec<(UserId, UserId)> {
        self.lock().presence_calls.clone()
    }

    /// Snapshots pushed to the UI so far.
    pub fn snapshots(&self) -> Vec<SessionSnapshot> {
        self.lock().snapshots.clone()
    }

    /// Whether the runtime stopped the driver.
    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }
}

impl Driver for SimDriver {
    type Error = Infallible;
    type Instant = Instant;

    async fn poll_event(&mut self) -> Result<Option<SessionEvent<Instant>>, Infallible> {
        let mut inner = self.lock();
        Ok(Some(inner.events.pop_front().unwrap_or(SessionEvent::Shutdown)))
    }

    async fn resolve_profile(&mut self, handle: String) -> Result<ResolvedProfile, String> {
        self.lock()
            .profiles
            .get(&handle)
            .cloned()
            .unwrap_or_else(|| Err(format!("no scripted profile for {handle}")))
    }

    async fn open_feed(&mut self, chatroom_id: ChatroomId, feed: FeedKind) {
        let mut inner = self.lock();
        inner.opened.push((chatroom_id, feed));
        let status = if inner.fail_opens.contains(&(chatroom_id, feed)) {
            FeedStatus::Failed { reason: "simulated handshake failure".to_string() }
        } else {
            FeedStatus::Connected
        };
        inner.events.push_back(SessionEvent::Feed {
            chatroom_id,
            feed,
            event: FeedEvent::Status(status),
        });
    }

    async fn close_feed(&mut self, chatroom_id: ChatroomId, feed: FeedKind) {
        self.lock().closed.push((chatroom_id, feed));
    }

    async fn send_chat(&mut self, chatroom_id: ChatroomId, content: String) -> SendOutcome {
        let mut inner = self.lock();
        inner.chat_sends.push((chatroom_id, content));
        inner.send_outcomes.pop_front().unwrap_or(SendOutcome::Delivered)
    }

    async fn send_reply(
        &mut self,
        chatroom_id: ChatroomId,
        content: String,
        _target: ReplyTarget,
    ) -> SendOutcome {
        let mut inner = self.lock();
        inner.reply_sends.push((chatroom_id, content));
        inner.send_outcomes.pop_front().unwrap_or(SendOutcome::Delivered)
    }

    async fn send_presence(
        &mut self,
        remote_user_id: UserId,
        local_user_id: UserId,
    ) -> Result<(), String> {
        self.lock().presence_calls.push((remote_user_id, local_user_id));
        Ok(())
    }

    async fn fetch_self(&mut self) -> Result<UserIdentity, String> {
        self.lock()
            .self_result
            .clone()
            .unwrap_or_else(|| Err("no scripted current user".to_string()))
    }

    fn now(&self) -> Instant {
        self.env.now()
    }

    fn notify(&mut self, snapshot: &SessionSnapshot) {
        self.lock().snapshots.push(snapshot.clone());
    }

    fn stop(&mut self) {
        self.lock().stopped = true;
    }
}
