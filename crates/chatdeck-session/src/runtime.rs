//! Generic runtime for session orchestration.
//!
//! The runtime drives the event loop, coordinating between:
//! - [`ChatSession`]: the pure orchestrator state machine
//! - [`Driver`]: platform-specific collaborator I/O
//!
//! Each cycle polls the driver for one event, feeds it to the session,
//! executes the resulting actions (feeding collaborator results back
//! in as they complete), then ticks the session so batch flushes and
//! reconnect deadlines fire.

use chatdeck_core::{Environment, KvStore};

use crate::{
    action::SessionAction,
    driver::Driver,
    event::SessionEvent,
    session::ChatSession,
};

/// Generic runtime that orchestrates the session and a driver.
///
/// # Type Parameters
///
/// - `D`: platform-specific I/O driver
/// - `E`: environment for time and randomness
/// - `S`: persistence backend
pub struct Runtime<D, E, S>
where
    D: Driver,
    E: Environment,
    S: KvStore,
{
    driver: D,
    session: ChatSession<E, S>,
}

impl<D, E, S> Runtime<D, E, S>
where
    D: Driver<Instant = E::Instant>,
    E: Environment,
    S: KvStore,
{
    /// Create a runtime from a driver and a constructed session.
    pub fn new(driver: D, session: ChatSession<E, S>) -> Self {
        Self { driver, session }
    }

    /// Run the main event loop until shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver's event polling fails.
    pub async fn run(mut self) -> Result<(), D::Error> {
        let actions = self.session.bootstrap();
        self.execute(actions).await;

        loop {
            match self.driver.poll_event().await? {
                Some(SessionEvent::Shutdown) => {
                    let actions = self.session.handle(SessionEvent::Shutdown);
                    self.execute(actions).await;
                    break;
                },
                Some(event) => {
                    let actions = self.session.handle(event);
                    self.execute(actions).await;
                },
                None => {},
            }

            let now = self.driver.now();
            let actions = self.session.handle(SessionEvent::Tick { now });
            self.execute(actions).await;
        }

        self.driver.stop();
        Ok(())
    }

    /// Execute actions, feeding collaborator completions back into the
    /// session until the action queue drains.
    async fn execute(&mut self, initial: Vec<SessionAction>) {
        let mut pending = initial;

        while !pending.is_empty() {
            let actions = std::mem::take(&mut pending);

            for action in actions {
                match action {
                    SessionAction::Notify => {
                        let snapshot = self.session.snapshot();
                        self.driver.notify(&snapshot);
                    },
                    SessionAction::ResolveProfile { handle } => {
                        let result = self.driver.resolve_profile(handle.clone()).await;
                        pending.extend(
                            self.session.handle(SessionEvent::ProfileResolved { handle, result }),
                        );
                    },
                    SessionAction::OpenFeed { chatroom_id, feed } => {
                        self.driver.open_feed(chatroom_id, feed).await;
                    },
                    SessionAction::CloseFeed { chatroom_id, feed } => {
                        self.driver.close_feed(chatroom_id, feed).await;
                    },
                    SessionAction::SendChat { chatroom_id, temp_id, content } => {
                        let outcome = self.driver.send_chat(chatroom_id, content).await;
                        pending.extend(self.session.handle(SessionEvent::SendFinished {
                            chatroom_id,
                            temp_id,
                            outcome,
                        }));
                    },
                    SessionAction::SendReply { chatroom_id, temp_id, content, target } => {
                        let outcome = self.driver.send_reply(chatroom_id, content, target).await;
                        pending.extend(self.session.handle(SessionEvent::SendFinished {
                            chatroom_id,
                            temp_id,
                            outcome,
                        }));
                    },
                    SessionAction::SendPresence { remote_user_id, local_user_id } => {
                        let result =
                            self.driver.send_presence(remote_user_id, local_user_id).await;
                        pending.extend(self.session.handle(SessionEvent::PresenceFinished {
                            remote_user_id,
                            result,
                        }));
                    },
                    SessionAction::FetchSelf => {
                        let result = self.driver.fetch_self().await;
                        pending
                            .extend(self.session.handle(SessionEvent::SelfFetched { result }));
                    },
                }
            }
        }
    }

    /// The session, for synchronous reads.
    pub fn session(&self) -> &ChatSession<E, S> {
        &self.session
    }

    /// Mutable session access, for UI-initiated operations.
    ///
    /// Actions returned by session methods must be passed to
    /// [`dispatch`](Self::dispatch) to take effect.
    pub fn session_mut(&mut self) -> &mut ChatSession<E, S> {
        &mut self.session
    }

    /// Execute actions returned by a UI-initiated session operation.
    pub async fn dispatch(&mut self, actions: Vec<SessionAction>) {
        self.execute(actions).await;
    }
}
