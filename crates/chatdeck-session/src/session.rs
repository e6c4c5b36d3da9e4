//! The session orchestrator facade.
//!
//! [`ChatSession`] owns every subsystem and is the single entry point
//! for both the UI layer (operations, synchronous reads) and the
//! runtime (events). It is a pure state machine: methods mutate owned
//! state and return [`SessionAction`]s for the runtime to execute;
//! no I/O happens here.
//!
//! Events for chatrooms that are no longer subscribed are dropped
//! before touching any state (the stale-event guard): once
//! `remove_chatroom` returns, nothing a dying connection still emits
//! can have an observable effect.

use std::collections::HashMap;

use chatdeck_core::{ChatroomId, Credential, Environment, KvStore, UserIdentity};

use crate::{
    action::SessionAction,
    chatroom::Chatroom,
    config::SessionConfig,
    connection::{ConnectionManager, FeedState},
    drafts::DraftStore,
    emotes::{Emote, EmoteStore},
    error::SessionError,
    event::{
        ChannelMetadata, ChatPayload, CosmeticPayload, FeedEvent, FeedKind, FeedPayload,
        InboundMessage, ResolvedProfile, SendOutcome, SessionEvent,
    },
    mentions::{Mention, MentionKind, MentionTracker},
    message::{Message, MessageKind, ReplyTarget},
    pipeline::MessagePipeline,
    presence::PresenceThrottler,
    registry::ChatroomRegistry,
    state::{ChatroomSummary, SessionSnapshot, StatusReport},
};

const MENTIONS_TAB_KEY: &str = "mentions_tab";

/// Notice injected into history when the server rejects a send as
/// unauthenticated.
const LOGIN_REQUIRED_NOTICE: &str = "You must log in to send messages.";

/// The chat session and connection orchestrator.
///
/// Explicitly constructed and passed by reference to consumers, not a
/// global singleton. [`ChatSession::teardown`] is the explicit end of
/// life.
pub struct ChatSession<E: Environment, S: KvStore> {
    env: E,
    config: SessionConfig,
    registry: ChatroomRegistry<S>,
    connections: ConnectionManager<E::Instant>,
    pipeline: MessagePipeline<E::Instant>,
    mentions: MentionTracker,
    drafts: DraftStore<S>,
    presence: PresenceThrottler<E::Instant>,
    emotes: EmoteStore<S>,
    store: S,
    current_user: Option<UserIdentity>,
    credential: Option<Credential>,
    mentions_tab: bool,
    status_message: Option<String>,
    torn_down: bool,
}

impl<E: Environment, S: KvStore> ChatSession<E, S> {
    /// Create a session, restoring persisted state (chatroom list,
    /// drafts, personal emotes, mentions-tab flag).
    pub fn new(env: E, config: SessionConfig, store: S) -> Self {
        let registry = ChatroomRegistry::new(store.clone());
        let drafts = DraftStore::new(store.clone());
        let emotes = EmoteStore::new(store.clone());
        let mentions_tab = matches!(store.get(MENTIONS_TAB_KEY), Ok(Some(ref v)) if v == "true");

        let mut pipeline = MessagePipeline::new();
        for room in registry.chatrooms() {
            pipeline.ensure(room.id);
        }

        Self {
            env,
            config,
            registry,
            connections: ConnectionManager::new(),
            pipeline,
            mentions: MentionTracker::new(),
            drafts,
            presence: PresenceThrottler::new(),
            emotes,
            store,
            current_user: None,
            credential: None,
            mentions_tab,
            status_message: None,
            torn_down: false,
        }
    }

    /// Start the session: fetch the current user and open both feeds
    /// for every restored chatroom.
    pub fn bootstrap(&mut self) -> Vec<SessionAction> {
        let mut actions = vec![SessionAction::FetchSelf];
        let ids: Vec<ChatroomId> = self.registry.chatrooms().iter().map(|c| c.id).collect();
        for id in ids {
            actions.extend(self.connections.connect_both(id));
        }
        actions.push(SessionAction::Notify);
        actions
    }

    /// Process an event and return resulting actions.
    pub fn handle(&mut self, event: SessionEvent<E::Instant>) -> Vec<SessionAction> {
        if self.torn_down {
            tracing::debug!("dropping event after teardown");
            return Vec::new();
        }
        match event {
            SessionEvent::Tick { now } => self.handle_tick(now),
            SessionEvent::Feed { chatroom_id, feed, event } => {
                self.handle_feed(chatroom_id, feed, event)
            },
            SessionEvent::ProfileResolved { handle, result } => {
                self.handle_profile_resolved(&handle, result)
            },
            SessionEvent::SendFinished { chatroom_id, temp_id, outcome } => {
                self.handle_send_finished(chatroom_id, &temp_id, outcome)
            },
            SessionEvent::PresenceFinished { remote_user_id, result } => {
                if let Err(reason) = result {
                    tracing::warn!(remote_user_id, %reason, "presence update failed");
                }
                Vec::new()
            },
            SessionEvent::SelfFetched { result } => match result {
                Ok(user) => {
                    self.current_user = Some(user);
                    vec![SessionAction::Notify]
                },
                Err(reason) => {
                    tracing::warn!(%reason, "current-user fetch failed");
                    Vec::new()
                },
            },
            SessionEvent::CredentialUpdated { credential } => {
                self.credential = credential;
                Vec::new()
            },
            SessionEvent::Shutdown => self.teardown(),
        }
    }

    fn handle_tick(&mut self, now: E::Instant) -> Vec<SessionAction> {
        let mut actions = Vec::new();

        let flushed = self.pipeline.flush_due(
            now,
            self.config.batch_window,
            self.config.chat_history_length,
        );
        for (chatroom_id, applied) in &flushed {
            self.extract_mentions(*chatroom_id, applied);
        }

        let reconnects = self.connections.tick(now, &self.config);
        let reconnecting = !reconnects.is_empty();
        actions.extend(reconnects);
        if !flushed.is_empty() || reconnecting {
            actions.push(SessionAction::Notify);
        }
        actions
    }

    fn handle_feed(
        &mut self,
        chatroom_id: ChatroomId,
        feed: FeedKind,
        event: FeedEvent,
    ) -> Vec<SessionAction> {
        if !self.registry.contains(chatroom_id) {
            tracing::debug!(chatroom_id, feed = %feed, "dropping event for removed chatroom");
            return Vec::new();
        }
        match event {
            FeedEvent::Status(status) => {
                let now = self.env.now();
                if self.connections.on_status(chatroom_id, feed, &status, now) {
                    vec![SessionAction::Notify]
                } else {
                    Vec::new()
                }
            },
            FeedEvent::Metadata(ChannelMetadata::LiveStatus { live }) => {
                match self.registry.get_mut(chatroom_id) {
                    Some(room) if room.is_live != live => {
                        room.is_live = live;
                        vec![SessionAction::Notify]
                    },
                    _ => Vec::new(),
                }
            },
            FeedEvent::Metadata(ChannelMetadata::PersonalEmoteSet { emotes }) => {
                self.emotes.set_personal(emotes);
                vec![SessionAction::Notify]
            },
            FeedEvent::Payload(FeedPayload::Chat(payload)) => {
                self.handle_chat_payload(chatroom_id, payload)
            },
            FeedEvent::Payload(FeedPayload::Cosmetic(payload)) => {
                self.handle_cosmetic_payload(chatroom_id, &payload)
            },
        }
    }

    fn handle_chat_payload(
        &mut self,
        chatroom_id: ChatroomId,
        payload: ChatPayload,
    ) -> Vec<SessionAction> {
        match payload {
            ChatPayload::Message(inbound) => {
                let message = Self::from_inbound(inbound);

                // Echo path: our own message coming back confirms the
                // optimistic entry in place instead of appending.
                if let Some(user) = &self.current_user
                    && message.sender.id == user.id
                    && self.pipeline.confirm_oldest_optimistic(
                        chatroom_id,
                        &message.content,
                        message.clone(),
                    )
                {
                    return vec![SessionAction::Notify];
                }

                let now = self.env.now();
                self.pipeline.enqueue(chatroom_id, message, now);
                // History mutates on flush; nothing to notify yet.
                Vec::new()
            },
            ChatPayload::MessageDeleted { message_id } => {
                if self.pipeline.mark_deleted(chatroom_id, &message_id) {
                    vec![SessionAction::Notify]
                } else {
                    Vec::new()
                }
            },
        }
    }

    fn handle_cosmetic_payload(
        &mut self,
        chatroom_id: ChatroomId,
        payload: &CosmeticPayload,
    ) -> Vec<SessionAction> {
        if self.emotes.apply(chatroom_id, payload) {
            vec![SessionAction::Notify]
        } else {
            Vec::new()
        }
    }

    fn handle_profile_resolved(
        &mut self,
        handle: &str,
        result: Result<ResolvedProfile, String>,
    ) -> Vec<SessionAction> {
        if !self.registry.is_pending(handle) {
            tracing::debug!(handle, "dropping resolution for cancelled add");
            return Vec::new();
        }
        match result {
            Ok(profile) => match self.registry.complete_add(handle, profile) {
                Ok(chatroom_id) => {
                    self.pipeline.ensure(chatroom_id);
                    let mut actions = self.connections.connect_both(chatroom_id);
                    actions.push(SessionAction::Notify);
                    actions
                },
                Err(e) => {
                    self.status_message = Some(e.to_string());
                    vec![SessionAction::Notify]
                },
            },
            Err(reason) => {
                self.registry.fail_add(handle);
                let error = SessionError::LookupFailed { handle: handle.to_string(), reason };
                tracing::warn!(%error, "chatroom add failed");
                self.status_message = Some(error.to_string());
                vec![SessionAction::Notify]
            },
        }
    }

    fn handle_send_finished(
        &mut self,
        chatroom_id: ChatroomId,
        temp_id: &str,
        outcome: SendOutcome,
    ) -> Vec<SessionAction> {
        if !self.registry.contains(chatroom_id) {
            tracing::debug!(chatroom_id, "dropping send outcome for removed chatroom");
            return Vec::new();
        }
        match outcome {
            // Confirmation arrives via the feed echo, never from the
            // send call itself.
            SendOutcome::Delivered => Vec::new(),
            SendOutcome::Failed { reason } => {
                tracing::warn!(chatroom_id, temp_id, %reason, "send failed");
                if self.pipeline.mark_failed(chatroom_id, temp_id) {
                    vec![SessionAction::Notify]
                } else {
                    Vec::new()
                }
            },
            SendOutcome::AuthRejected => {
                self.pipeline.mark_failed(chatroom_id, temp_id);
                let notice = Message::system(
                    format!("{:032x}", self.env.random_u128()),
                    LOGIN_REQUIRED_NOTICE,
                    self.env.wall_clock_millis(),
                );
                self.pipeline.insert_direct(
                    chatroom_id,
                    notice,
                    self.config.chat_history_length,
                );
                vec![SessionAction::Notify]
            },
        }
    }

    /// Subscribe to a chatroom by handle.
    ///
    /// Resolution is asynchronous: the returned action carries the
    /// lookup, and the chatroom is created only when it resolves:
    /// all-or-nothing, never a half-created entry.
    pub fn add_chatroom(&mut self, handle: &str) -> Result<Vec<SessionAction>, SessionError> {
        self.registry.begin_add(handle)?;
        Ok(vec![SessionAction::ResolveProfile { handle: handle.trim().to_string() }])
    }

    /// Unsubscribe a chatroom, tearing down its feeds and purging all
    /// per-chatroom state. Safe to call with an unknown id.
    ///
    /// Persistence failures here are logged, not propagated: the
    /// teardown must complete regardless, and the list rewrites on the
    /// next mutation.
    pub fn remove_chatroom(&mut self, chatroom_id: ChatroomId) -> Vec<SessionAction> {
        let Some(removed) = self.registry.take(chatroom_id) else {
            return Vec::new();
        };
        if let Err(e) = self.registry.persist() {
            tracing::error!(chatroom_id, error = %e, "failed to persist chatroom removal");
        }

        let mut actions = self.connections.teardown(chatroom_id);
        self.pipeline.purge(chatroom_id);
        self.mentions.clear(Some(chatroom_id));
        self.presence.forget(removed.streamer.user_id);
        self.emotes.purge(chatroom_id);
        if let Err(e) = self.drafts.clear(chatroom_id) {
            tracing::error!(chatroom_id, error = %e, "failed to persist draft removal");
        }
        actions.push(SessionAction::Notify);
        actions
    }

    /// Override a chatroom's display name.
    pub fn rename_chatroom(
        &mut self,
        chatroom_id: ChatroomId,
        name: &str,
    ) -> Result<Vec<SessionAction>, SessionError> {
        self.registry.rename(chatroom_id, name)?;
        Ok(vec![SessionAction::Notify])
    }

    /// Apply new display-order values. Unknown ids are ignored.
    pub fn reorder_chatrooms(
        &mut self,
        orders: &HashMap<ChatroomId, u32>,
    ) -> Result<Vec<SessionAction>, SessionError> {
        self.registry.reorder(orders)?;
        Ok(vec![SessionAction::Notify])
    }

    /// Send a message (or a reply, when `reply` is set).
    ///
    /// Rejection paths return typed errors with no side effects:
    /// [`SessionError::EmptyMessage`] for blank text and
    /// [`SessionError::NotAuthenticated`] when no current user is
    /// cached. On acceptance an optimistic entry is inserted
    /// immediately (that is what makes sends feel instant) and the
    /// external send operation is dispatched.
    pub fn send_message(
        &mut self,
        chatroom_id: ChatroomId,
        text: &str,
        reply: Option<ReplyTarget>,
    ) -> Result<Vec<SessionAction>, SessionError> {
        let content = text.trim();
        if content.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        let user = self.current_user.clone().ok_or(SessionError::NotAuthenticated)?;
        if !self.registry.contains(chatroom_id) {
            return Err(SessionError::ChatroomNotFound { chatroom_id });
        }

        let temp_id = format!("{:032x}", self.env.random_u128());
        let kind = match &reply {
            Some(target) => MessageKind::Reply { target: target.clone() },
            None => MessageKind::Chat,
        };
        let message = Message::optimistic(
            temp_id.clone(),
            content,
            user,
            kind,
            self.env.wall_clock_millis(),
        );
        self.pipeline.insert_direct(chatroom_id, message, self.config.chat_history_length);

        let send = match reply {
            Some(target) => SessionAction::SendReply {
                chatroom_id,
                temp_id,
                content: content.to_string(),
                target,
            },
            None => {
                SessionAction::SendChat { chatroom_id, temp_id, content: content.to_string() }
            },
        };
        Ok(vec![send, SessionAction::Notify])
    }

    /// Re-dispatch the send operation for a failed entry.
    ///
    /// The entry keeps its temp id and stays `Failed` until the feed
    /// echo confirms it; a renewed failure leaves it unchanged. No-op
    /// for unknown or non-failed temp ids.
    pub fn retry_message(&mut self, chatroom_id: ChatroomId, temp_id: &str) -> Vec<SessionAction> {
        let Some(entry) = self.pipeline.failed_entry(chatroom_id, temp_id) else {
            return Vec::new();
        };
        let action = match &entry.kind {
            MessageKind::Reply { target } => SessionAction::SendReply {
                chatroom_id,
                temp_id: temp_id.to_string(),
                content: entry.content.clone(),
                target: target.clone(),
            },
            MessageKind::Chat | MessageKind::System => SessionAction::SendChat {
                chatroom_id,
                temp_id: temp_id.to_string(),
                content: entry.content.clone(),
            },
        };
        vec![action]
    }

    /// Discard a non-confirmed entry (user cancelled it). No-op if
    /// absent.
    pub fn discard_message(
        &mut self,
        chatroom_id: ChatroomId,
        temp_id: &str,
    ) -> Vec<SessionAction> {
        if self.pipeline.remove_local(chatroom_id, temp_id) {
            vec![SessionAction::Notify]
        } else {
            Vec::new()
        }
    }

    /// Replace the optimistic entry matching `temp_id` with the
    /// server-delivered message, preserving its position. Idempotent.
    pub fn confirm_message(
        &mut self,
        chatroom_id: ChatroomId,
        temp_id: &str,
        confirmed: Message,
    ) -> Vec<SessionAction> {
        if self.pipeline.confirm(chatroom_id, temp_id, confirmed) {
            vec![SessionAction::Notify]
        } else {
            Vec::new()
        }
    }

    /// Bulk-seed history with backfill (applied synchronously; flagged
    /// historical).
    pub fn seed_history(
        &mut self,
        chatroom_id: ChatroomId,
        messages: Vec<InboundMessage>,
    ) -> Vec<SessionAction> {
        if !self.registry.contains(chatroom_id) {
            return Vec::new();
        }
        let converted = messages.into_iter().map(Self::from_inbound).collect();
        self.pipeline.seed(chatroom_id, converted, self.config.chat_history_length);
        vec![SessionAction::Notify]
    }

    /// Signal that the user is viewing this chatroom.
    ///
    /// No-op when the chatroom is unknown, no credential or current
    /// user is cached, or the per-remote-user interval has not
    /// elapsed.
    pub fn touch_presence(&mut self, chatroom_id: ChatroomId) -> Vec<SessionAction> {
        let Some(room) = self.registry.get(chatroom_id) else {
            return Vec::new();
        };
        if self.credential.is_none() {
            tracing::debug!(chatroom_id, "skipping presence, no credential");
            return Vec::new();
        }
        let Some(user) = &self.current_user else {
            return Vec::new();
        };
        let remote = room.streamer.user_id;
        let local = user.id;
        let now = self.env.now();
        if self.presence.allow(remote, now, self.config.presence_interval) {
            vec![SessionAction::SendPresence { remote_user_id: remote, local_user_id: local }]
        } else {
            tracing::debug!(chatroom_id, remote, "presence throttled");
            Vec::new()
        }
    }

    /// Save a chatroom's draft (write-through).
    pub fn save_draft(&mut self, chatroom_id: ChatroomId, text: &str) -> Result<(), SessionError> {
        self.drafts.save(chatroom_id, text)
    }

    /// Draft text for a chatroom; empty string if none.
    pub fn draft(&self, chatroom_id: ChatroomId) -> &str {
        self.drafts.get(chatroom_id)
    }

    /// Discard a chatroom's draft.
    pub fn clear_draft(&mut self, chatroom_id: ChatroomId) -> Result<(), SessionError> {
        self.drafts.clear(chatroom_id)
    }

    /// Mark one mention read.
    pub fn mark_mention_read(&mut self, mention_id: u64) -> Vec<SessionAction> {
        if self.mentions.mark_read(mention_id) {
            vec![SessionAction::Notify]
        } else {
            Vec::new()
        }
    }

    /// Mark every existing mention read.
    pub fn mark_all_mentions_read(&mut self) -> Vec<SessionAction> {
        if self.mentions.mark_all_read() {
            vec![SessionAction::Notify]
        } else {
            Vec::new()
        }
    }

    /// Mark one chatroom's mentions read.
    pub fn mark_chatroom_mentions_read(&mut self, chatroom_id: ChatroomId) -> Vec<SessionAction> {
        if self.mentions.mark_chatroom_read(chatroom_id) {
            vec![SessionAction::Notify]
        } else {
            Vec::new()
        }
    }

    /// Remove one chatroom's mentions, or all when `None`.
    pub fn clear_mentions(&mut self, chatroom_id: Option<ChatroomId>) -> Vec<SessionAction> {
        self.mentions.clear(chatroom_id);
        vec![SessionAction::Notify]
    }

    /// Toggle the mentions tab and persist the flag.
    pub fn set_mentions_tab(&mut self, enabled: bool) -> Result<Vec<SessionAction>, SessionError> {
        self.mentions_tab = enabled;
        self.store.set(MENTIONS_TAB_KEY, if enabled { "true" } else { "false" })?;
        Ok(vec![SessionAction::Notify])
    }

    /// End the session: close all feeds, cancel all pending batch
    /// flushes, drop all connection state. Idempotent.
    pub fn teardown(&mut self) -> Vec<SessionAction> {
        if self.torn_down {
            return Vec::new();
        }
        self.torn_down = true;
        self.pipeline.cancel_batches();
        self.connections.cleanup()
    }

    /// History for a chatroom, oldest first.
    pub fn history(&self, chatroom_id: ChatroomId) -> &[Message] {
        self.pipeline.history(chatroom_id)
    }

    /// All subscribed chatrooms in insertion order.
    pub fn chatrooms(&self) -> &[Chatroom] {
        self.registry.chatrooms()
    }

    /// Aggregate connection status.
    pub fn status(&self) -> StatusReport {
        self.connections.status()
    }

    /// All mentions across chatrooms, oldest first.
    pub fn mentions(&self) -> Vec<&Mention> {
        self.mentions.all()
    }

    /// Mentions for one chatroom.
    pub fn mentions_for(&self, chatroom_id: ChatroomId) -> &[Mention] {
        self.mentions.for_chatroom(chatroom_id)
    }

    /// Unread mention count across all chatrooms.
    pub fn unread_mentions(&self) -> usize {
        self.mentions.unread_count()
    }

    /// Emote projection for a chatroom.
    pub fn emotes_for(&self, chatroom_id: ChatroomId) -> &[Emote] {
        self.emotes.for_chatroom(chatroom_id)
    }

    /// The local user's personal emote set.
    pub fn personal_emotes(&self) -> &[Emote] {
        self.emotes.personal()
    }

    /// Cached current user, once fetched.
    pub fn current_user(&self) -> Option<&UserIdentity> {
        self.current_user.as_ref()
    }

    /// Whether the mentions tab is enabled.
    pub fn mentions_tab(&self) -> bool {
        self.mentions_tab
    }

    /// Build the snapshot pushed to the UI on notify.
    pub fn snapshot(&self) -> SessionSnapshot {
        let status = self.connections.status();
        let connected = |id: ChatroomId, kind: FeedKind| {
            matches!(self.connections.feed_state(id, kind), Some(FeedState::Connected))
        };

        let chatrooms = self
            .registry
            .ordered()
            .into_iter()
            .map(|room| ChatroomSummary {
                chatroom_id: room.id,
                title: room.title().to_string(),
                username: room.username.clone(),
                order: room.order,
                is_live: room.is_live,
                primary_connected: connected(room.id, FeedKind::Primary),
                cosmetic_connected: connected(room.id, FeedKind::Cosmetic),
                history_len: self.pipeline.history(room.id).len(),
                unread_mentions: self.mentions.unread_count_for(room.id),
                has_draft: !self.drafts.get(room.id).is_empty(),
            })
            .collect();

        SessionSnapshot {
            chatrooms,
            connection: status,
            unread_mentions: self.mentions.unread_count(),
            current_user: self.current_user.clone(),
            mentions_tab: self.mentions_tab,
            status_message: self.status_message.clone(),
        }
    }

    /// Flag applied messages that reference the local user.
    fn extract_mentions(&mut self, chatroom_id: ChatroomId, applied: &[Message]) {
        let Some(user) = self.current_user.clone() else {
            return;
        };
        let needle = format!("@{}", user.username.to_lowercase());
        for message in applied {
            if message.sender.id == user.id || matches!(message.kind, MessageKind::System) {
                continue;
            }
            let content = message.content.to_lowercase();
            let kind = if content.contains(&needle) {
                Some(MentionKind::Username)
            } else if self
                .config
                .highlight_keywords
                .iter()
                .any(|k| !k.is_empty() && content.contains(&k.to_lowercase()))
            {
                Some(MentionKind::Keyword)
            } else {
                None
            };
            if let Some(kind) = kind {
                self.mentions.add(chatroom_id, message.clone(), kind, message.created_at);
            }
        }
    }

    fn from_inbound(inbound: InboundMessage) -> Message {
        let kind = match inbound.reply {
            Some(target) => MessageKind::Reply { target },
            None => MessageKind::Chat,
        };
        Message::confirmed(inbound.id, inbound.content, inbound.sender, kind, inbound.created_at)
    }
}
