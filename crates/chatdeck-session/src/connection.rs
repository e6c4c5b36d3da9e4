//! Per-chatroom feed connection lifecycles.
//!
//! Each subscribed chatroom owns two independent sub-connections (the
//! primary chat feed and the cosmetic feed), each running the state
//! machine below. The manager is pure: the driver performs the actual
//! handshakes and reports outcomes as status events; reconnects are
//! deadlines checked on ticks.
//!
//! # State machine (per sub-connection)
//!
//! ```text
//! ┌──────────────┐  connect   ┌────────────┐  Connected   ┌───────────┐
//! │ Disconnected │───────────>│ Connecting │─────────────>│ Connected │
//! └──────────────┘            └────────────┘              └───────────┘
//!        ↑                         │    ↑                       │
//!        │ teardown                │    │ backoff elapsed       │ Failed
//!        │ (terminal)              ↓    │                       ↓
//!        │                      ┌──────────┐   Failed      ┌────────┐
//!        └──────────────────────│  Failed  │<──────────────│  ...   │
//!                               └──────────┘               └────────┘
//! ```
//!
//! Backoff doubles per consecutive failure from a configurable base up
//! to a ceiling, monotonically non-decreasing by construction.
//! Removing a chatroom drops its `FeedPair` outright, which cancels
//! any pending backoff: a later tick cannot resurrect state that no
//! longer exists.

use std::{collections::HashMap, ops::Sub, time::Duration};

use chatdeck_core::ChatroomId;

use crate::{
    action::SessionAction,
    config::SessionConfig,
    event::{FeedKind, FeedStatus},
    state::{ChatroomConnStatus, StatusReport},
};

/// Exponent cap so the doubling shift cannot overflow; the delay
/// ceiling kicks in long before this for any sane config.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// State of one sub-connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState<I> {
    /// Torn down; terminal for this instance.
    Disconnected,
    /// Open requested, handshake in flight.
    Connecting,
    /// Delivering events.
    Connected,
    /// Failed; reconnect scheduled.
    Failed {
        /// When the failure was observed (backoff reference point).
        since: I,
    },
}

#[derive(Debug, Clone)]
struct FeedConn<I> {
    state: FeedState<I>,
    /// Consecutive failures since the last successful connect.
    attempt: u32,
}

impl<I> FeedConn<I> {
    fn new() -> Self {
        Self { state: FeedState::Disconnected, attempt: 0 }
    }
}

#[derive(Debug, Clone)]
struct FeedPair<I> {
    primary: FeedConn<I>,
    cosmetic: FeedConn<I>,
}

impl<I> FeedPair<I> {
    fn new() -> Self {
        Self { primary: FeedConn::new(), cosmetic: FeedConn::new() }
    }

    fn feed(&self, kind: FeedKind) -> &FeedConn<I> {
        match kind {
            FeedKind::Primary => &self.primary,
            FeedKind::Cosmetic => &self.cosmetic,
        }
    }

    fn feed_mut(&mut self, kind: FeedKind) -> &mut FeedConn<I> {
        match kind {
            FeedKind::Primary => &mut self.primary,
            FeedKind::Cosmetic => &mut self.cosmetic,
        }
    }
}

/// Owns every chatroom's feed pair.
#[derive(Debug, Clone)]
pub struct ConnectionManager<I> {
    feeds: HashMap<ChatroomId, FeedPair<I>>,
}

impl<I> ConnectionManager<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Create an empty manager.
    pub fn new() -> Self {
        Self { feeds: HashMap::new() }
    }

    /// Request one feed open. Idempotent: a no-op while the feed is
    /// already `Connecting` or `Connected`.
    pub fn connect(&mut self, chatroom_id: ChatroomId, kind: FeedKind) -> Option<SessionAction> {
        let pair = self.feeds.entry(chatroom_id).or_insert_with(FeedPair::new);
        let conn = pair.feed_mut(kind);
        match conn.state {
            FeedState::Connecting | FeedState::Connected => None,
            FeedState::Disconnected | FeedState::Failed { .. } => {
                conn.state = FeedState::Connecting;
                Some(SessionAction::OpenFeed { chatroom_id, feed: kind })
            },
        }
    }

    /// Request both of a chatroom's feeds open.
    pub fn connect_both(&mut self, chatroom_id: ChatroomId) -> Vec<SessionAction> {
        [FeedKind::Primary, FeedKind::Cosmetic]
            .into_iter()
            .filter_map(|kind| self.connect(chatroom_id, kind))
            .collect()
    }

    /// Apply a driver-reported status transition.
    ///
    /// Returns whether observable state changed. Failures for
    /// chatrooms no longer tracked (torn down mid-handshake) are
    /// dropped.
    pub fn on_status(
        &mut self,
        chatroom_id: ChatroomId,
        kind: FeedKind,
        status: &FeedStatus,
        now: I,
    ) -> bool {
        let Some(pair) = self.feeds.get_mut(&chatroom_id) else {
            tracing::debug!(chatroom_id, feed = %kind, "dropping status for untracked chatroom");
            return false;
        };
        let conn = pair.feed_mut(kind);
        match status {
            FeedStatus::Connected => {
                let changed = conn.state != FeedState::Connected;
                conn.state = FeedState::Connected;
                conn.attempt = 0;
                changed
            },
            FeedStatus::Failed { reason } => {
                if conn.state == FeedState::Disconnected {
                    return false;
                }
                conn.attempt += 1;
                conn.state = FeedState::Failed { since: now };
                tracing::warn!(
                    chatroom_id,
                    feed = %kind,
                    attempt = conn.attempt,
                    %reason,
                    "feed failed, reconnect scheduled"
                );
                true
            },
        }
    }

    /// Re-issue opens for failed feeds whose backoff has elapsed.
    pub fn tick(&mut self, now: I, config: &SessionConfig) -> Vec<SessionAction> {
        let mut actions = Vec::new();
        for (chatroom_id, pair) in &mut self.feeds {
            for kind in [FeedKind::Primary, FeedKind::Cosmetic] {
                let conn = pair.feed_mut(kind);
                if let FeedState::Failed { since } = conn.state
                    && now - since >= Self::backoff_delay(conn.attempt, config)
                {
                    conn.state = FeedState::Connecting;
                    actions.push(SessionAction::OpenFeed { chatroom_id: *chatroom_id, feed: kind });
                }
            }
        }
        actions
    }

    /// Delay before the `attempt`-th reconnect: base doubled per
    /// consecutive failure, clamped to the ceiling.
    pub fn backoff_delay(attempt: u32, config: &SessionConfig) -> Duration {
        let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        config
            .reconnect_base_delay
            .saturating_mul(1_u32 << exponent)
            .min(config.reconnect_max_delay)
    }

    /// Tear down one chatroom's feeds.
    ///
    /// Drops the pair (cancelling any pending backoff) and returns
    /// close actions for feeds with something open to close.
    pub fn teardown(&mut self, chatroom_id: ChatroomId) -> Vec<SessionAction> {
        let Some(pair) = self.feeds.remove(&chatroom_id) else {
            return Vec::new();
        };
        [FeedKind::Primary, FeedKind::Cosmetic]
            .into_iter()
            .filter(|kind| {
                matches!(pair.feed(*kind).state, FeedState::Connecting | FeedState::Connected)
            })
            .map(|feed| SessionAction::CloseFeed { chatroom_id, feed })
            .collect()
    }

    /// Close every open sub-connection across all chatrooms and clear
    /// the map. Safe to call when no connections exist.
    ///
    /// Internal state is detached before close actions are produced,
    /// so an event arriving mid-teardown finds nothing to mutate.
    pub fn cleanup(&mut self) -> Vec<SessionAction> {
        let feeds = std::mem::take(&mut self.feeds);
        let mut actions = Vec::new();
        for (chatroom_id, pair) in feeds {
            for kind in [FeedKind::Primary, FeedKind::Cosmetic] {
                if matches!(pair.feed(kind).state, FeedState::Connecting | FeedState::Connected) {
                    actions.push(SessionAction::CloseFeed { chatroom_id, feed: kind });
                }
            }
        }
        actions
    }

    /// Whether the manager tracks this chatroom.
    pub fn is_tracked(&self, chatroom_id: ChatroomId) -> bool {
        self.feeds.contains_key(&chatroom_id)
    }

    /// Current state of one sub-connection.
    pub fn feed_state(&self, chatroom_id: ChatroomId, kind: FeedKind) -> Option<FeedState<I>> {
        self.feeds.get(&chatroom_id).map(|pair| pair.feed(kind).state)
    }

    /// Read-only status projection: per-chatroom connected flags plus
    /// aggregate counts. Never triggers side effects.
    pub fn status(&self) -> StatusReport {
        let mut chatrooms: Vec<ChatroomConnStatus> = self
            .feeds
            .iter()
            .map(|(id, pair)| ChatroomConnStatus {
                chatroom_id: *id,
                primary_connected: pair.primary.state == FeedState::Connected,
                cosmetic_connected: pair.cosmetic.state == FeedState::Connected,
            })
            .collect();
        chatrooms.sort_by_key(|c| c.chatroom_id);

        let total = chatrooms.len();
        let healthy =
            chatrooms.iter().filter(|c| c.primary_connected && c.cosmetic_connected).count();
        let failed = self
            .feeds
            .values()
            .filter(|pair| {
                matches!(pair.primary.state, FeedState::Failed { .. })
                    || matches!(pair.cosmetic.state, FeedState::Failed { .. })
            })
            .count();

        StatusReport { chatrooms, total, healthy, failed }
    }
}
