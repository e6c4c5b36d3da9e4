//! Read-only projections of session state.
//!
//! These types are the "view model": the subset of orchestrator state
//! the UI layer renders, snapshotted on every
//! [`crate::SessionAction::Notify`] so the UI never polls and never
//! mutates orchestrator state directly.

use chatdeck_core::{ChatroomId, UserIdentity};

/// Connected flags for one chatroom's feed pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatroomConnStatus {
    /// The chatroom.
    pub chatroom_id: ChatroomId,
    /// Primary feed is connected.
    pub primary_connected: bool,
    /// Cosmetic feed is connected.
    pub cosmetic_connected: bool,
}

/// Aggregate connection status across all chatrooms.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusReport {
    /// Per-chatroom flags, sorted by chatroom id.
    pub chatrooms: Vec<ChatroomConnStatus>,
    /// Tracked chatroom count.
    pub total: usize,
    /// Chatrooms with both feeds connected.
    pub healthy: usize,
    /// Chatrooms with at least one failed feed.
    pub failed: usize,
}

/// One chatroom as the UI lists it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatroomSummary {
    /// The chatroom.
    pub chatroom_id: ChatroomId,
    /// Display name (override or username).
    pub title: String,
    /// Resolved login name.
    pub username: String,
    /// UI ordering value.
    pub order: u32,
    /// Whether the channel is live.
    pub is_live: bool,
    /// Primary feed connected.
    pub primary_connected: bool,
    /// Cosmetic feed connected.
    pub cosmetic_connected: bool,
    /// Messages currently retained.
    pub history_len: usize,
    /// Unread mentions in this chatroom.
    pub unread_mentions: usize,
    /// Whether an unsent draft exists.
    pub has_draft: bool,
}

/// Snapshot pushed to the UI on every observable change.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    /// Chatrooms sorted for display (by order, ties by insertion).
    pub chatrooms: Vec<ChatroomSummary>,
    /// Aggregate connection status.
    pub connection: StatusReport,
    /// Unread mentions across all chatrooms.
    pub unread_mentions: usize,
    /// Cached current user, once fetched.
    pub current_user: Option<UserIdentity>,
    /// Whether the mentions tab is enabled.
    pub mentions_tab: bool,
    /// Transient user-facing status line (e.g. a failed add).
    pub status_message: Option<String>,
}
