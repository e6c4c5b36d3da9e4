//! Chatroom model.

use chatdeck_core::{ChatroomId, UserId};
use serde::{Deserialize, Serialize};

/// Profile data resolved for a chatroom's streamer.
///
/// `metadata` is an opaque blob from the external profile lookup; the
/// orchestrator stores and persists it but never interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamerProfile {
    /// Platform user id of the streamer (presence target).
    pub user_id: UserId,
    /// Opaque profile metadata for the UI layer.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// One subscribed chatroom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chatroom {
    /// Platform-assigned stable id.
    pub id: ChatroomId,
    /// Resolved login name of the channel.
    pub username: String,
    /// User-editable display override; display falls back to
    /// `username`.
    #[serde(default)]
    pub display_name: Option<String>,
    /// UI ordering; ties resolve by insertion order.
    pub order: u32,
    /// Resolved streamer profile.
    pub streamer: StreamerProfile,
    /// Whether the channel is currently live (feed-derived).
    #[serde(default)]
    pub is_live: bool,
}

impl Chatroom {
    /// Name shown in the UI: the display override, else the username.
    pub fn title(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}
