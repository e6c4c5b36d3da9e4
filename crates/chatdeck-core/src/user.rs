//! Authenticated-user types.

use serde::{Deserialize, Serialize};

use crate::UserId;

/// Identity of a chat user as delivered by the platform.
///
/// Used both for the cached current user (sender of optimistic
/// messages) and for inbound message senders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Stable platform-assigned user id.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Display color, as a CSS hex string. `None` if the user never
    /// picked one.
    #[serde(default)]
    pub color: Option<String>,
}

impl UserIdentity {
    /// Create an identity with no display color.
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self { id, username: username.into(), color: None }
    }
}

/// Auth credential as returned by the external auth accessor.
///
/// The orchestrator never acquires or refreshes credentials; it only
/// caches the latest value handed to it and gates outbound presence
/// updates on its presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Bearer token for authenticated operations.
    pub token: String,
    /// Opaque session tag paired with the token.
    pub session_tag: String,
}
