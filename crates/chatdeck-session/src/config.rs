//! Session configuration.

use std::time::Duration;

/// Maximum messages retained per chatroom before oldest-first eviction.
pub const DEFAULT_CHAT_HISTORY_LENGTH: usize = 200;

/// Window over which inbound messages are coalesced into one history
/// update.
pub const DEFAULT_BATCH_WINDOW: Duration = Duration::from_millis(80);

/// First reconnect delay after a feed failure.
pub const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Reconnect delay ceiling.
pub const DEFAULT_RECONNECT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Minimum interval between presence updates for one remote user.
pub const DEFAULT_PRESENCE_INTERVAL: Duration = Duration::from_secs(30);

/// Tunable knobs for the session orchestrator.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// History cap per chatroom.
    pub chat_history_length: usize,
    /// Batching window for inbound messages.
    pub batch_window: Duration,
    /// First reconnect delay; doubles per consecutive failure.
    pub reconnect_base_delay: Duration,
    /// Reconnect delay ceiling.
    pub reconnect_max_delay: Duration,
    /// Presence throttle interval per remote user.
    pub presence_interval: Duration,
    /// Extra phrases that flag a message as a keyword mention.
    pub highlight_keywords: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chat_history_length: DEFAULT_CHAT_HISTORY_LENGTH,
            batch_window: DEFAULT_BATCH_WINDOW,
            reconnect_base_delay: DEFAULT_RECONNECT_BASE_DELAY,
            reconnect_max_delay: DEFAULT_RECONNECT_MAX_DELAY,
            presence_interval: DEFAULT_PRESENCE_INTERVAL,
            highlight_keywords: Vec::new(),
        }
    }
}
