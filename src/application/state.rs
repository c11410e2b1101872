//! # Session State
//!
//! Mutable per-session state read by the command handlers and the relay.
//! Lives behind a `tokio::sync::Mutex` owned by the session; nothing here is persisted.

use crate::domain::types::ChannelInfo;

#[derive(Debug, Default, Clone)]
pub struct SessionState {
    /// Chat user id of the bot. `None` until the transport has resolved it.
    pub bot_id: Option<String>,
    /// Where matched posts are relayed.
    pub output_channel: Option<ChannelInfo>,
}

impl SessionState {
    pub fn is_bot(&self, user: &str) -> bool {
        self.bot_id.as_deref() == Some(user)
    }
}
