//! # Domain Traits
//!
//! Abstract interfaces for the two network collaborators (chat, post stream) and the relay seam
//! between them. The Infrastructure layer provides the real implementations.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::error::TransportError;
use crate::domain::types::{ChannelInfo, ChatEvent, StreamEvent};

/// Abstract interface for a chat transport (e.g., Slack)
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Open the inbound event stream
    async fn connect(&self) -> Result<mpsc::Receiver<ChatEvent>>;

    /// Close the inbound event stream
    async fn disconnect(&self) -> Result<()>;

    /// The platform id of the bot account
    async fn bot_user_id(&self) -> Result<String>;

    /// Channels the bot is currently a member of
    async fn joined_channels(&self) -> Result<Vec<ChannelInfo>>;

    /// Post a plain text message to a channel
    async fn send_message(&self, channel: &str, text: &str) -> Result<()>;
}

/// Abstract interface for a keyword-filtered post stream (e.g., Twitter)
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Subscribe with the given keyword filter.
    async fn connect(
        &self,
        keywords: &[String],
    ) -> Result<mpsc::Receiver<StreamEvent>, TransportError>;

    /// Tear down the current subscription, if any.
    async fn disconnect(&self);
}

/// Receives posts that matched a tracked keyword.
#[async_trait]
pub trait StreamObserver: Send + Sync {
    async fn on_match(&self, text: &str);
}
