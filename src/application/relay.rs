//! # Channel Relay
//!
//! The stream observer that forwards matched posts to the current output channel.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::application::outbox::PacedSender;
use crate::application::state::SessionState;
use crate::domain::traits::StreamObserver;

pub struct ChannelRelay {
    outbox: Arc<PacedSender>,
    state: Arc<Mutex<SessionState>>,
}

impl ChannelRelay {
    pub fn new(outbox: Arc<PacedSender>, state: Arc<Mutex<SessionState>>) -> Self {
        Self { outbox, state }
    }
}

#[async_trait]
impl StreamObserver for ChannelRelay {
    async fn on_match(&self, text: &str) {
        let channel = self.state.lock().await.output_channel.clone();
        match channel {
            Some(channel) => {
                self.outbox.send(&channel.id, text).await;
            }
            None => tracing::warn!("No output channel set, dropping matched tweet"),
        }
    }
}
