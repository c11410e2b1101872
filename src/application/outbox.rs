//! # Paced Sender
//!
//! Every outbound chat message goes through here. Sends are serialized and spaced at least
//! `min_interval` apart. Failures are logged as warnings and never reach the caller.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::domain::traits::ChatTransport;

pub struct PacedSender {
    chat: Arc<dyn ChatTransport>,
    min_interval: Duration,
    last_send: Mutex<Option<Instant>>,
}

impl PacedSender {
    pub fn new(chat: Arc<dyn ChatTransport>, min_interval: Duration) -> Self {
        Self {
            chat,
            min_interval,
            last_send: Mutex::new(None),
        }
    }

    /// Sends `text` to `channel`. Returns whether the transport accepted it.
    pub async fn send(&self, channel: &str, text: &str) -> bool {
        let mut last = self.last_send.lock().await;
        if let Some(previous) = *last {
            tokio::time::sleep_until(previous + self.min_interval).await;
        }

        tracing::debug!("Bot sending message to {}: {}", channel, text);
        let delivered = match self.chat.send_message(channel, text).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to send message to {}: {}", channel, e);
                false
            }
        };
        *last = Some(Instant::now());
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::MockChat;
    use std::sync::atomic::Ordering;

    #[tokio::test(start_paused = true)]
    async fn test_sends_are_spaced() {
        let chat = Arc::new(MockChat::new());
        let sender = PacedSender::new(chat.clone(), Duration::from_secs(1));

        let start = Instant::now();
        assert!(sender.send("C1", "one").await);
        assert!(sender.send("C1", "two").await);
        assert!(sender.send("C1", "three").await);

        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(chat.sent().len(), 3);
    }

    #[tokio::test]
    async fn test_failure_is_swallowed() {
        let chat = Arc::new(MockChat::new());
        chat.fail_sends.store(true, Ordering::SeqCst);
        let sender = PacedSender::new(chat.clone(), Duration::ZERO);

        assert!(!sender.send("C1", "lost").await);
        assert!(chat.sent().is_empty());
    }
}
