//! In-memory transports for exercising the session and bridge without a network.

use anyhow::{Result, bail};
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::mpsc;

use crate::domain::error::TransportError;
use crate::domain::traits::{ChatTransport, StreamObserver, StreamTransport};
use crate::domain::types::{ChannelInfo, ChatEvent, StreamEvent};

pub const BOT_ID: &str = "UBOT";

pub struct MockChat {
    pub bot_id: String,
    pub channels: Vec<ChannelInfo>,
    pub sent: Mutex<Vec<(String, String)>>,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub fail_sends: AtomicBool,
    pub fail_identity: AtomicBool,
    events: Mutex<Option<mpsc::Sender<ChatEvent>>>,
}

impl MockChat {
    pub fn new() -> Self {
        Self {
            bot_id: BOT_ID.to_string(),
            channels: vec![
                ChannelInfo::new("C1", "general"),
                ChannelInfo::new("C2", "tweets"),
            ],
            sent: Mutex::new(Vec::new()),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            fail_sends: AtomicBool::new(false),
            fail_identity: AtomicBool::new(false),
            events: Mutex::new(None),
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_text(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|(_, text)| text.clone())
    }

    /// Pushes an event into the stream returned by `connect`.
    pub async fn push(&self, event: ChatEvent) {
        let tx = self.events.lock().unwrap().clone();
        if let Some(tx) = tx {
            tx.send(event).await.unwrap();
        }
    }
}

#[async_trait]
impl ChatTransport for MockChat {
    async fn connect(&self) -> Result<mpsc::Receiver<ChatEvent>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(16);
        *self.events.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().take();
        Ok(())
    }

    async fn bot_user_id(&self) -> Result<String> {
        if self.fail_identity.load(Ordering::SeqCst) {
            bail!("invalid_auth");
        }
        Ok(self.bot_id.clone())
    }

    async fn joined_channels(&self) -> Result<Vec<ChannelInfo>> {
        Ok(self.channels.clone())
    }

    async fn send_message(&self, channel: &str, text: &str) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            bail!("channel_not_found");
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel.to_string(), text.to_string()));
        Ok(())
    }
}

pub struct MockStream {
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub rate_limit_on_connect: AtomicBool,
    pub unauthorized_on_connect: AtomicBool,
    /// Number of upcoming connects that fail with a protocol error.
    pub failing_connects: AtomicUsize,
    pub last_keywords: Mutex<Vec<String>>,
    events: Mutex<Option<mpsc::Sender<StreamEvent>>>,
}

impl MockStream {
    pub fn new() -> Self {
        Self {
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            rate_limit_on_connect: AtomicBool::new(false),
            unauthorized_on_connect: AtomicBool::new(false),
            failing_connects: AtomicUsize::new(0),
            last_keywords: Mutex::new(Vec::new()),
            events: Mutex::new(None),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Drops the sender of the live subscription, as an upstream hang-up does.
    pub fn close(&self) {
        self.events.lock().unwrap().take();
    }

    /// Pushes an event into the live subscription. Returns false when there is none.
    pub async fn push(&self, event: StreamEvent) -> bool {
        let tx = self.events.lock().unwrap().clone();
        match tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl StreamTransport for MockStream {
    async fn connect(
        &self,
        keywords: &[String],
    ) -> Result<mpsc::Receiver<StreamEvent>, TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.rate_limit_on_connect.load(Ordering::SeqCst) {
            return Err(TransportError::RateLimited);
        }
        if self.unauthorized_on_connect.load(Ordering::SeqCst) {
            return Err(TransportError::Unauthorized("status 401".into()));
        }
        if self
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(TransportError::Protocol("stream returned status 503".into()));
        }
        *self.last_keywords.lock().unwrap() = keywords.to_vec();
        let (tx, rx) = mpsc::channel(16);
        *self.events.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().take();
    }
}

/// Observer that records every relayed post.
#[derive(Default)]
pub struct RecordingObserver {
    pub seen: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl StreamObserver for RecordingObserver {
    async fn on_match(&self, text: &str) {
        self.seen.lock().unwrap().push(text.to_string());
    }
}
