//! # Stream Bridge
//!
//! Owns the upstream post subscription and the keyword filters it is matched against.
//! Each subscription is a pump task draining the transport's event channel into [`StreamBridge::on_post`].
//! Restarts are synchronous: the old pump is cancelled and awaited before the new one is spawned,
//! so two subscriptions never overlap. A pump whose stream ends, or whose connect failed for a reason
//! other than rate limiting or rejected credentials, resubscribes with exponential backoff.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::application::filters::KeywordFilters;
use crate::domain::error::TransportError;
use crate::domain::traits::{StreamObserver, StreamTransport};
use crate::domain::types::{Post, StreamEvent, TweetStats};

const RECONNECT_MIN: Duration = Duration::from_secs(1);
const RECONNECT_MAX: Duration = Duration::from_secs(64);

struct Subscription {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct BridgeInner {
    transport: Arc<dyn StreamTransport>,
    filters: Mutex<KeywordFilters>,
    observer: Mutex<Option<Arc<dyn StreamObserver>>>,
    buffer: Mutex<Vec<String>>,
    total_posts: AtomicU64,
    started_at: Mutex<Option<Instant>>,
    subscription: Mutex<Option<Subscription>>,
    closed: AtomicBool,
}

#[derive(Clone)]
pub struct StreamBridge {
    inner: Arc<BridgeInner>,
}

impl StreamBridge {
    pub fn new(transport: Arc<dyn StreamTransport>, filters: KeywordFilters) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                transport,
                filters: Mutex::new(filters),
                observer: Mutex::new(None),
                buffer: Mutex::new(Vec::new()),
                total_posts: AtomicU64::new(0),
                started_at: Mutex::new(None),
                subscription: Mutex::new(None),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Registers the relay. Without one, matched posts are buffered for [`Self::drain_buffered`].
    pub async fn set_observer(&self, observer: Arc<dyn StreamObserver>) {
        *self.inner.observer.lock().await = Some(observer);
    }

    pub async fn add_keyword(&self, keyword: &str) -> bool {
        self.inner.filters.lock().await.add(keyword)
    }

    pub async fn remove_keyword(&self, keyword: &str) -> bool {
        self.inner.filters.lock().await.remove(keyword)
    }

    pub async fn clear_keywords(&self) {
        self.inner.filters.lock().await.clear();
    }

    pub async fn snapshot(&self) -> Vec<(String, u64)> {
        self.inner.filters.lock().await.snapshot()
    }

    /// Sets the session clock used for posts-per-minute. Later calls are ignored.
    pub async fn mark_started(&self) {
        let mut started = self.inner.started_at.lock().await;
        if started.is_none() {
            *started = Some(Instant::now());
        }
    }

    pub async fn started_at(&self) -> Option<Instant> {
        *self.inner.started_at.lock().await
    }

    /// Handles one inbound post. Returns true when it matched a tracked keyword.
    pub async fn on_post(&self, post: Post) -> bool {
        if post.is_repost {
            tracing::trace!("Skipping repost");
            return false;
        }

        let Some(keyword) = self.inner.filters.lock().await.match_post(&post.text) else {
            return false;
        };
        self.inner.total_posts.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Post matched keyword '{}'", keyword);

        let observer = self.inner.observer.lock().await.clone();
        match observer {
            Some(observer) => observer.on_match(&post.text).await,
            None => self.inner.buffer.lock().await.push(post.text),
        }
        true
    }

    /// Returns and clears the posts buffered while no observer was registered.
    pub async fn drain_buffered(&self) -> Vec<String> {
        std::mem::take(&mut *self.inner.buffer.lock().await)
    }

    pub async fn stats(&self) -> TweetStats {
        let total_posts = self.inner.total_posts.load(Ordering::Relaxed);
        let minutes = self
            .started_at()
            .await
            .map_or(0.0, |t| t.elapsed().as_secs_f64() / 60.0);
        let posts_per_minute = if minutes > 0.0 {
            total_posts as f64 / minutes
        } else {
            0.0
        };

        TweetStats {
            posts_per_minute,
            filters: self.snapshot().await,
            total_posts,
        }
    }

    /// Tears down the current subscription and opens a new one with the current keywords.
    /// Transient connect failures are returned but leave a pump retrying in the background.
    pub async fn restart(&self) -> Result<(), TransportError> {
        let mut slot = self.inner.subscription.lock().await;
        if self.inner.closed.load(Ordering::SeqCst) {
            tracing::debug!("Ignoring restart after shutdown");
            return Err(TransportError::Closed);
        }
        if let Some(old) = slot.take() {
            Self::stop_pump(old).await;
            self.inner.transport.disconnect().await;
        }

        let keywords = self.inner.filters.lock().await.keywords();
        let (events, result) = match self.inner.transport.connect(&keywords).await {
            Ok(events) => {
                tracing::info!("Post stream subscribed with {} keyword(s)", keywords.len());
                (Some(events), Ok(()))
            }
            Err(TransportError::RateLimited) => {
                tracing::warn!("Post stream rate limited on connect; stream stays down");
                return Err(TransportError::RateLimited);
            }
            Err(TransportError::Unauthorized(e)) => {
                tracing::error!("Post stream rejected credentials: {}", e);
                return Err(TransportError::Unauthorized(e));
            }
            Err(e) => {
                tracing::error!("Post stream connect failed, retrying in background: {}", e);
                (None, Err(e))
            }
        };

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(pump(self.clone(), events, cancel.clone()));
        *slot = Some(Subscription { cancel, handle });
        result
    }

    /// Cancels the subscription and disconnects. Later restarts are refused. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        let old = self.inner.subscription.lock().await.take();
        if let Some(old) = old {
            Self::stop_pump(old).await;
            self.inner.transport.disconnect().await;
            tracing::info!("Post stream closed");
        }
    }

    /// True while a pump task is consuming or resubscribing.
    #[cfg(test)]
    pub async fn is_streaming(&self) -> bool {
        self.inner
            .subscription
            .lock()
            .await
            .as_ref()
            .is_some_and(|sub| !sub.handle.is_finished())
    }

    async fn stop_pump(sub: Subscription) {
        sub.cancel.cancel();
        if let Err(e) = sub.handle.await
            && e.is_panic()
        {
            tracing::error!("Post stream task panicked: {}", e);
        }
    }
}

enum Drained {
    Cancelled,
    RateLimited,
    Ended { received: bool },
}

async fn drain(
    bridge: &StreamBridge,
    events: &mut mpsc::Receiver<StreamEvent>,
    cancel: &CancellationToken,
) -> Drained {
    let mut received = false;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Drained::Cancelled,
            event = events.recv() => match event {
                Some(StreamEvent::Post(post)) => {
                    received = true;
                    bridge.on_post(post).await;
                }
                Some(StreamEvent::RateLimited) => {
                    tracing::warn!("Post stream rate limited; no longer consuming");
                    return Drained::RateLimited;
                }
                Some(StreamEvent::Error(e)) => {
                    tracing::warn!("Post stream error: {}", e);
                }
                None => return Drained::Ended { received },
            },
        }
    }
}

async fn pump(
    bridge: StreamBridge,
    mut events: Option<mpsc::Receiver<StreamEvent>>,
    cancel: CancellationToken,
) {
    let mut delay = RECONNECT_MIN;
    loop {
        if let Some(mut rx) = events.take() {
            match drain(&bridge, &mut rx, &cancel).await {
                Drained::Cancelled | Drained::RateLimited => return,
                Drained::Ended { received } => {
                    if received {
                        delay = RECONNECT_MIN;
                    }
                }
            }
        }

        let keywords = bridge.inner.filters.lock().await.keywords();
        if keywords.is_empty() {
            tracing::info!("Post stream idle: no keywords tracked");
            return;
        }

        tracing::info!("Resubscribing post stream in {:?}", delay);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = bridge.inner.transport.connect(&keywords) => result,
        };
        match connected {
            Ok(rx) => {
                tracing::info!("Post stream resubscribed with {} keyword(s)", keywords.len());
                events = Some(rx);
            }
            Err(TransportError::RateLimited) => {
                tracing::warn!("Post stream rate limited on resubscribe; stream stays down");
                return;
            }
            Err(TransportError::Unauthorized(e)) => {
                tracing::error!("Post stream rejected credentials on resubscribe: {}", e);
                return;
            }
            Err(e) => {
                tracing::warn!("Post stream resubscribe failed: {}", e);
                delay = (delay * 2).min(RECONNECT_MAX);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{MockStream, RecordingObserver};
    use std::time::Duration;

    fn bridge_with(keywords: &[&str]) -> (StreamBridge, Arc<MockStream>, Arc<RecordingObserver>) {
        let stream = Arc::new(MockStream::new());
        let bridge = StreamBridge::new(stream.clone(), KeywordFilters::from_keywords(keywords.iter().copied()));
        let observer = Arc::new(RecordingObserver::default());
        (bridge, stream, observer)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_two_keywords_count_first_only() {
        let (bridge, _stream, observer) = bridge_with(&["rust", "tokio"]);
        bridge.set_observer(observer.clone()).await;

        assert!(bridge.on_post(Post::new("tokio is written in rust")).await);

        assert_eq!(observer.seen(), vec!["tokio is written in rust"]);
        assert_eq!(
            bridge.snapshot().await,
            vec![("rust".to_string(), 1), ("tokio".to_string(), 0)]
        );
        assert_eq!(bridge.stats().await.total_posts, 1);
    }

    #[tokio::test]
    async fn test_reposts_are_dropped() {
        let (bridge, _stream, observer) = bridge_with(&["rust"]);
        bridge.set_observer(observer.clone()).await;

        assert!(!bridge.on_post(Post::repost("RT rust")).await);
        assert!(observer.seen().is_empty());
        assert_eq!(bridge.snapshot().await, vec![("rust".to_string(), 0)]);
    }

    #[tokio::test]
    async fn test_unmatched_post_is_ignored() {
        let (bridge, _stream, observer) = bridge_with(&["rust"]);
        bridge.set_observer(observer.clone()).await;

        assert!(!bridge.on_post(Post::new("nothing here")).await);
        assert!(observer.seen().is_empty());
        assert_eq!(bridge.stats().await.total_posts, 0);
    }

    #[tokio::test]
    async fn test_without_observer_posts_are_buffered() {
        let (bridge, _stream, _observer) = bridge_with(&["rust"]);

        bridge.on_post(Post::new("rust 1")).await;
        bridge.on_post(Post::new("rust 2")).await;

        assert_eq!(bridge.drain_buffered().await, vec!["rust 1", "rust 2"]);
        assert!(bridge.drain_buffered().await.is_empty());
    }

    #[tokio::test]
    async fn test_restart_closes_old_subscription_first() {
        let (bridge, stream, _observer) = bridge_with(&["rust"]);

        bridge.restart().await.unwrap();
        assert_eq!((stream.connects(), stream.disconnects()), (1, 0));

        bridge.add_keyword("tokio").await;
        bridge.restart().await.unwrap();
        assert_eq!((stream.connects(), stream.disconnects()), (2, 1));
        assert_eq!(
            *stream.last_keywords.lock().unwrap(),
            vec!["rust".to_string(), "tokio".to_string()]
        );
    }

    #[tokio::test]
    async fn test_pump_relays_posts() {
        let (bridge, stream, observer) = bridge_with(&["rust"]);
        bridge.set_observer(observer.clone()).await;
        bridge.restart().await.unwrap();

        assert!(stream.push(StreamEvent::Error("hiccup".into())).await);
        assert!(stream.push(StreamEvent::Post(Post::new("rust!"))).await);
        settle().await;

        assert_eq!(observer.seen(), vec!["rust!"]);
        assert!(bridge.is_streaming().await);
    }

    #[tokio::test]
    async fn test_rate_limit_stops_consumption() {
        let (bridge, stream, observer) = bridge_with(&["rust"]);
        bridge.set_observer(observer.clone()).await;
        bridge.restart().await.unwrap();

        stream.push(StreamEvent::RateLimited).await;
        settle().await;

        assert!(!bridge.is_streaming().await);
        stream.push(StreamEvent::Post(Post::new("rust"))).await;
        settle().await;
        assert!(observer.seen().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limited_connect_is_reported() {
        let (bridge, stream, _observer) = bridge_with(&["rust"]);
        stream
            .rate_limit_on_connect
            .store(true, std::sync::atomic::Ordering::SeqCst);

        assert!(matches!(
            bridge.restart().await,
            Err(TransportError::RateLimited)
        ));
        assert!(!bridge.is_streaming().await);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let (bridge, stream, _observer) = bridge_with(&["rust"]);
        bridge.restart().await.unwrap();

        bridge.shutdown().await;
        bridge.shutdown().await;

        assert_eq!(stream.disconnects(), 1);
        assert!(!bridge.is_streaming().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_with_zero_elapsed_time() {
        let (bridge, _stream, _observer) = bridge_with(&["rust"]);
        assert_eq!(bridge.stats().await.posts_per_minute, 0.0);

        bridge.mark_started().await;
        bridge.on_post(Post::new("rust")).await;
        let stats = bridge.stats().await;
        assert_eq!(stats.posts_per_minute, 0.0);
        assert_eq!(stats.total_posts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_posts_per_minute() {
        let (bridge, _stream, _observer) = bridge_with(&["rust"]);
        bridge.mark_started().await;
        for _ in 0..4 {
            bridge.on_post(Post::new("rust")).await;
        }
        tokio::time::advance(Duration::from_secs(120)).await;

        let stats = bridge.stats().await;
        assert!((stats.posts_per_minute - 2.0).abs() < 1e-9);
        assert_eq!(stats.filters, vec![("rust".to_string(), 4)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ended_stream_resubscribes_and_relays() {
        let (bridge, stream, observer) = bridge_with(&["rust"]);
        bridge.set_observer(observer.clone()).await;
        bridge.restart().await.unwrap();

        stream.push(StreamEvent::Error("connection reset".into())).await;
        stream.close();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(stream.connects(), 2);
        assert!(bridge.is_streaming().await);
        assert!(stream.push(StreamEvent::Post(Post::new("rust again"))).await);
        settle().await;
        assert_eq!(observer.seen(), vec!["rust again"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_connect_retries_with_backoff() {
        let (bridge, stream, observer) = bridge_with(&["rust"]);
        bridge.set_observer(observer.clone()).await;
        stream
            .failing_connects
            .store(2, std::sync::atomic::Ordering::SeqCst);

        assert!(matches!(
            bridge.restart().await,
            Err(TransportError::Protocol(_))
        ));
        // Retries after 1s (fails again) and 1s + 2s (succeeds).
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(stream.connects(), 2);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(stream.connects(), 3);

        assert!(stream.push(StreamEvent::Post(Post::new("rust"))).await);
        settle().await;
        assert_eq!(observer.seen(), vec!["rust"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_credentials_are_not_retried() {
        let (bridge, stream, _observer) = bridge_with(&["rust"]);
        stream
            .unauthorized_on_connect
            .store(true, std::sync::atomic::Ordering::SeqCst);

        assert!(matches!(
            bridge.restart().await,
            Err(TransportError::Unauthorized(_))
        ));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(stream.connects(), 1);
        assert!(!bridge.is_streaming().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_keyword_stream_stays_idle() {
        let (bridge, stream, _observer) = bridge_with(&[]);
        bridge.restart().await.unwrap();

        stream.close();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(stream.connects(), 1);
        assert!(!bridge.is_streaming().await);
    }

    #[tokio::test]
    async fn test_restart_after_shutdown_is_refused() {
        let (bridge, stream, _observer) = bridge_with(&["rust"]);
        bridge.restart().await.unwrap();
        bridge.shutdown().await;

        assert!(matches!(bridge.restart().await, Err(TransportError::Closed)));
        assert_eq!((stream.connects(), stream.disconnects()), (1, 1));
        assert!(!bridge.is_streaming().await);
    }
}
