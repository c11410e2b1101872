//! # Twitter Adapter
//!
//! Implements `StreamTransport` over the v1.1 `statuses/filter` streaming endpoint.
//! The response body is newline-delimited JSON; one reader task per subscription
//! splits it into lines and forwards decoded statuses.

use async_trait::async_trait;
use bytes::BytesMut;
use futures::StreamExt;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::domain::config::TwitterCredentials;
use crate::domain::error::TransportError;
use crate::domain::traits::StreamTransport;
use crate::domain::types::{Post, StreamEvent};
use crate::infrastructure::oauth::OAuthSigner;

const EVENT_BUFFER: usize = 256;
/// Upstream sends a keep-alive newline every 30s; three missed means the connection stalled.
const STALL_TIMEOUT: Duration = Duration::from_secs(90);

pub struct TwitterStream {
    http: reqwest::Client,
    stream_url: String,
    signer: OAuthSigner,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl TwitterStream {
    pub fn new(stream_url: &str, credentials: TwitterCredentials) -> Result<Self, TransportError> {
        // No total timeout: the response body never ends on its own.
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            stream_url: stream_url.to_string(),
            signer: OAuthSigner::new(credentials),
            reader: Mutex::new(None),
        })
    }

    async fn abort_reader(&self) -> bool {
        match self.reader.lock().await.take() {
            Some(handle) => {
                handle.abort();
                let _ = handle.await;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl StreamTransport for TwitterStream {
    async fn connect(
        &self,
        keywords: &[String],
    ) -> Result<mpsc::Receiver<StreamEvent>, TransportError> {
        self.abort_reader().await;

        if keywords.is_empty() {
            tracing::info!("No keywords tracked; post stream idle");
            let (_tx, rx) = mpsc::channel(1);
            return Ok(rx);
        }

        let track = keywords.join(",");
        let params = [("track", track.as_str())];
        let authorization = self
            .signer
            .authorization("POST", &self.stream_url, &params)
            .map_err(|e| TransportError::Protocol(e.to_string()))?;

        let response = self
            .http
            .post(&self.stream_url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        match status.as_u16() {
            420 | 429 => return Err(TransportError::RateLimited),
            401 | 403 => {
                let body = response.text().await.unwrap_or_default();
                return Err(TransportError::Unauthorized(format!(
                    "status {}: {}",
                    status.as_u16(),
                    body.trim()
                )));
            }
            _ if !status.is_success() => {
                return Err(TransportError::Protocol(format!(
                    "stream returned status {}",
                    status.as_u16()
                )));
            }
            _ => {}
        }

        tracing::info!("Twitter stream open, tracking: {}", track);
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let handle = tokio::spawn(read_stream(response, tx));
        *self.reader.lock().await = Some(handle);
        Ok(rx)
    }

    async fn disconnect(&self) {
        if self.abort_reader().await {
            tracing::info!("Twitter stream closed");
        }
    }
}

async fn read_stream(response: reqwest::Response, tx: mpsc::Sender<StreamEvent>) {
    let mut body = response.bytes_stream();
    let mut buffer = BytesMut::new();

    loop {
        let chunk = match tokio::time::timeout(STALL_TIMEOUT, body.next()).await {
            Ok(Some(Ok(chunk))) => chunk,
            Ok(Some(Err(e))) => {
                let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                return;
            }
            Ok(None) => {
                tracing::info!("Twitter stream ended by upstream");
                return;
            }
            Err(_) => {
                let _ = tx
                    .send(StreamEvent::Error(format!(
                        "no data for {}s, dropping stalled connection",
                        STALL_TIMEOUT.as_secs()
                    )))
                    .await;
                return;
            }
        };
        buffer.extend_from_slice(&chunk);

        while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
            let line = buffer.split_to(pos + 1);
            if let Some(event) = decode_line(&line) {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamMessage {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    extended_tweet: Option<ExtendedTweet>,
    #[serde(default)]
    retweeted_status: Option<serde_json::Value>,
    #[serde(default)]
    disconnect: Option<DisconnectNotice>,
}

#[derive(Debug, Deserialize)]
struct ExtendedTweet {
    full_text: String,
}

#[derive(Debug, Deserialize)]
struct DisconnectNotice {
    #[serde(default)]
    reason: String,
}

/// One body line to an event. Keep-alives and notices other than disconnects yield `None`.
fn decode_line(line: &[u8]) -> Option<StreamEvent> {
    let text = match std::str::from_utf8(line) {
        Ok(text) => text.trim(),
        Err(e) => return Some(StreamEvent::Error(format!("invalid utf-8 in stream: {e}"))),
    };
    if text.is_empty() {
        return None;
    }

    let message: StreamMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => return Some(StreamEvent::Error(format!("undecodable stream line: {e}"))),
    };

    if let Some(notice) = message.disconnect {
        return Some(StreamEvent::Error(format!(
            "stream disconnected: {}",
            notice.reason
        )));
    }

    let body = message
        .extended_tweet
        .map(|ext| ext.full_text)
        .or(message.text)?;
    Some(StreamEvent::Post(if message.retweeted_status.is_some() {
        Post::repost(body)
    } else {
        Post::new(body)
    }))
}
