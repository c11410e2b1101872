//! # Slack Adapter
//!
//! Implements `ChatTransport` over the Slack Web API (`reqwest`) and Socket Mode (`tokio-tungstenite`).
//! Inbound envelopes are acknowledged, decoded into `ChatEvent`s and pushed onto an mpsc channel.
//! The reader reconnects whenever Slack asks it to or the socket drops.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use crate::domain::traits::ChatTransport;
use crate::domain::types::{ChannelInfo, ChatEvent};

const EVENT_BUFFER: usize = 64;
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct ApiStatus {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthTest {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct SocketOpen {
    url: String,
}

#[derive(Debug, Deserialize)]
struct Conversations {
    #[serde(default)]
    channels: Vec<Conversation>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct Conversation {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

/// Thin Web API client. Cloned into the socket reader task.
#[derive(Clone)]
struct SlackApi {
    http: reqwest::Client,
    api_base: String,
    app_token: String,
    bot_token: String,
}

impl SlackApi {
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        token: &str,
        form: &[(&str, &str)],
    ) -> Result<T> {
        let response = self
            .http
            .post(format!("{}/{}", self.api_base, method))
            .bearer_auth(token)
            .form(form)
            .send()
            .await
            .with_context(|| format!("slack {method} request failed"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("slack {method} failed with status {}", status.as_u16());
        }

        let body: Value = response
            .json()
            .await
            .with_context(|| format!("failed to decode slack {method}"))?;
        decode_api_body(method, body)
    }

    async fn open_socket(&self) -> Result<String> {
        let opened: SocketOpen = self
            .call("apps.connections.open", &self.app_token, &[])
            .await?;
        Ok(opened.url)
    }

    async fn post_message(&self, channel: &str, text: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/chat.postMessage", self.api_base))
            .bearer_auth(&self.bot_token)
            .json(&json!({
                "channel": channel,
                "text": text,
                "unfurl_links": false,
                "unfurl_media": false,
            }))
            .send()
            .await
            .context("slack chat.postMessage request failed")?;
        let body: Value = response
            .json()
            .await
            .context("failed to decode slack chat.postMessage")?;
        decode_api_body::<Value>("chat.postMessage", body).map(|_| ())
    }
}

/// Checks Slack's `ok`/`error` envelope, then decodes the rest of the body.
fn decode_api_body<T: DeserializeOwned>(method: &str, body: Value) -> Result<T> {
    let status: ApiStatus = serde_json::from_value(body.clone())
        .with_context(|| format!("slack {method} response missing ok flag"))?;
    if !status.ok {
        return Err(anyhow!(
            "slack {method} failed: {}",
            status.error.unwrap_or_else(|| "unknown error".to_string())
        ));
    }
    serde_json::from_value(body).with_context(|| format!("failed to decode slack {method}"))
}

struct SocketTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct SlackTransport {
    api: SlackApi,
    socket: Mutex<Option<SocketTask>>,
}

impl SlackTransport {
    pub fn new(api_base: &str, app_token: &str, bot_token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to create slack api client")?;
        Ok(Self {
            api: SlackApi {
                http,
                api_base: api_base.trim_end_matches('/').to_string(),
                app_token: app_token.trim().to_string(),
                bot_token: bot_token.trim().to_string(),
            },
            socket: Mutex::new(None),
        })
    }
}

#[async_trait]
impl ChatTransport for SlackTransport {
    async fn connect(&self) -> Result<mpsc::Receiver<ChatEvent>> {
        let mut slot = self.socket.lock().await;
        if let Some(old) = slot.take() {
            old.cancel.cancel();
            let _ = old.handle.await;
        }

        // The first URL is fetched here so bad app tokens fail startup.
        let url = self.api.open_socket().await?;
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(read_socket(self.api.clone(), url, tx, cancel.clone()));
        *slot = Some(SocketTask { cancel, handle });
        Ok(rx)
    }

    async fn disconnect(&self) -> Result<()> {
        if let Some(task) = self.socket.lock().await.take() {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                tracing::warn!("Slack socket reader ended abnormally: {}", e);
            }
            tracing::info!("Slack socket closed");
        }
        Ok(())
    }

    async fn bot_user_id(&self) -> Result<String> {
        let auth: AuthTest = self
            .api
            .call("auth.test", &self.api.bot_token, &[])
            .await?;
        if auth.user_id.trim().is_empty() {
            bail!("slack auth.test did not return user_id");
        }
        Ok(auth.user_id)
    }

    async fn joined_channels(&self) -> Result<Vec<ChannelInfo>> {
        let mut channels = Vec::new();
        let mut cursor = String::new();
        loop {
            let page: Conversations = self
                .api
                .call(
                    "users.conversations",
                    &self.api.bot_token,
                    &[
                        ("types", "public_channel,private_channel"),
                        ("exclude_archived", "true"),
                        ("limit", "200"),
                        ("cursor", cursor.as_str()),
                    ],
                )
                .await?;
            channels.extend(
                page.channels
                    .into_iter()
                    .map(|c| ChannelInfo::new(c.id, c.name)),
            );
            match page.response_metadata {
                Some(meta) if !meta.next_cursor.is_empty() => cursor = meta.next_cursor,
                _ => break,
            }
        }
        Ok(channels)
    }

    async fn send_message(&self, channel: &str, text: &str) -> Result<()> {
        tracing::debug!("Sending to {}: {}", channel, text);
        self.api.post_message(channel, text).await
    }
}

/// Reads the socket until cancelled or the receiver is dropped, reopening it as needed.
async fn read_socket(
    api: SlackApi,
    first_url: String,
    tx: mpsc::Sender<ChatEvent>,
    cancel: CancellationToken,
) {
    let mut url = Some(first_url);
    loop {
        let target = match url.take() {
            Some(u) => u,
            None => match api.open_socket().await {
                Ok(u) => u,
                Err(e) => {
                    tracing::warn!("Slack socket reopen failed: {:#}", e);
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => continue,
                    }
                }
            },
        };

        let outcome = tokio::select! {
            _ = cancel.cancelled() => return,
            outcome = run_socket_session(&target, &tx) => outcome,
        };
        match outcome {
            Ok(SessionEnd::ReceiverGone) => return,
            Ok(SessionEnd::Reconnect) => tracing::info!("Slack requested reconnect"),
            Err(e) => tracing::warn!("Slack socket session error: {:#}", e),
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
    }
}

enum SessionEnd {
    Reconnect,
    ReceiverGone,
}

async fn run_socket_session(url: &str, tx: &mpsc::Sender<ChatEvent>) -> Result<SessionEnd> {
    let (stream, _response) = connect_async(url)
        .await
        .context("failed to connect slack socket mode websocket")?;
    let (mut sink, mut source) = stream.split();
    tracing::info!("Slack socket connected");

    while let Some(message) = source.next().await {
        let message = message.context("failed reading slack websocket message")?;
        let Some(envelope) = parse_socket_message(message)? else {
            continue;
        };

        if let Some(envelope_id) = &envelope.envelope_id {
            let ack = json!({ "envelope_id": envelope_id }).to_string();
            sink.send(WsMessage::Text(ack.into()))
                .await
                .context("failed to send slack socket ack")?;
        }

        match classify_envelope(&envelope) {
            SocketAction::Event(event) => {
                if tx.send(event).await.is_err() {
                    return Ok(SessionEnd::ReceiverGone);
                }
            }
            SocketAction::Reconnect => return Ok(SessionEnd::Reconnect),
            SocketAction::Ignore => {}
        }
    }
    Ok(SessionEnd::Reconnect)
}

#[derive(Debug, Deserialize)]
struct SocketEnvelope {
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(rename = "type")]
    envelope_type: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Deserialize)]
struct EventCallback {
    #[serde(rename = "type")]
    callback_type: String,
    event: SlackEvent,
}

#[derive(Debug, Deserialize)]
struct SlackEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    channel: Option<String>,
}

#[derive(Debug, PartialEq)]
enum SocketAction {
    Event(ChatEvent),
    Reconnect,
    Ignore,
}

fn parse_socket_message(message: WsMessage) -> Result<Option<SocketEnvelope>> {
    let text = match message {
        WsMessage::Text(text) => text.as_str().to_owned(),
        WsMessage::Binary(bytes) => {
            String::from_utf8(bytes.to_vec()).context("invalid utf-8 slack socket payload")?
        }
        _ => return Ok(None),
    };
    serde_json::from_str(&text)
        .map(Some)
        .context("failed to parse slack socket envelope")
}

fn classify_envelope(envelope: &SocketEnvelope) -> SocketAction {
    match envelope.envelope_type.as_str() {
        "disconnect" => return SocketAction::Reconnect,
        "events_api" => {}
        _ => return SocketAction::Ignore,
    }

    let callback = match serde_json::from_value::<EventCallback>(envelope.payload.clone()) {
        Ok(callback) if callback.callback_type == "event_callback" => callback,
        Ok(_) => return SocketAction::Ignore,
        Err(e) => {
            tracing::debug!("Skipping undecodable slack event: {}", e);
            return SocketAction::Ignore;
        }
    };

    let event = callback.event;
    match event.event_type.as_str() {
        "message" => {
            if event.subtype.is_some() || event.bot_id.is_some() {
                return SocketAction::Ignore;
            }
            match (event.channel, event.text) {
                (Some(channel), Some(text)) => SocketAction::Event(ChatEvent::Message {
                    channel,
                    user: event.user,
                    text,
                }),
                _ => SocketAction::Ignore,
            }
        }
        "member_joined_channel" => match (event.channel, event.user) {
            (Some(channel), Some(user)) => {
                SocketAction::Event(ChatEvent::MemberJoined { channel, user })
            }
            _ => SocketAction::Ignore,
        },
        _ => SocketAction::Ignore,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(raw: &str) -> SocketEnvelope {
        parse_socket_message(WsMessage::Text(raw.to_string().into()))
            .unwrap()
            .unwrap()
    }

    fn events_api(event: Value) -> String {
        json!({
            "envelope_id": "env-1",
            "type": "events_api",
            "payload": { "type": "event_callback", "event": event },
        })
        .to_string()
    }

    #[test]
    fn test_message_event_decodes() {
        let raw = events_api(json!({
            "type": "message",
            "user": "U1",
            "text": "<@UBOT> ping",
            "channel": "C1",
        }));
        let env = envelope(&raw);
        assert_eq!(env.envelope_id.as_deref(), Some("env-1"));
        assert_eq!(
            classify_envelope(&env),
            SocketAction::Event(ChatEvent::Message {
                channel: "C1".into(),
                user: Some("U1".into()),
                text: "<@UBOT> ping".into(),
            })
        );
    }

    #[test]
    fn test_member_joined_decodes() {
        let raw = events_api(json!({
            "type": "member_joined_channel",
            "user": "UBOT",
            "channel": "C9",
        }));
        assert_eq!(
            classify_envelope(&envelope(&raw)),
            SocketAction::Event(ChatEvent::MemberJoined {
                channel: "C9".into(),
                user: "UBOT".into(),
            })
        );
    }

    #[test]
    fn test_bot_and_edited_messages_skipped() {
        let bot = events_api(json!({
            "type": "message",
            "subtype": "bot_message",
            "bot_id": "B1",
            "text": "hi",
            "channel": "C1",
        }));
        let edited = events_api(json!({
            "type": "message",
            "subtype": "message_changed",
            "channel": "C1",
        }));
        let app_post = events_api(json!({
            "type": "message",
            "bot_id": "B2",
            "user": "U2",
            "text": "hi",
            "channel": "C1",
        }));
        for raw in [bot, edited, app_post] {
            assert_eq!(classify_envelope(&envelope(&raw)), SocketAction::Ignore);
        }
    }

    #[test]
    fn test_disconnect_and_hello() {
        let disconnect = envelope(r#"{"type":"disconnect","reason":"refresh_requested"}"#);
        assert!(disconnect.envelope_id.is_none());
        assert_eq!(classify_envelope(&disconnect), SocketAction::Reconnect);

        let hello = envelope(r#"{"type":"hello","num_connections":1}"#);
        assert_eq!(classify_envelope(&hello), SocketAction::Ignore);
    }

    #[test]
    fn test_control_frames_are_not_envelopes() {
        assert!(
            parse_socket_message(WsMessage::Ping(bytes::Bytes::new()))
                .unwrap()
                .is_none()
        );
        assert!(parse_socket_message(WsMessage::Text("not json".to_string().into())).is_err());
    }

    #[test]
    fn test_api_body_checks_ok_flag() {
        let auth: AuthTest =
            decode_api_body("auth.test", json!({"ok": true, "user_id": "UBOT", "team": "T"}))
                .unwrap();
        assert_eq!(auth.user_id, "UBOT");

        let err = decode_api_body::<AuthTest>(
            "auth.test",
            json!({"ok": false, "error": "invalid_auth"}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid_auth"));
    }

    #[test]
    fn test_conversations_page_decodes() {
        let page: Conversations = decode_api_body(
            "users.conversations",
            json!({
                "ok": true,
                "channels": [{"id": "C1", "name": "general"}, {"id": "C2", "name": "tweets"}],
                "response_metadata": {"next_cursor": ""},
            }),
        )
        .unwrap();
        assert_eq!(page.channels.len(), 2);
        assert_eq!(page.channels[1].name, "tweets");
        assert!(page.response_metadata.unwrap().next_cursor.is_empty());
    }
}
