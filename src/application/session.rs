//! # Bot Session
//!
//! Owns both connections for the lifetime of a run: resolves the bot identity, wires the relay,
//! subscribes to the post stream, then consumes chat events until stopped.
//! `stop()` is the single shutdown path for commands, Ctrl-C and fatal errors.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::bridge::StreamBridge;
use crate::application::filters::KeywordFilters;
use crate::application::outbox::PacedSender;
use crate::application::parsing::parse_direct_mention;
use crate::application::relay::ChannelRelay;
use crate::application::router::{CommandKind, CommandTable};
use crate::application::state::SessionState;
use crate::domain::config::AppConfig;
use crate::domain::error::TransportError;
use crate::domain::traits::{ChatTransport, StreamTransport};
use crate::domain::types::ChatEvent;
use crate::interface::commands;

pub struct BotSession {
    config: AppConfig,
    chat: Arc<dyn ChatTransport>,
    outbox: Arc<PacedSender>,
    bridge: StreamBridge,
    commands: CommandTable,
    state: Arc<Mutex<SessionState>>,
    shutdown: CancellationToken,
    stopped: AtomicBool,
}

impl BotSession {
    pub fn new(
        config: AppConfig,
        chat: Arc<dyn ChatTransport>,
        stream: Arc<dyn StreamTransport>,
    ) -> Self {
        let outbox = Arc::new(PacedSender::new(
            chat.clone(),
            config.slack.min_send_interval(),
        ));
        let filters = KeywordFilters::from_keywords(config.twitter.initial_filters.iter().cloned());
        Self {
            bridge: StreamBridge::new(stream, filters),
            commands: CommandTable::builtin(),
            state: Arc::new(Mutex::new(SessionState::default())),
            shutdown: CancellationToken::new(),
            stopped: AtomicBool::new(false),
            config,
            chat,
            outbox,
        }
    }

    /// Replaces the built-in command table.
    pub fn with_commands(mut self, commands: CommandTable) -> Self {
        self.commands = commands;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn chat(&self) -> &Arc<dyn ChatTransport> {
        &self.chat
    }

    pub fn outbox(&self) -> &PacedSender {
        &self.outbox
    }

    pub fn bridge(&self) -> &StreamBridge {
        &self.bridge
    }

    pub fn commands(&self) -> &CommandTable {
        &self.commands
    }

    pub fn state(&self) -> &Arc<Mutex<SessionState>> {
        &self.state
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Time since streaming began. Zero before `connect`.
    pub async fn uptime(&self) -> Duration {
        self.bridge
            .started_at()
            .await
            .map_or(Duration::ZERO, |t| t.elapsed())
    }

    /// Connects and runs until stopped.
    pub async fn start(&self) -> Result<()> {
        let events = self.connect().await?;
        self.run(events).await;
        Ok(())
    }

    /// Everything that must happen before the first chat event is handled.
    pub async fn connect(&self) -> Result<mpsc::Receiver<ChatEvent>> {
        let bot_id = self
            .chat
            .bot_user_id()
            .await
            .context("Failed to resolve bot identity")?;
        tracing::info!("Connected as {}", bot_id);
        self.state.lock().await.bot_id = Some(bot_id);

        self.resolve_default_channel().await;
        self.bridge
            .set_observer(Arc::new(ChannelRelay::new(
                self.outbox.clone(),
                self.state.clone(),
            )))
            .await;

        let events = self
            .chat
            .connect()
            .await
            .context("Failed to open chat event stream")?;

        match self.bridge.restart().await {
            Ok(()) => {}
            Err(TransportError::Unauthorized(e)) => {
                self.stop().await;
                return Err(anyhow::anyhow!("Twitter rejected credentials: {e}"));
            }
            // Rate limits and transient errors leave the chat side running.
            Err(e) => tracing::warn!("Starting without a post stream: {}", e),
        }
        self.bridge.mark_started().await;
        Ok(events)
    }

    /// Consumes chat events until `stop()` is called or the transport closes.
    pub async fn run(&self, mut events: mpsc::Receiver<ChatEvent>) {
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        tracing::warn!("Chat event stream closed");
                        break;
                    }
                },
            }
        }
        self.stop().await;
    }

    pub async fn handle_event(&self, event: ChatEvent) {
        match event {
            ChatEvent::Message {
                channel,
                user,
                text,
            } => {
                let bot_id = {
                    let state = self.state.lock().await;
                    if user.as_deref().is_some_and(|u| state.is_bot(u)) {
                        return;
                    }
                    state.bot_id.clone()
                };
                let Some(bot_id) = bot_id else {
                    tracing::debug!("Ignoring message received before identity was resolved");
                    return;
                };
                if let Some(command) = parse_direct_mention(&text, &bot_id) {
                    self.dispatch(&command.text, &channel).await;
                }
            }
            ChatEvent::MemberJoined { channel, user } => {
                if self.state.lock().await.is_bot(&user) {
                    self.channel_joined(&channel).await;
                }
            }
        }
    }

    /// Greets a channel the bot was just added to.
    pub async fn channel_joined(&self, channel: &str) {
        tracing::info!("Joined channel {}", channel);
        self.outbox.send(channel, &self.config.slack.greeting).await;
    }

    /// Runs the handler for `command_text`. Returns false for unknown commands.
    pub async fn dispatch(&self, command_text: &str, channel: &str) -> bool {
        let Some((entry, arg)) = self.commands.resolve(command_text) else {
            tracing::debug!("Ignoring unknown command '{}'", command_text);
            return false;
        };
        tracing::info!(
            "Dispatching cmd='{}' args='{}' channel='{}'",
            entry.name,
            arg,
            channel
        );

        let result = match entry.kind {
            CommandKind::Help => commands::help::handle_help(self, channel).await,
            CommandKind::Ping => commands::misc::handle_ping(self, channel).await,
            CommandKind::Exit => commands::misc::handle_exit(self, channel).await,
            CommandKind::List => commands::filters::handle_list(self, channel).await,
            CommandKind::Add => commands::filters::handle_add(self, channel, arg).await,
            CommandKind::Del => commands::filters::handle_del(self, channel, arg).await,
            CommandKind::Clear => commands::filters::handle_clear(self, channel).await,
            CommandKind::Channel => commands::channel::handle_channel(self, channel, arg).await,
            CommandKind::Raise => commands::diagnostics::handle_raise(self, channel, arg).await,
        };
        if let Err(e) = result {
            tracing::error!("Command '{}' failed: {:#}", entry.name, e);
        }
        true
    }

    /// Cancels both streams. Only the first call does anything.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            tracing::debug!("Stop already requested");
            return;
        }
        tracing::info!("Stopping session");
        self.shutdown.cancel();
        self.bridge.shutdown().await;
        if let Err(e) = self.chat.disconnect().await {
            tracing::warn!("Chat disconnect failed: {}", e);
        }
    }

    async fn resolve_default_channel(&self) {
        let wanted = self.config.slack.default_channel.trim_start_matches('#');
        match self.chat.joined_channels().await {
            Ok(channels) => match channels.into_iter().find(|c| c.name == wanted || c.id == wanted) {
                Some(channel) => {
                    tracing::info!("Relaying tweets to #{}", channel.name);
                    self.state.lock().await.output_channel = Some(channel);
                }
                None => tracing::warn!(
                    "Default channel #{} is not joined; set one with `channel <name>`",
                    wanted
                ),
            },
            Err(e) => tracing::warn!("Failed to list channels: {}", e),
        }
    }
}

/// Installs the Ctrl-C hook once. The first signal stops the session; repeats are ignored.
pub fn spawn_signal_handler(session: Arc<BotSession>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut requested = false;
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Unable to listen for shutdown signal: {}", e);
                return;
            }
            if requested {
                tracing::warn!("Shutdown already in progress");
                continue;
            }
            requested = true;
            tracing::info!("Interrupt received");
            let session = session.clone();
            tokio::spawn(async move { session.stop().await });
        }
    })
}
