//! # Main Entry Point
//!
//! Wires the layers together:
//! - Domain: Configuration, Types, Traits
//! - Infrastructure: Slack, Twitter
//! - Application: Session, Bridge, Router, Logging
//! - Interface: Command Handlers
//!

mod application;
mod domain;
mod infrastructure;
mod interface;
mod strings;

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::application::bridge::StreamBridge;
use crate::application::filters::KeywordFilters;
use crate::application::logging::{self, LogLevel};
use crate::application::session::{BotSession, spawn_signal_handler};
use crate::application::utils::format_duration;
use crate::domain::config::{AppConfig, Credentials, TwitterCredentials};
use crate::domain::error::TransportError;
use crate::infrastructure::slack::SlackTransport;
use crate::infrastructure::twitter::TwitterStream;

const APP_NAME: &str = "slacktweet";
const DRAIN_INTERVAL: Duration = Duration::from_secs(5);

/// Relays keyword-matched tweets into Slack.
#[derive(Parser, Debug)]
#[command(name = APP_NAME, version, about)]
struct Cli {
    /// Logging verbosity
    #[arg(short, long, value_enum)]
    log_level: LogLevel,

    /// YAML settings file. Missing file means defaults.
    #[arg(short, long, default_value = "data/config.yaml")]
    config: PathBuf,

    /// Run the tweet stream without Slack and log matches
    #[arg(long)]
    stream_only: bool,

    /// Extra keyword to track from startup (repeatable)
    #[arg(short, long = "track", value_name = "KEYWORD")]
    track: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Configuration
    let mut config = AppConfig::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    for keyword in cli.track {
        if !config.twitter.initial_filters.contains(&keyword) {
            config.twitter.initial_filters.push(keyword);
        }
    }

    // 2. Logging
    let _guard = logging::init(cli.log_level, &config.logging)?;
    let started = Instant::now();
    let started_on = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    tracing::info!("{}", strings::logs::started_banner(APP_NAME, &started_on));

    // 3. Run
    let result = if cli.stream_only {
        run_stream_only(config).await
    } else {
        run_bot(config).await
    };

    if let Err(e) = &result {
        tracing::error!("Fatal: {:#}", e);
    }
    tracing::info!(
        "{}",
        strings::logs::stopped_banner(APP_NAME, &format_duration(started.elapsed()))
    );
    result
}

async fn run_bot(config: AppConfig) -> Result<()> {
    let creds = Credentials::from_env().context("Missing credentials")?;
    let chat = Arc::new(SlackTransport::new(
        &config.slack.api_base,
        &creds.slack_app_token,
        &creds.slack_bot_token,
    )?);
    let stream = Arc::new(TwitterStream::new(&config.twitter.stream_url, creds.twitter)?);

    let session = Arc::new(BotSession::new(config, chat, stream));
    let signals = spawn_signal_handler(session.clone());

    let result = session.start().await;
    if result.is_err() {
        session.stop().await;
    }
    signals.abort();
    result
}

/// Streams without chat: matches are buffered and logged until Ctrl-C.
async fn run_stream_only(config: AppConfig) -> Result<()> {
    let creds = TwitterCredentials::from_env().context("Missing Twitter credentials")?;
    let stream = Arc::new(TwitterStream::new(&config.twitter.stream_url, creds)?);
    let bridge = StreamBridge::new(
        stream,
        KeywordFilters::from_keywords(config.twitter.initial_filters.iter().cloned()),
    );

    match bridge.restart().await {
        Ok(()) => {}
        Err(TransportError::Unauthorized(e)) => bail!("Twitter rejected credentials: {e}"),
        Err(e) => tracing::warn!("Starting without a post stream: {}", e),
    }
    bridge.mark_started().await;

    let mut ticker = tokio::time::interval(DRAIN_INTERVAL);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupt received");
                break;
            }
            _ = ticker.tick() => log_matches(&bridge).await,
        }
    }

    bridge.shutdown().await;
    log_matches(&bridge).await;
    tracing::info!("{}", strings::messages::filter_list(&bridge.stats().await));
    Ok(())
}

async fn log_matches(bridge: &StreamBridge) {
    for text in bridge.drain_buffered().await {
        tracing::info!("Matched tweet: {}", text);
    }
}
