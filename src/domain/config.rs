//! # Configuration
//!
//! Loads the optional settings file (`data/config.yaml`) and the secrets from the environment.
//! Every setting has a default, so a missing file is not an error. Secrets are never read from the file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;

use crate::domain::types::FailureKind;
use strum::IntoEnumIterator;

/// Main application configuration structure.
/// Matches the layout of `data/config.yaml`.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub twitter: TwitterConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SlackConfig {
    #[serde(default = "default_slack_api_base")]
    pub api_base: String,
    /// Channel name relayed posts go to until changed with `channel`.
    #[serde(default = "default_channel")]
    pub default_channel: String,
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default = "default_send_interval_ms")]
    pub min_send_interval_ms: u64,
}

impl SlackConfig {
    pub fn min_send_interval(&self) -> Duration {
        Duration::from_millis(self.min_send_interval_ms)
    }
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            api_base: default_slack_api_base(),
            default_channel: default_channel(),
            greeting: default_greeting(),
            min_send_interval_ms: default_send_interval_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TwitterConfig {
    #[serde(default = "default_stream_url")]
    pub stream_url: String,
    #[serde(default)]
    pub initial_filters: Vec<String>,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            stream_url: default_stream_url(),
            initial_filters: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub directory: String,
    #[serde(default = "default_log_file")]
    pub file_name: String,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_backups")]
    pub backups: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_log_dir(),
            file_name: default_log_file(),
            max_bytes: default_max_bytes(),
            backups: default_backups(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiagnosticsConfig {
    /// Failure kinds `raise` accepts.
    #[serde(default = "default_raise_kinds")]
    pub raise_kinds: Vec<FailureKind>,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            raise_kinds: default_raise_kinds(),
        }
    }
}

fn default_slack_api_base() -> String {
    "https://slack.com/api".to_string()
}
fn default_channel() -> String {
    "general".to_string()
}
fn default_greeting() -> String {
    "Hello! Mention me with `help` to see what I can do.".to_string()
}
fn default_send_interval_ms() -> u64 {
    1000
}
fn default_stream_url() -> String {
    "https://stream.twitter.com/1.1/statuses/filter.json".to_string()
}
fn default_log_dir() -> String {
    "data".to_string()
}
fn default_log_file() -> String {
    "slacktweet.log".to_string()
}
fn default_max_bytes() -> u64 {
    10 * 1024 * 1024
}
fn default_backups() -> usize {
    5
}
fn default_raise_kinds() -> Vec<FailureKind> {
    FailureKind::iter().collect()
}

impl AppConfig {
    /// Reads the settings file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty file deserializes to unit, not a mapping.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}

/// OAuth 1.0a user-context credentials for the post stream.
#[derive(Clone)]
pub struct TwitterCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_secret: String,
}

/// Secrets read from the environment at startup.
#[derive(Clone)]
pub struct Credentials {
    pub slack_bot_token: String,
    pub slack_app_token: String,
    pub twitter: TwitterCredentials,
}

impl Credentials {
    /// Loads `.env` (if present) and then reads every secret.
    pub fn from_env() -> Result<Self> {
        tracing::debug!("Loading credentials from environment");
        dotenvy::dotenv().ok();

        let creds = Self {
            slack_bot_token: require("SLACK_BOT_TOKEN")?,
            slack_app_token: require("SLACK_APP_TOKEN")?,
            twitter: TwitterCredentials::from_env()?,
        };
        tracing::debug!(
            "Slack bot token length: {} characters",
            creds.slack_bot_token.len()
        );
        Ok(creds)
    }
}

impl TwitterCredentials {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Self {
            consumer_key: require("TWITTER_API_KEY")?,
            consumer_secret: require("TWITTER_API_SECRET")?,
            access_token: require("TWITTER_ACCESS_TOKEN")?,
            access_secret: require("TWITTER_ACCESS_SECRET")?,
        })
    }
}

fn require(name: &str) -> Result<String> {
    env::var(name).map_err(|e| {
        tracing::error!("Failed to load {} from environment: {}", name, e);
        anyhow::anyhow!("{name}: {e}")
    })
}
