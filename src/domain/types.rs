//! # Domain Types
//!
//! Common data structures and enums shared by the session, the bridge and the transports.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// A single post delivered by the stream transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub text: String,
    /// Set when the upstream marks the post as a share of another post.
    pub is_repost: bool,
}

impl Post {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_repost: false,
        }
    }

    pub fn repost(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_repost: true,
        }
    }
}

/// Events pushed by the stream transport into a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Post(Post),
    /// Upstream asked us to back off. Consumption stops.
    RateLimited,
    /// Any other upstream problem. Logged, consumption continues.
    Error(String),
}

/// Events pushed by the chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Message {
        channel: String,
        user: Option<String>,
        text: String,
    },
    MemberJoined {
        channel: String,
        user: String,
    },
}

/// A chat channel the bot is a member of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
}

impl ChannelInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Canned failures the `raise` command can manufacture.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FailureKind {
    Io,
    Parse,
    Utf8,
    Json,
    Panic,
}

/// Snapshot of the bridge counters.
#[derive(Debug, Clone, PartialEq)]
pub struct TweetStats {
    pub posts_per_minute: f64,
    pub filters: Vec<(String, u64)>,
    pub total_posts: u64,
}
