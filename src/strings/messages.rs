//! # Messages
//!
//! Constant strings and format functions for replies posted to the chat.

use crate::domain::types::{ChannelInfo, TweetStats};

pub const SHUTDOWN: &str = "Shutting down...";
pub const ADD_USAGE: &str = "Usage: `add <keyword>`";
pub const DEL_USAGE: &str = "Usage: `del <keyword>`";
pub const FILTERS_CLEARED: &str = "Removed all keyword filters.";
pub const CHANNELS_UNAVAILABLE: &str = "Could not fetch the channel list, try again later.";

pub fn uptime(duration: &str) -> String {
    format!("Bot has been active for: {duration}")
}

pub fn keyword_added(keyword: &str) -> String {
    format!("Now tracking `{keyword}`.")
}

pub fn keyword_exists(keyword: &str) -> String {
    format!("Already tracking `{keyword}`.")
}

pub fn keyword_removed(keyword: &str) -> String {
    format!("Stopped tracking `{keyword}`.")
}

pub fn keyword_missing(keyword: &str) -> String {
    format!("`{keyword}` was not being tracked.")
}

pub fn restart_failed(err: &str) -> String {
    format!("Filters updated, but the twitter stream could not restart: {err}")
}

pub fn filter_list(stats: &TweetStats) -> String {
    if stats.filters.is_empty() {
        return format!(
            "No keyword filters set. Use `add <keyword>`.\nProcessed {} tweet(s), {:.2} per minute",
            stats.total_posts, stats.posts_per_minute
        );
    }
    let mut out = format!("Tracking {} keyword(s):\n```\n", stats.filters.len());
    for (keyword, count) in &stats.filters {
        out.push_str(&format!("{keyword}: {count}\n"));
    }
    out.push_str("```\n");
    out.push_str(&format!(
        "Processed {} tweet(s), {:.2} per minute",
        stats.total_posts, stats.posts_per_minute
    ));
    out
}

pub fn channel_set(channel: &ChannelInfo) -> String {
    format!("Posting matched tweets to #{}", channel.name)
}

pub fn channel_invalid(requested: &str, channels: &[ChannelInfo]) -> String {
    let names: Vec<String> = channels.iter().map(|c| format!("#{}", c.name)).collect();
    if names.is_empty() {
        return format!("`{requested}` is not a channel I am in, and I am not in any channel.");
    }
    format!(
        "`{requested}` is not a channel I am in. Valid channels: {}",
        names.join(", ")
    )
}

pub fn raise_invalid(requested: &str, kinds: &[String]) -> String {
    format!(
        "Unknown failure kind `{requested}`. Valid kinds: {}",
        kinds.join(", ")
    )
}

pub fn raise_done(kind: &str, err: &str) -> String {
    format!("Raised `{kind}` failure and logged it: {err}")
}
