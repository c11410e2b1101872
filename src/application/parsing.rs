//! # Parsing Utils
//!
//! Extracts a direct-mention command (`<@BOTID> add foo`) from raw chat text.

use regex::Regex;
use std::sync::LazyLock;

// `.` stops at the first newline, so only the first line is the command.
static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<@(|[WU].+?)>(.*)").expect("mention pattern is valid"));

/// A command addressed to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Full trimmed command text, e.g. `add foo`.
    pub text: String,
    /// First word of `text`.
    pub name: String,
    /// Remainder after the first space, trimmed. May be empty.
    pub argument: String,
}

/// Returns the command when `raw` opens with a mention of `bot_id`.
pub fn parse_direct_mention(raw: &str, bot_id: &str) -> Option<ParsedCommand> {
    let caps = MENTION.captures(raw)?;
    let target = caps.get(1)?.as_str();
    if target != bot_id {
        return None;
    }

    let text = caps.get(2).map_or("", |m| m.as_str()).trim();
    let (name, argument) = split_command(text);
    Some(ParsedCommand {
        text: text.to_string(),
        name: name.to_string(),
        argument: argument.to_string(),
    })
}

/// Splits on the first space into head and trimmed rest.
pub fn split_command(text: &str) -> (&str, &str) {
    match text.split_once(' ') {
        Some((head, rest)) => (head, rest.trim()),
        None => (text, ""),
    }
}
