//! # Help Command
//!
//! Handles the `help` command.
//! Lists every registered command with its help text.

use crate::application::session::BotSession;
use anyhow::Result;

pub async fn handle_help(session: &BotSession, channel: &str) -> Result<()> {
    let mut help = String::from("```\n");
    for entry in session.commands().entries() {
        help.push_str(&format!("{}: {}\n", entry.name, entry.help));
    }
    help.push_str("```");

    session.outbox().send(channel, &help).await;
    Ok(())
}
