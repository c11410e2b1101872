//! # Miscellaneous Commands
//!
//! Handles `ping` and `exit`/`quit`.

use crate::application::session::BotSession;
use crate::application::utils::format_duration;
use crate::strings::messages;
use anyhow::Result;

pub async fn handle_ping(session: &BotSession, channel: &str) -> Result<()> {
    let uptime = format_duration(session.uptime().await);
    session
        .outbox()
        .send(channel, &messages::uptime(&uptime))
        .await;
    Ok(())
}

pub async fn handle_exit(session: &BotSession, channel: &str) -> Result<()> {
    if session.is_stopped() {
        return Ok(());
    }
    session.outbox().send(channel, messages::SHUTDOWN).await;
    session.stop().await;
    Ok(())
}
