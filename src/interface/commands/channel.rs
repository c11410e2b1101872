//! # Channel Command
//!
//! Handles `channel <name>`: picks the channel matched tweets are relayed to.
//! Only channels the bot is currently a member of are accepted.

use crate::application::session::BotSession;
use crate::strings::messages;
use anyhow::Result;

pub async fn handle_channel(session: &BotSession, channel: &str, requested: &str) -> Result<()> {
    let wanted = requested.trim().trim_start_matches('#');

    let channels = match session.chat().joined_channels().await {
        Ok(channels) => channels,
        Err(e) => {
            tracing::warn!("Failed to list channels: {}", e);
            session
                .outbox()
                .send(channel, messages::CHANNELS_UNAVAILABLE)
                .await;
            return Ok(());
        }
    };

    let found = channels
        .iter()
        .find(|c| !wanted.is_empty() && (c.name == wanted || c.id == wanted));
    let reply = match found {
        Some(target) => {
            session.state().lock().await.output_channel = Some(target.clone());
            tracing::info!("Output channel set to #{}", target.name);
            messages::channel_set(target)
        }
        None => messages::channel_invalid(requested, &channels),
    };
    session.outbox().send(channel, &reply).await;
    Ok(())
}
