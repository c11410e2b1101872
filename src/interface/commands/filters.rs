//! # Filter Commands
//!
//! Handles `list`, `add`, `del` and `clear`.
//! Every mutation is followed by exactly one stream restart, awaited before replying,
//! so the new keyword set is live by the time the user sees the answer.

use crate::application::session::BotSession;
use crate::strings::messages;
use anyhow::Result;

pub async fn handle_list(session: &BotSession, channel: &str) -> Result<()> {
    let stats = session.bridge().stats().await;
    session
        .outbox()
        .send(channel, &messages::filter_list(&stats))
        .await;
    Ok(())
}

pub async fn handle_add(session: &BotSession, channel: &str, keyword: &str) -> Result<()> {
    if keyword.is_empty() {
        session.outbox().send(channel, messages::ADD_USAGE).await;
        return Ok(());
    }

    let added = session.bridge().add_keyword(keyword).await;
    let reply = if added {
        messages::keyword_added(keyword)
    } else {
        messages::keyword_exists(keyword)
    };
    restart_and_reply(session, channel, reply).await
}

pub async fn handle_del(session: &BotSession, channel: &str, keyword: &str) -> Result<()> {
    if keyword.is_empty() {
        session.outbox().send(channel, messages::DEL_USAGE).await;
        return Ok(());
    }

    let removed = session.bridge().remove_keyword(keyword).await;
    let reply = if removed {
        messages::keyword_removed(keyword)
    } else {
        messages::keyword_missing(keyword)
    };
    restart_and_reply(session, channel, reply).await
}

pub async fn handle_clear(session: &BotSession, channel: &str) -> Result<()> {
    session.bridge().clear_keywords().await;
    restart_and_reply(session, channel, messages::FILTERS_CLEARED.to_string()).await
}

async fn restart_and_reply(session: &BotSession, channel: &str, reply: String) -> Result<()> {
    let reply = match session.bridge().restart().await {
        Ok(()) => reply,
        Err(e) => messages::restart_failed(&e.to_string()),
    };
    session.outbox().send(channel, &reply).await;
    Ok(())
}
