//! # Diagnostics Command
//!
//! Handles `raise <kind>`: manufactures one of the canned failures, logs it at error level
//! and carries on. Exists to exercise the logging path in a running bot.

use crate::application::session::BotSession;
use crate::domain::error::DiagnosticError;
use crate::domain::types::FailureKind;
use crate::strings::messages;
use anyhow::Result;
use std::io;
use tokio::task::JoinHandle;

pub async fn handle_raise(session: &BotSession, channel: &str, requested: &str) -> Result<()> {
    let allowed = &session.config().diagnostics.raise_kinds;
    let kind = requested
        .trim()
        .to_lowercase()
        .parse::<FailureKind>()
        .ok()
        .filter(|kind| allowed.contains(kind));

    let Some(kind) = kind else {
        let kinds: Vec<String> = allowed.iter().map(ToString::to_string).collect();
        session
            .outbox()
            .send(channel, &messages::raise_invalid(requested, &kinds))
            .await;
        return Ok(());
    };

    let reply = match manufacture(kind).await {
        Err(e) => {
            tracing::error!("Diagnostic {} failure raised on request: {}", e.kind(), e);
            messages::raise_done(&kind.to_string(), &e.to_string())
        }
        Ok(()) => {
            tracing::warn!("Diagnostic {} did not fail", kind);
            format!("`{kind}` did not fail")
        }
    };
    session.outbox().send(channel, &reply).await;
    Ok(())
}

/// Produces a real failure of the requested kind.
pub async fn manufacture(kind: FailureKind) -> Result<(), DiagnosticError> {
    match kind {
        FailureKind::Io => {
            return Err(io::Error::new(io::ErrorKind::NotFound, "diagnostic file is missing").into());
        }
        FailureKind::Parse => {
            "not-a-number".parse::<i64>()?;
        }
        FailureKind::Utf8 => {
            String::from_utf8(vec![0xff, 0xfe, 0xfd])?;
        }
        FailureKind::Json => {
            serde_json::from_str::<serde_json::Value>("{\"unterminated\": ")?;
        }
        FailureKind::Panic => {
            let task: JoinHandle<()> = tokio::spawn(async {
                panic!("diagnostic panic requested");
            });
            task.await
                .map_err(|e| DiagnosticError::Panic(e.to_string()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[tokio::test]
    async fn test_every_kind_fails_with_its_own_error() {
        for kind in FailureKind::iter() {
            let err = manufacture(kind).await.unwrap_err();
            assert_eq!(err.kind(), kind);
        }
    }

    #[test]
    fn test_kind_names() {
        assert_eq!("utf8".parse::<FailureKind>().unwrap(), FailureKind::Utf8);
        assert_eq!(FailureKind::Json.to_string(), "json");
        assert!("typeerror".parse::<FailureKind>().is_err());
    }
}
