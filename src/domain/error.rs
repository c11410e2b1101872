//! # Domain Errors
//!
//! Typed failures that callers branch on. Everything else travels as `anyhow::Error`.

use thiserror::Error;

use crate::domain::types::FailureKind;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("rate limited by upstream")]
    RateLimited,

    #[error("upstream rejected credentials: {0}")]
    Unauthorized(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected upstream response: {0}")]
    Protocol(String),

    #[error("post stream is shut down")]
    Closed,
}

/// Failures manufactured on purpose by the `raise` command.
#[derive(Error, Debug)]
pub enum DiagnosticError {
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse failure: {0}")]
    Parse(#[from] std::num::ParseIntError),

    #[error("utf-8 failure: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("json failure: {0}")]
    Json(#[from] serde_json::Error),

    #[error("task panicked: {0}")]
    Panic(String),
}

impl DiagnosticError {
    pub fn kind(&self) -> FailureKind {
        match self {
            DiagnosticError::Io(_) => FailureKind::Io,
            DiagnosticError::Parse(_) => FailureKind::Parse,
            DiagnosticError::Utf8(_) => FailureKind::Utf8,
            DiagnosticError::Json(_) => FailureKind::Json,
            DiagnosticError::Panic(_) => FailureKind::Panic,
        }
    }
}
