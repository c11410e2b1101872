//! # Infrastructure Layer
//!
//! Handles interactions with external systems and services.
//! Implements the traits defined in the Domain layer (`ChatTransport`, `StreamTransport`).

pub mod oauth;
pub mod slack;
pub mod twitter;
