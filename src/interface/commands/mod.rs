//! # Command Handlers
//!
//! Contains specific handler functions for each supported command (e.g., help, add, channel).
//! These handlers are invoked by the session's dispatcher.

pub mod channel;
pub mod diagnostics;
pub mod filters;
pub mod help;
pub mod misc;
