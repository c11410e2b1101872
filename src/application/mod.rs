//! # Application Layer
//!
//! Bot behaviour: message parsing, command routing, the keyword filter store,
//! the stream bridge and the session that ties them to a chat transport.

pub mod bridge;
pub mod filters;
pub mod logging;
pub mod outbox;
pub mod parsing;
pub mod relay;
pub mod router;
pub mod session;
pub mod state;
pub mod utils;

#[cfg(test)]
pub mod testing;
