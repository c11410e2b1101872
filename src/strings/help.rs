//! # Help Text
//!
//! One-line descriptions for each built-in command.
//! Listed to the user by the `help` command.

pub const HELP: &str = "Shows this helpful command reference";
pub const PING: &str = "Show uptime of this bot";
pub const EXIT: &str = "Shutdown this bot";
pub const LIST: &str = "List current twitter filters and counters";
pub const ADD: &str = "Add a twitter keyword filter";
pub const DEL: &str = "Remove a twitter keyword filter";
pub const CLEAR: &str = "Remove all twitter keyword filters";
pub const CHANNEL: &str = "Set the channel matched tweets are posted to";
pub const RAISE: &str = "Manually test the error handler";
