//! # Domain Layer
//!
//! Core definitions, types, and traits that define the business domain of the bot.
//! Independent of the concrete chat and stream platforms, serving as the contract for other layers.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;
