//! # Command Router
//!
//! The command table: every command name the bot answers to, its help text and the handler kind.
//! Resolution tries the full command text first, then the first word with the rest as argument.

use anyhow::{Result, bail};

use crate::application::parsing::split_command;
use crate::strings::help;

/// Built-in handlers. `exit` and `quit` share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Help,
    Ping,
    Exit,
    List,
    Add,
    Del,
    Clear,
    Channel,
    Raise,
}

#[derive(Debug, Clone)]
pub struct CommandEntry {
    pub name: String,
    pub help: String,
    pub kind: CommandKind,
}

#[derive(Debug, Default, Clone)]
pub struct CommandTable {
    entries: Vec<CommandEntry>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full command surface, in the order `help` lists it.
    pub fn builtin() -> Self {
        let builtins = [
            ("help", help::HELP, CommandKind::Help),
            ("ping", help::PING, CommandKind::Ping),
            ("exit", help::EXIT, CommandKind::Exit),
            ("quit", help::EXIT, CommandKind::Exit),
            ("list", help::LIST, CommandKind::List),
            ("add", help::ADD, CommandKind::Add),
            ("del", help::DEL, CommandKind::Del),
            ("clear", help::CLEAR, CommandKind::Clear),
            ("channel", help::CHANNEL, CommandKind::Channel),
            ("raise", help::RAISE, CommandKind::Raise),
        ];
        Self {
            entries: builtins
                .into_iter()
                .map(|(name, help, kind)| CommandEntry {
                    name: name.to_string(),
                    help: help.to_string(),
                    kind,
                })
                .collect(),
        }
    }

    /// Adds a command. A name can only be registered once.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        help: impl Into<String>,
        kind: CommandKind,
    ) -> Result<()> {
        let name = name.into();
        if self.get(&name).is_some() {
            bail!("command '{name}' is already registered");
        }
        self.entries.push(CommandEntry {
            name,
            help: help.into(),
            kind,
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CommandEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn entries(&self) -> &[CommandEntry] {
        &self.entries
    }

    /// Finds the handler for `text` and the argument to pass it.
    pub fn resolve<'t>(&self, text: &'t str) -> Option<(&CommandEntry, &'t str)> {
        if let Some(entry) = self.get(text) {
            return Some((entry, ""));
        }
        let (head, rest) = split_command(text);
        self.get(head).map(|entry| (entry, rest))
    }
}
