//! Command registry for REPL commands
//!
//! Commands are matched by prefix, longest first, so `midi connect` wins
//! over a shorter `midi` entry.

pub mod audio;
pub mod general;
pub mod midi;

use crate::player::Player;
use std::sync::Arc;

/// Result of executing a command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Command executed successfully, continue REPL
    Success,
    /// Command executed, show this message
    Message(String),
    /// Exit the REPL
    Exit,
    /// Not a command, play the line as MML
    NotACommand,
    Error(String),
    /// Watch a file and replay it on every change
    Watch(String),
    /// Stop watching a file
    Unwatch(String),
}

/// Context passed to command handlers
pub struct CommandContext {
    pub player: Arc<Player>,
}

impl CommandContext {
    pub fn new(player: Arc<Player>) -> Self {
        Self { player }
    }
}

/// A command handler function
pub type CommandHandler = fn(&str, &mut CommandContext) -> CommandResult;

/// Registry of available commands
pub struct CommandRegistry {
    /// Sorted by prefix length descending for longest-match-first lookup
    commands: Vec<(String, CommandHandler)>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    pub fn register(&mut self, prefix: &str, handler: CommandHandler) {
        self.commands.push((prefix.to_string(), handler));
        self.commands.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    /// Execute a command, returning NotACommand if no match found
    pub fn execute(&self, input: &str, ctx: &mut CommandContext) -> CommandResult {
        for (prefix, handler) in &self.commands {
            if input == prefix || input.starts_with(&format!("{} ", prefix)) {
                let args = input[prefix.len()..].trim();
                return handler(args, ctx);
            }
        }
        CommandResult::NotACommand
    }

    /// All registered command prefixes
    pub fn list_commands(&self) -> Vec<&str> {
        self.commands.iter().map(|(p, _)| p.as_str()).collect()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a registry holding every built-in command
pub fn create_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();

    registry.register("play", audio::cmd_play);
    registry.register("stop", audio::cmd_stop);
    registry.register("notes", audio::cmd_notes);
    registry.register("volume", audio::cmd_volume);
    registry.register("output", audio::cmd_output);

    registry.register("midi devices", midi::cmd_midi_devices);
    registry.register("midi connect", midi::cmd_midi_connect);
    registry.register("midi disconnect", midi::cmd_midi_disconnect);
    registry.register("midi channel", midi::cmd_midi_channel);
    registry.register("midi status", midi::cmd_midi_status);
    registry.register("midi panic", midi::cmd_midi_panic);

    registry.register("status", general::cmd_status);
    registry.register("help", general::cmd_help);
    registry.register("quit", general::cmd_quit);
    registry.register("exit", general::cmd_quit);
    registry.register("watch", general::cmd_watch);
    registry.register("unwatch", general::cmd_unwatch);

    registry
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::audio::timer::VirtualTimer;
    use crate::config::PlayerConfig;

    pub fn context() -> (Arc<VirtualTimer>, CommandContext) {
        let timer = Arc::new(VirtualTimer::new());
        let player = Player::with_timer(PlayerConfig::default(), timer.clone(), None).unwrap();
        (timer, CommandContext::new(Arc::new(player)))
    }
}
