//! MIDI REPL commands

use crate::audio::midi::{MidiChannelMode, MidiOutputHandle};
use crate::commands::{CommandContext, CommandResult};
use colored::*;

/// Handle `midi devices` - list available MIDI output ports
pub fn cmd_midi_devices(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    match MidiOutputHandle::list_ports() {
        Ok(ports) if ports.is_empty() => CommandResult::Message(
            "No MIDI output ports found. Make sure a MIDI device or virtual port is connected."
                .yellow()
                .to_string(),
        ),
        Ok(ports) => {
            let mut output = format!("{}\n", "🎹 Available MIDI Output Ports:".bold());
            for (i, port) in ports.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, port.cyan()));
            }
            output.push_str(&format!(
                "\n{} {}",
                "Use".dimmed(),
                "midi connect <port name>".green()
            ));
            CommandResult::Message(output)
        }
        Err(e) => CommandResult::Error(format!("Failed to list MIDI ports: {}", e)),
    }
}

/// Handle `midi connect <port>`
pub fn cmd_midi_connect(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error(
            "Usage: midi connect <port name>\nUse 'midi devices' to see available ports"
                .to_string(),
        );
    }

    match ctx.player.connect_midi(args) {
        Ok(name) => CommandResult::Message(format!("🎹 Connected to MIDI port: {}", name.green())),
        Err(e) => CommandResult::Error(format!("Failed to connect to '{}': {}", args, e)),
    }
}

/// Handle `midi disconnect`
pub fn cmd_midi_disconnect(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    match ctx.player.disconnect_midi() {
        Ok(()) => CommandResult::Message("🎹 Disconnected from MIDI".to_string()),
        Err(e) => CommandResult::Error(format!("Failed to disconnect: {}", e)),
    }
}

/// Handle `midi channel [1-16|auto]`
pub fn cmd_midi_channel(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let handle = ctx.player.midi();

    if args.is_empty() {
        return CommandResult::Message(format!(
            "🎹 Current MIDI channel mode: {}",
            handle.channel_mode()
        ));
    }

    let channel_arg = args.to_lowercase();
    if matches!(channel_arg.as_str(), "auto" | "per-track" | "pertrack") {
        handle.set_channel_mode(MidiChannelMode::PerTrack);
        return CommandResult::Message(
            "🎹 MIDI channel mode: Per-track (Track 1→Ch 1, Track 2→Ch 2, etc.)"
                .green()
                .to_string(),
        );
    }

    match channel_arg.parse::<u8>() {
        Ok(ch) if (1..=16).contains(&ch) => {
            handle.set_channel_mode(MidiChannelMode::Mono(ch - 1));
            CommandResult::Message(
                format!("🎹 MIDI channel mode: Mono (all tracks→Channel {})", ch)
                    .green()
                    .to_string(),
            )
        }
        Ok(_) => CommandResult::Error(
            "Channel must be 1-16, or 'auto' for per-track mode".to_string(),
        ),
        Err(_) => CommandResult::Error(
            "Usage: midi channel <1-16|auto>\n  1-16: Send all tracks to this channel\n  auto: Each track uses its own channel"
                .to_string(),
        ),
    }
}

/// Handle `midi status`
pub fn cmd_midi_status(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    let handle = ctx.player.midi();
    let mut output = format!("{}\n", "🎹 MIDI Status:".bold());

    match handle.connected_port() {
        Some(name) => {
            output.push_str(&format!("  Status: {}\n", "Connected".green().bold()));
            output.push_str(&format!("  Port: {}\n", name.cyan()));
        }
        None => output.push_str(&format!("  Status: {}\n", "Not connected".yellow())),
    }
    output.push_str(&format!("  Channel mode: {}\n", handle.channel_mode()));
    output.push_str(&format!("  Sounding notes: {}", handle.active_count()));

    CommandResult::Message(output)
}

/// Handle `midi panic` - All Notes Off on every channel
pub fn cmd_midi_panic(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    match ctx.player.midi().panic_all() {
        Ok(()) => CommandResult::Message(
            "🎹 MIDI Panic: All Notes Off sent to all channels"
                .yellow()
                .to_string(),
        ),
        Err(e) => CommandResult::Error(format!("Failed to send MIDI panic: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::context;

    #[test]
    fn test_midi_channel_modes() {
        let (_timer, mut ctx) = context();
        assert!(matches!(cmd_midi_channel("10", &mut ctx), CommandResult::Message(_)));
        assert_eq!(ctx.player.midi().channel_mode(), MidiChannelMode::Mono(9));

        assert!(matches!(cmd_midi_channel("auto", &mut ctx), CommandResult::Message(_)));
        assert_eq!(ctx.player.midi().channel_mode(), MidiChannelMode::PerTrack);

        assert!(matches!(cmd_midi_channel("0", &mut ctx), CommandResult::Error(_)));
        assert!(matches!(cmd_midi_channel("17", &mut ctx), CommandResult::Error(_)));
        assert!(matches!(cmd_midi_channel("drums", &mut ctx), CommandResult::Error(_)));
    }

    #[test]
    fn test_midi_status_when_disconnected() {
        colored::control::set_override(false);
        let (_timer, mut ctx) = context();
        match cmd_midi_status("", &mut ctx) {
            CommandResult::Message(msg) => {
                assert!(msg.contains("Not connected"));
                assert!(msg.contains("per-track"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_midi_connect_requires_name() {
        let (_timer, mut ctx) = context();
        assert!(matches!(cmd_midi_connect("", &mut ctx), CommandResult::Error(_)));
    }
}
