//! General REPL commands (help, quit, status, watch, unwatch)

use crate::commands::{CommandContext, CommandResult};
use colored::*;

/// Handle `help` command
pub fn cmd_help(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    print_help();
    CommandResult::Success
}

/// Handle `quit` or `exit` command
pub fn cmd_quit(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    CommandResult::Exit
}

/// Handle `status` command
pub fn cmd_status(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    let player = &ctx.player;
    let mut output = format!("{}\n", "🎵 Player Status:".bold());

    match player.scheduler().current() {
        Some(summary) => output.push_str(&format!(
            "  Playback: {} ({} notes, {} tracks, {:.1}s)\n",
            "playing".green().bold(),
            summary.notes,
            summary.tracks,
            summary.length_ms as f64 / 1000.0
        )),
        None => output.push_str(&format!("  Playback: {}\n", "idle".yellow())),
    }

    output.push_str(&format!("  Output: {}\n", player.output().to_string().cyan()));
    output.push_str(&format!("  Volume: {}%\n", player.volume()));
    match player.midi().connected_port() {
        Some(port) => output.push_str(&format!("  MIDI: {}\n", port.cyan())),
        None => output.push_str(&format!("  MIDI: {}\n", "not connected".dimmed())),
    }

    let stats = player.dispatcher().stats();
    output.push_str(&format!(
        "  Events delivered: {} ({} sessions finished)",
        stats.delivered(),
        stats.sessions_finished()
    ));

    CommandResult::Message(output)
}

/// Handle `watch <file>` command
pub fn cmd_watch(args: &str, _ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error("Usage: watch <file>".to_string());
    }
    CommandResult::Watch(args.to_string())
}

/// Handle `unwatch <file>` command
pub fn cmd_unwatch(args: &str, _ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error("Usage: unwatch <file>".to_string());
    }
    CommandResult::Unwatch(args.to_string())
}

fn print_help() {
    println!("{}", "🎵 MML Player Help".bold());
    println!("{}", "==================".bold());
    println!();
    println!("{}", "Notation:".green());
    println!("  {}   - Notes, with optional length (1, 2, 4, 8...)", "c d e f g a b".cyan());
    println!("  {}               - Rest", "r".cyan());
    println!("  {}       - Sharp / flat", "c+ c# d-".cyan());
    println!("  {}         - Dotted lengths (×1.5 per dot)", "c4. c4..".cyan());
    println!("  {}           - Tie into the next note", "c4&c4".cyan());
    println!("  {}   - Octave, tempo, default length, volume", "o4 t120 l8 v100".cyan());
    println!("  {}             - Octave up / down", "> <".cyan());
    println!("  {}               - Start a new track", ",".cyan());
    println!("  {}       - Comment to end of line", "# text".cyan());
    println!();
    println!("{}", "Playback:".green());
    println!("  {}       - Any other line is compiled and played", "<mml>".cyan());
    println!("  {}  - Play a score file", "play <file>".cyan());
    println!("  {}  - Replay a file whenever it changes", "watch <file>".cyan());
    println!("  {} - Stop watching a file", "unwatch <file>".cyan());
    println!("  {}  - Show compiled notes without playing", "notes <mml>".cyan());
    println!("  {}         - Stop playback", "stop".cyan());
    println!("  {}       - Show player status", "status".cyan());
    println!("  {}  - Set volume (0-100)", "volume [n]".cyan());
    println!(
        "  {}  - Choose output",
        "output [console|synth|midi]".cyan()
    );
    println!();
    println!("{}", "MIDI Commands:".green());
    println!("  {}       - List MIDI output ports", "midi devices".cyan());
    println!("  {} - Connect to MIDI port", "midi connect <port>".cyan());
    println!("  {}    - Disconnect MIDI", "midi disconnect".cyan());
    println!(
        "  {}     - Set channel (1-16 or 'auto')",
        "midi channel".cyan()
    );
    println!("  {}        - Show MIDI status", "midi status".cyan());
    println!("  {}         - All notes off (panic)", "midi panic".cyan());
    println!();
    println!("  {}              - Show this help", "help".bright_green());
    println!("  {}              - Exit the REPL", "quit".bright_red());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::context;

    #[test]
    fn test_watch_requires_path() {
        let (_timer, mut ctx) = context();
        assert!(matches!(cmd_watch("", &mut ctx), CommandResult::Error(_)));
        assert_eq!(
            cmd_watch("song.mml", &mut ctx),
            CommandResult::Watch("song.mml".to_string())
        );
    }

    #[test]
    fn test_unwatch_requires_path() {
        let registry = crate::commands::create_registry();
        let (_timer, mut ctx) = context();
        assert!(matches!(cmd_unwatch("", &mut ctx), CommandResult::Error(_)));
        // `unwatch` must not be swallowed by the shorter `watch` prefix
        assert_eq!(
            registry.execute("unwatch song.mml", &mut ctx),
            CommandResult::Unwatch("song.mml".to_string())
        );
    }

    #[test]
    fn test_status_reflects_playback() {
        colored::control::set_override(false);
        let (_timer, mut ctx) = context();
        match cmd_status("", &mut ctx) {
            CommandResult::Message(msg) => assert!(msg.contains("Playback: idle")),
            other => panic!("unexpected result: {:?}", other),
        }

        ctx.player.play_source("t120 c d, e").unwrap();
        match cmd_status("", &mut ctx) {
            CommandResult::Message(msg) => {
                assert!(msg.contains("playing (3 notes, 2 tracks"), "{}", msg);
                assert!(msg.contains("Output: console"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
