//! Playback commands (play, stop, notes, volume, output)

use crate::commands::{CommandContext, CommandResult};
use crate::config::{parse_volume, OutputMode};
use colored::*;
use mml_core::parser::{compile, render_diagnostic};
use std::path::Path;

/// Handle `play <file>`
pub fn cmd_play(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error("Usage: play <file>".to_string());
    }

    match ctx.player.play_file(Path::new(args)) {
        Ok(summary) => CommandResult::Message(
            format!(
                "▶ Playing {} ({} notes, {} tracks, {:.1}s)",
                args,
                summary.notes,
                summary.tracks,
                summary.length_ms as f64 / 1000.0
            )
            .bright_green()
            .to_string(),
        ),
        Err(e) => CommandResult::Error(format!("{:#}", e)),
    }
}

/// Handle `stop`
pub fn cmd_stop(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    if ctx.player.stop() {
        CommandResult::Message("⏹ Stopped".yellow().to_string())
    } else {
        CommandResult::Message("Nothing is playing".dimmed().to_string())
    }
}

/// Handle `notes <mml>`: compile and list the notes without playing them
pub fn cmd_notes(args: &str, _ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error("Usage: notes <mml>".to_string());
    }

    match compile(args) {
        Ok(notes) if notes.is_empty() => {
            CommandResult::Message("No notes".dimmed().to_string())
        }
        Ok(notes) => {
            let mut output = format!(
                "{}\n",
                format!(
                    "{:>5}  {:<8} {:>5} {:>5} {:>4} {:>7} {:>7}",
                    "at", "clause", "track", "pitch", "vol", "start", "length"
                )
                .bold()
            );
            for note in &notes {
                output.push_str(&format!(
                    "{:>5}  {} {:>5} {:>5} {:>4} {:>7} {:>7}\n",
                    note.found_at,
                    format!("{:<8}", note.clause.trim()).cyan(),
                    note.track,
                    note.pitch,
                    note.volume,
                    note.start_time,
                    note.duration
                ));
            }
            output.push_str(&format!("{} notes", notes.len()));
            CommandResult::Message(output)
        }
        Err(e) => CommandResult::Error(format!("\n{}", render_diagnostic(args, &e))),
    }
}

/// Handle `volume [0-100]`
pub fn cmd_volume(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Message(format!("🔊 Volume: {}%", ctx.player.volume()));
    }

    match parse_volume(args) {
        Ok(volume) => {
            ctx.player.set_volume(volume);
            CommandResult::Message(
                format!("🔊 Volume set to {}%", volume)
                    .bright_green()
                    .to_string(),
            )
        }
        Err(e) => CommandResult::Error(e.to_string()),
    }
}

/// Handle `output [console|synth|midi]`
pub fn cmd_output(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Message(format!(
            "🔊 Output: {}",
            ctx.player.output().to_string().cyan()
        ));
    }

    let mode: OutputMode = match args.parse() {
        Ok(mode) => mode,
        Err(e) => return CommandResult::Error(e.to_string()),
    };

    match ctx.player.set_output(mode) {
        Ok(()) => CommandResult::Message(
            format!("🔊 Output set to {}", mode).bright_green().to_string(),
        ),
        Err(e) => CommandResult::Error(format!("{:#}", e)),
    }
}
