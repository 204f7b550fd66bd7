//! mml-player CLI

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;
use mml_core::parser::{compile, render_diagnostic};
use mml_core::types::end_time;
use mml_player::config::{parse_volume, OutputMode, PlayerConfig};
use mml_player::player::Player;
use mml_player::repl;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "mml-player")]
#[command(about = "Compile and play Music Macro Language scores", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args, Clone, Default)]
struct OutputArgs {
    /// Output: console, synth or midi
    #[arg(short, long, global = true, value_parser = parse_output)]
    output: Option<OutputMode>,

    /// MIDI port to connect to (partial name match)
    #[arg(long, global = true)]
    midi_port: Option<String>,

    /// Master volume 0-100
    #[arg(long, global = true, value_parser = parse_volume_arg)]
    volume: Option<u8>,
}

/// Score given as a file path or inline with `-e`
#[derive(Args)]
struct Source {
    /// Score file
    #[arg(required_unless_present = "expr", conflicts_with = "expr")]
    file: Option<String>,

    /// Inline MML text
    #[arg(short, long)]
    expr: Option<String>,
}

impl Source {
    fn read(&self) -> Result<String> {
        match (&self.expr, &self.file) {
            (Some(text), _) => Ok(text.clone()),
            (None, Some(path)) => {
                std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))
            }
            (None, None) => Err(anyhow!("Provide a score file or -e <text>")),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive REPL (default)
    Repl,

    /// Play a score and exit when it ends
    Play {
        #[command(flatten)]
        source: Source,

        /// Replay the file whenever it changes
        #[arg(short, long, requires = "file")]
        watch: bool,
    },

    /// Compile a score and print its notes
    Compile {
        #[command(flatten)]
        source: Source,

        /// Print notes as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_output(s: &str) -> Result<OutputMode, String> {
    s.parse().map_err(|e: anyhow::Error| e.to_string())
}

fn parse_volume_arg(s: &str) -> Result<u8, String> {
    parse_volume(s).map_err(|e| e.to_string())
}

fn build_config(args: &OutputArgs) -> Result<PlayerConfig> {
    let mut config = PlayerConfig::from_env()?;
    if let Some(output) = args.output {
        config.output = output;
    }
    if let Some(port) = &args.midi_port {
        config.midi_port = Some(port.clone());
    }
    if let Some(volume) = args.volume {
        config.volume = volume;
    }
    Ok(config)
}

fn run_compile(source: &Source, json: bool) -> Result<()> {
    let text = source.read()?;
    let notes = compile(&text).map_err(|e| anyhow!("{}", render_diagnostic(&text, &e)))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&notes)?);
        return Ok(());
    }

    for note in &notes {
        println!("{}", note);
    }
    println!(
        "{}",
        format!("{} notes, {} ms", notes.len(), end_time(&notes)).dimmed()
    );
    Ok(())
}

fn run_play(player: Arc<Player>, source: &Source, watch: bool) -> Result<()> {
    if watch {
        if let Some(path) = &source.file {
            return repl::watch_file(player, path);
        }
    }

    let text = source.read()?;
    let summary = player.play_source(&text)?;
    log::info!(
        "playing {} notes on {} tracks ({} ms)",
        summary.notes,
        summary.tracks,
        summary.length_ms
    );

    while player.is_playing() {
        std::thread::sleep(Duration::from_millis(20));
    }
    // Let the synth release tail ring out
    if player.output() == OutputMode::Synth {
        std::thread::sleep(Duration::from_millis(500));
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if let Some(Commands::Compile { source, json }) = &cli.command {
        return run_compile(source, *json);
    }

    let player = Arc::new(Player::new(build_config(&cli.output)?)?);

    match cli.command {
        Some(Commands::Play { source, watch }) => run_play(player, &source, watch),
        Some(Commands::Compile { .. }) => Ok(()),
        Some(Commands::Repl) | None => repl::start(player),
    }
}
