//! REPL (Read-Eval-Print Loop) for playing MML interactively
//!
//! Input is read on its own thread so that file-change notifications can be
//! handled while the prompt is waiting.

use crate::commands::{create_registry, CommandContext, CommandRegistry, CommandResult};
use crate::player::Player;
use crate::repl::watcher::FileWatcher;
use anyhow::{anyhow, Result};
use colored::*;
use crossbeam_channel::{unbounded, Receiver, Sender};
use notify::Event;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

pub mod watcher;

/// Interactive REPL
pub struct Repl {
    editor: Option<DefaultEditor>,
    player: Arc<Player>,
    registry: CommandRegistry,
    tx_input: Sender<Result<String, ReadlineError>>,
    rx_input: Receiver<Result<String, ReadlineError>>,
    tx_watcher: Sender<notify::Result<Event>>,
    rx_watcher: Receiver<notify::Result<Event>>,
    watcher: Option<FileWatcher>,
}

impl Repl {
    pub fn new(player: Arc<Player>) -> Result<Self> {
        let editor = DefaultEditor::new().map_err(|e| anyhow!("Failed to initialize REPL: {}", e))?;
        let (tx_input, rx_input) = unbounded();
        let (tx_watcher, rx_watcher) = unbounded();

        Ok(Repl {
            editor: Some(editor),
            player,
            registry: create_registry(),
            tx_input,
            rx_input,
            tx_watcher,
            rx_watcher,
            watcher: None,
        })
    }

    /// Start watching `path`, replaying it on every change
    pub fn watch(&mut self, path: &str) -> Result<()> {
        if self.watcher.is_none() {
            let watcher = FileWatcher::new(self.tx_watcher.clone())
                .map_err(|e| anyhow!("Failed to create watcher: {}", e))?;
            self.watcher = Some(watcher);
        }

        if let Some(w) = &mut self.watcher {
            let file = w
                .watch(path)
                .map_err(|e| anyhow!("Failed to watch {}: {}", path, e))?;
            println!(
                "{} Watching {} for changes...",
                "👀".bright_cyan(),
                file.display().to_string().bright_green()
            );
            self.replay(&file);
        }
        Ok(())
    }

    /// Stop replaying `path` on change
    pub fn unwatch(&mut self, path: &str) -> Result<()> {
        let w = self
            .watcher
            .as_mut()
            .ok_or_else(|| anyhow!("Not watching any files"))?;
        w.unwatch(path)
            .map_err(|e| anyhow!("Failed to unwatch {}: {}", path, e))?;
        println!(
            "{} Stopped watching {} ({} still watched)",
            "✓".bright_green(),
            path,
            w.watched().count()
        );
        Ok(())
    }

    fn play_line(&self, line: &str) {
        match self.player.play_source(line) {
            Ok(summary) => log::debug!(
                "playing {} notes on {} tracks",
                summary.notes,
                summary.tracks
            ),
            Err(e) => println!("{}", e),
        }
    }

    fn replay(&self, path: &Path) {
        match self.player.play_file(path) {
            Ok(summary) => println!(
                "{} Reloaded {} ({} notes)",
                "✓".bright_green(),
                path.display(),
                summary.notes
            ),
            Err(e) => println!("{:#}", e),
        }
    }

    fn handle_watch_event(&mut self, event: Event) {
        let Some(w) = &mut self.watcher else {
            return;
        };
        for path in w.files_to_reload(&event, Instant::now()) {
            println!("{} File changed: {}", "⚡".bright_yellow(), path.display());
            self.replay(&path);
        }
    }

    /// Returns false when the REPL should exit
    fn handle_line(&mut self, line: &str, ctx: &mut CommandContext) -> bool {
        match self.registry.execute(line, ctx) {
            CommandResult::Success => {}
            CommandResult::Message(msg) => println!("{}", msg),
            CommandResult::Exit => return false,
            CommandResult::Error(e) => {
                println!("{} {}", "Error:".bright_red().bold(), e.red())
            }
            CommandResult::Watch(path) => {
                if let Err(e) = self.watch(&path) {
                    println!("{} {}", "Error:".bright_red().bold(), e.to_string().red());
                }
            }
            CommandResult::Unwatch(path) => {
                if let Err(e) = self.unwatch(&path) {
                    println!("{} {}", "Error:".bright_red().bold(), e.to_string().red());
                }
            }
            CommandResult::NotACommand => self.play_line(line),
        }
        true
    }

    /// Start the REPL loop
    pub fn run(&mut self) -> Result<()> {
        println!(
            "{} {}",
            "🎵".bright_yellow(),
            "MML Player".bright_cyan().bold()
        );
        println!(
            "Type notation like: {}, {}",
            "t120 l8 c d e f g".cyan(),
            "o4 c2 e2, o3 c1".cyan()
        );
        println!(
            "Type '{}' for more information, '{}' or {} to exit.\n",
            "help".bright_green(),
            "quit".bright_red(),
            "Ctrl+C".bright_red()
        );

        let mut editor = self
            .editor
            .take()
            .ok_or_else(|| anyhow!("REPL is already running"))?;
        let tx_input = self.tx_input.clone();

        thread::spawn(move || loop {
            let prompt = format!("{} ", "mml>".bright_magenta().bold());
            match editor.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim().to_string();
                    if !line.is_empty() {
                        let _ = editor.add_history_entry(&line);
                    }
                    if tx_input.send(Ok(line)).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    let _ = tx_input.send(Err(err));
                    break;
                }
            }
        });

        let mut ctx = CommandContext::new(self.player.clone());
        let rx_input = self.rx_input.clone();
        let rx_watcher = self.rx_watcher.clone();

        loop {
            crossbeam_channel::select! {
                recv(rx_input) -> msg => match msg {
                    Ok(Ok(line)) => {
                        if line.is_empty() {
                            continue;
                        }
                        if !self.handle_line(&line, &mut ctx) {
                            break;
                        }
                    }
                    Ok(Err(ReadlineError::Interrupted)) | Ok(Err(ReadlineError::Eof)) => break,
                    Ok(Err(err)) => {
                        println!(
                            "{} {}",
                            "Error reading input:".bright_red().bold(),
                            err.to_string().red()
                        );
                        break;
                    }
                    Err(_) => break,
                },
                recv(rx_watcher) -> msg => match msg {
                    Ok(Ok(event)) => self.handle_watch_event(event),
                    Ok(Err(e)) => println!("{} Watch error: {}", "Error:".red(), e),
                    Err(_) => break,
                },
            }
        }

        self.player.stop();
        println!("{} 🎵", "Goodbye!".bright_cyan());
        Ok(())
    }
}

/// Run the REPL until the user quits
pub fn start(player: Arc<Player>) -> Result<()> {
    Repl::new(player)?.run()
}

/// Play one file and keep replaying it whenever it changes, until Ctrl+C
/// closes the process
pub fn watch_file(player: Arc<Player>, path: &str) -> Result<()> {
    let (tx, rx) = unbounded();
    let mut watcher = FileWatcher::new(tx).map_err(|e| anyhow!("Failed to create watcher: {}", e))?;
    let file = watcher
        .watch(path)
        .map_err(|e| anyhow!("Failed to watch {}: {}", path, e))?;

    player.play_file(&file)?;
    println!(
        "{} Watching {} for changes (Ctrl+C to quit)...",
        "👀".bright_cyan(),
        file.display().to_string().bright_green()
    );

    for res in rx {
        match res {
            Ok(event) => {
                for changed in watcher.files_to_reload(&event, Instant::now()) {
                    println!("{} File changed: {}", "⚡".bright_yellow(), changed.display());
                    if let Err(e) = player.play_file(&changed) {
                        println!("{:#}", e);
                    }
                }
            }
            Err(e) => println!("{} Watch error: {}", "Error:".red(), e),
        }
    }
    Ok(())
}
