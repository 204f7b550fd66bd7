//! # mml-player
//!
//! Plays Music Macro Language scores compiled by [`mml_core`]. Compiled notes
//! are handed to a [`Scheduler`](audio::scheduler::Scheduler), which turns
//! them into timed note-on / note-off / end events on a background timer.
//! An event dispatcher forwards those events to the chosen output.
//!
//! ## Modules
//!
//! - `audio`: timer facility, event scheduler, dispatcher and the console,
//!   FM synth (`cpal`) and MIDI (`midir`) outputs.
//! - `commands`: the REPL command registry.
//! - `config`: player configuration from defaults, environment and flags.
//! - `player`: wires timer, scheduler, dispatcher and outputs together.
//! - `repl`: the interactive prompt and file watching.

pub mod audio;
pub mod commands;
pub mod config;
pub mod player;
pub mod repl;

pub use crate::audio::scheduler::{PlaybackSummary, Scheduler};
pub use crate::audio::timer::{DelayScheduler, ThreadTimer, TimerId, VirtualTimer};
pub use crate::config::{OutputMode, PlayerConfig};
pub use crate::player::Player;
pub use mml_core::{compile, MmlError, Note, PlaybackEvent};
