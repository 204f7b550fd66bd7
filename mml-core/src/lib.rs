//! # MML Core
//!
//! WASM-compatible core library for Music Macro Language scores.
//! Compiles MML text into timed notes without audio/MIDI dependencies.
//!
//! ## Features
//!
//! - **serde**: Enable JSON serialization for web interop
//! - **wasm**: Enable WASM bindings via wasm-bindgen
//! - **colored**: Enable colored diagnostics (disabled in WASM)
//!
//! ## Example
//!
//! ```
//! use mml_core::compile;
//!
//! let notes = compile("t120 l4 c d e").unwrap();
//! assert_eq!(notes.len(), 3);
//! assert_eq!(notes[1].start_time, 500);
//! assert_eq!(notes[1].pitch, 62);
//! ```

pub mod parser;
pub mod types;
pub mod wasm;

// Re-export commonly used types
pub use parser::{compile, render_diagnostic, Clause, Command, CompilerState, MmlError};
pub use types::{end_time, Note, NoteLetter, PlaybackEvent};
