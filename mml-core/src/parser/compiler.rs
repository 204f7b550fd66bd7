//! Single-pass MML compiler
//!
//! Walks the clause stream once, threading an explicit [`CompilerState`]
//! through every command and collecting the notes it produces. Compilation is
//! all-or-nothing: the first error discards everything compiled so far.

use crate::parser::comments::normalize;
use crate::parser::error::MmlError;
use crate::parser::tokenizer::{Clause, Command, Tokenizer};
use crate::types::duration::{clause_duration, fold_tie, TieOutcome};
use crate::types::note::{Note, MAX_VOLUME};
use crate::types::pitch::resolve_pitch;

/// Mutable musical state for one compilation
#[derive(Debug, Clone, PartialEq)]
pub struct CompilerState {
    /// Beats per minute
    pub tempo: u32,
    /// Length denominator used when a note has no digits
    pub default_length: u32,
    pub octave: i32,
    pub volume: u8,
    pub track: usize,
    /// Elapsed milliseconds on the current track
    pub cursor: f64,
    /// Milliseconds carried over from tied clauses
    pub pending_tie: f64,
}

impl Default for CompilerState {
    fn default() -> Self {
        Self {
            tempo: 60,
            default_length: 4,
            octave: 5,
            volume: MAX_VOLUME,
            track: 0,
            cursor: 0.0,
            pending_tie: 0.0,
        }
    }
}

/// Compiles clauses into notes
#[derive(Debug, Default)]
pub struct Compiler {
    state: CompilerState,
    notes: Vec<Note>,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a custom initial state
    pub fn with_state(state: CompilerState) -> Self {
        Self {
            state,
            notes: Vec::new(),
        }
    }

    pub fn state(&self) -> &CompilerState {
        &self.state
    }

    /// Apply one clause to the state, possibly emitting a note
    pub fn feed(&mut self, clause: &Clause) -> Result<(), MmlError> {
        match clause.classify()? {
            Command::Note(letter) => {
                let modifiers = clause.modifiers();
                if let Some(length) = self.complete_length(clause)? {
                    let pitch = resolve_pitch(self.state.octave, letter, &modifiers);
                    self.emit(clause, pitch, length);
                }
            }
            Command::Rest => {
                if let Some(length) = self.complete_length(clause)? {
                    self.state.cursor += length;
                }
            }
            Command::OctaveUp => self.state.octave = self.state.octave.saturating_add(1),
            Command::OctaveDown => self.state.octave = self.state.octave.saturating_sub(1),
            Command::OctaveSet(value) => {
                if let Some(octave) = self.require_number(clause, value) {
                    self.state.octave = octave.min(i32::MAX as u32) as i32;
                }
            }
            Command::TempoSet(value) => {
                if let Some(tempo) = self.require_number(clause, value) {
                    self.state.tempo = tempo;
                }
            }
            Command::LengthSet(value) => {
                if let Some(length) = self.require_number(clause, value) {
                    self.state.default_length = length;
                }
            }
            Command::VolumeSet(value) => {
                if let Some(volume) = self.require_number(clause, value) {
                    if volume > MAX_VOLUME as u32 {
                        log::warn!(
                            "volume {} in '{}' at {} clamped to {}",
                            volume,
                            clause.text.trim(),
                            clause.offset,
                            MAX_VOLUME
                        );
                    }
                    self.state.volume = volume.min(MAX_VOLUME as u32) as u8;
                }
            }
            Command::TrackSeparator => {
                self.state.track += 1;
                self.state.cursor = 0.0;
            }
        }
        Ok(())
    }

    /// Resolve a clause's length through the tie accumulator.
    ///
    /// Returns `None` while the clause is tied onward.
    fn complete_length(&mut self, clause: &Clause) -> Result<Option<f64>, MmlError> {
        let modifiers = clause.modifiers();
        let duration = clause_duration(&modifiers, self.state.tempo, self.state.default_length)
            .map_err(|e| MmlError::InvalidLength {
                clause: clause.text.clone(),
                offset: clause.offset,
                reason: e.to_string(),
            })?;

        match fold_tie(&mut self.state.pending_tie, duration, modifiers.tie) {
            TieOutcome::Pending => Ok(None),
            TieOutcome::Complete(total) => Ok(Some(total)),
        }
    }

    /// State commands without digits leave the state untouched
    fn require_number(&self, clause: &Clause, value: Option<u32>) -> Option<u32> {
        if value.is_none() {
            log::warn!(
                "'{}' at {} has no numeric value, state unchanged",
                clause.text.trim(),
                clause.offset
            );
        }
        value
    }

    fn emit(&mut self, clause: &Clause, pitch: i32, length: f64) {
        // Float-to-int casts saturate, so a runaway cursor pins at u64::MAX
        let start = self.state.cursor.round() as u64;
        let end = (self.state.cursor + length).round() as u64;

        self.notes.push(Note {
            found_at: clause.offset,
            clause: clause.text.clone(),
            track: self.state.track,
            volume: self.state.volume,
            pitch,
            start_time: start,
            duration: end.saturating_sub(start),
        });
        self.state.cursor += length;
    }

    /// Finish compilation and hand back the notes in clause order
    pub fn finish(self) -> Vec<Note> {
        if self.state.pending_tie > 0.0 {
            log::debug!(
                "dropping {} ms of tie with no following note",
                self.state.pending_tie
            );
        }
        self.notes
    }
}

/// Compile an already tokenized clause stream
pub fn compile_clauses<I>(clauses: I) -> Result<Vec<Note>, MmlError>
where
    I: IntoIterator<Item = Result<Clause, MmlError>>,
{
    let mut compiler = Compiler::new();
    for clause in clauses {
        compiler.feed(&clause?)?;
    }
    Ok(compiler.finish())
}

/// Compile MML text into notes ordered by source position
pub fn compile(text: &str) -> Result<Vec<Note>, MmlError> {
    let normalized = normalize(text);
    compile_clauses(Tokenizer::new(&normalized))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(compiler: &mut Compiler, text: &str) {
        for clause in Tokenizer::new(text) {
            compiler.feed(&clause.unwrap()).unwrap();
        }
    }

    #[test]
    fn test_default_state() {
        let state = CompilerState::default();
        assert_eq!(state.tempo, 60);
        assert_eq!(state.default_length, 4);
        assert_eq!(state.octave, 5);
        assert_eq!(state.volume, 127);
        assert_eq!(state.track, 0);
    }

    #[test]
    fn test_state_commands() {
        let mut compiler = Compiler::new();
        feed_all(&mut compiler, "t90 l8 o3 v64 > > <");
        let state = compiler.state();
        assert_eq!(state.tempo, 90);
        assert_eq!(state.default_length, 8);
        assert_eq!(state.octave, 4);
        assert_eq!(state.volume, 64);
    }

    #[test]
    fn test_missing_number_keeps_state() {
        let mut compiler = Compiler::new();
        feed_all(&mut compiler, "t120 t l8 l. o v");
        let state = compiler.state();
        assert_eq!(state.tempo, 120);
        assert_eq!(state.default_length, 8);
        assert_eq!(state.octave, 5);
        assert_eq!(state.volume, 127);
    }

    #[test]
    fn test_volume_is_clamped() {
        let mut compiler = Compiler::new();
        feed_all(&mut compiler, "v300");
        assert_eq!(compiler.state().volume, 127);
    }

    #[test]
    fn test_track_separator_resets_cursor() {
        let mut compiler = Compiler::new();
        feed_all(&mut compiler, "c d ,");
        assert_eq!(compiler.state().track, 1);
        assert_eq!(compiler.state().cursor, 0.0);
    }

    #[test]
    fn test_rest_advances_cursor() {
        let mut compiler = Compiler::new();
        feed_all(&mut compiler, "r2");
        assert_eq!(compiler.state().cursor, 2000.0);
        assert!(compiler.finish().is_empty());
    }

    #[test]
    fn test_tie_into_rest_is_silent() {
        let notes = compile("c4& r4 d").unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].start_time, 2000);
    }

    #[test]
    fn test_rounding_does_not_drift() {
        // quarter at 70 BPM = 857.142...ms
        let notes = compile("t70 c c c").unwrap();
        assert_eq!(notes[0].start_time, 0);
        assert_eq!(notes[1].start_time, 857);
        assert_eq!(notes[2].start_time, 1714);
        assert_eq!(notes[2].end_time(), 2571);
    }

    #[test]
    fn test_zero_tempo_fails() {
        let err = compile("t0 c").unwrap_err();
        assert!(matches!(err, MmlError::InvalidLength { offset: 3, .. }));
    }

    #[test]
    fn test_zero_length_fails() {
        let err = compile("c0").unwrap_err();
        assert_eq!(err.clause(), "c0");
    }

    #[test]
    fn test_custom_initial_state() {
        let mut compiler = Compiler::with_state(CompilerState {
            tempo: 120,
            octave: 4,
            ..Default::default()
        });
        feed_all(&mut compiler, "c c");
        let notes = compiler.finish();
        assert_eq!(notes[0].pitch, 48);
        assert_eq!(notes[1].start_time, 500);
    }

    #[test]
    fn test_pitch_zero_is_emitted() {
        let notes = compile("o0 c").unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].pitch, 0);
    }
}
