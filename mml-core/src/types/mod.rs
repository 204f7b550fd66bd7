// mml-core/src/types/mod.rs

pub mod duration;
pub mod note;
pub mod pitch;
pub mod playback_event;

pub use duration::{clause_duration, fold_tie, LengthError, TieOutcome};
pub use note::{end_time, Note, MAX_VOLUME};
pub use pitch::{pitch_to_frequency, resolve_pitch, NoteLetter};
pub use playback_event::PlaybackEvent;
