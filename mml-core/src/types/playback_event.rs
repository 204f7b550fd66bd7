//! Messages delivered to playback listeners

use crate::types::note::Note;
use std::fmt;

/// A timed message produced by the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "type", content = "note", rename_all = "kebab-case")
)]
pub enum PlaybackEvent {
    /// The note starts sounding
    NoteOn(Note),
    /// The note stops sounding
    NoteOff(Note),
    /// Every note of the session has finished
    End,
}

impl PlaybackEvent {
    /// Note carried by the event, if any
    pub fn note(&self) -> Option<&Note> {
        match self {
            PlaybackEvent::NoteOn(note) | PlaybackEvent::NoteOff(note) => Some(note),
            PlaybackEvent::End => None,
        }
    }

    /// Wire name of the event kind
    pub fn kind(&self) -> &'static str {
        match self {
            PlaybackEvent::NoteOn(_) => "note-on",
            PlaybackEvent::NoteOff(_) => "note-off",
            PlaybackEvent::End => "end",
        }
    }
}

impl fmt::Display for PlaybackEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.note() {
            Some(note) => write!(f, "{} {}", self.kind(), note),
            None => write!(f, "{}", self.kind()),
        }
    }
}
