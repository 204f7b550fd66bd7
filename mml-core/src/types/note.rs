use crate::types::pitch::pitch_to_frequency;
use std::fmt;

/// Highest value of the MIDI-style volume range
pub const MAX_VOLUME: u8 = 127;

/// A compiled note event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Note {
    /// Character offset of the producing clause (for highlighting)
    pub found_at: usize,
    /// Original clause text
    pub clause: String,
    pub track: usize,
    /// Velocity, 0-127
    pub volume: u8,
    /// Semitone number, 60 = c in octave 5
    pub pitch: i32,
    /// Milliseconds from the start of the track
    pub start_time: u64,
    /// Milliseconds, including tied length
    pub duration: u64,
}

impl Note {
    /// Milliseconds at which the note stops sounding
    pub fn end_time(&self) -> u64 {
        self.start_time.saturating_add(self.duration)
    }

    /// Frequency in Hz
    pub fn frequency(&self) -> f32 {
        pitch_to_frequency(self.pitch)
    }

    /// MIDI key number, if the pitch fits the 0-127 range
    pub fn midi_key(&self) -> Option<u8> {
        u8::try_from(self.pitch).ok().filter(|key| *key <= 127)
    }

    /// Velocity scaled to 0.0-1.0
    pub fn level(&self) -> f32 {
        self.volume as f32 / MAX_VOLUME as f32
    }

    /// Identity shared by the on and off events of this note
    pub fn id(&self) -> (usize, usize) {
        (self.track, self.found_at)
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (pitch {}, track {}, {}ms +{}ms, vol {})",
            self.clause.trim(),
            self.pitch,
            self.track,
            self.start_time,
            self.duration,
            self.volume
        )
    }
}

/// Latest end time across all notes, 0 when there are none
pub fn end_time(notes: &[Note]) -> u64 {
    notes.iter().map(Note::end_time).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(pitch: i32, start_time: u64, duration: u64) -> Note {
        Note {
            found_at: 0,
            clause: "c".to_string(),
            track: 0,
            volume: 127,
            pitch,
            start_time,
            duration,
        }
    }

    #[test]
    fn test_end_time() {
        assert_eq!(note(60, 500, 250).end_time(), 750);
        assert_eq!(end_time(&[note(60, 0, 1000), note(62, 200, 300)]), 1000);
        assert_eq!(end_time(&[]), 0);
    }

    #[test]
    fn test_midi_key_range() {
        assert_eq!(note(60, 0, 1).midi_key(), Some(60));
        assert_eq!(note(-1, 0, 1).midi_key(), None);
        assert_eq!(note(128, 0, 1).midi_key(), None);
    }

    #[test]
    fn test_level() {
        assert_eq!(note(60, 0, 1).level(), 1.0);
    }
}
