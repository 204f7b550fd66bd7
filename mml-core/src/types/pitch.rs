//! Pitch resolution for note clauses
//!
//! Pitches use MIDI-style semitone numbering where octave 5 starts at 60.
//! Nothing is clamped: very low or high octaves yield negative pitches or
//! values above 127, and callers decide what to do with them.

use crate::parser::tokenizer::Modifiers;

/// Note letters of the natural scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NoteLetter {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl NoteLetter {
    /// Parse a lowercase note letter
    pub fn from_char(ch: char) -> Option<NoteLetter> {
        match ch {
            'c' => Some(NoteLetter::C),
            'd' => Some(NoteLetter::D),
            'e' => Some(NoteLetter::E),
            'f' => Some(NoteLetter::F),
            'g' => Some(NoteLetter::G),
            'a' => Some(NoteLetter::A),
            'b' => Some(NoteLetter::B),
            _ => None,
        }
    }

    /// Semitone offset above C
    pub fn semitone(&self) -> i32 {
        match self {
            NoteLetter::C => 0,
            NoteLetter::D => 2,
            NoteLetter::E => 4,
            NoteLetter::F => 5,
            NoteLetter::G => 7,
            NoteLetter::A => 9,
            NoteLetter::B => 11,
        }
    }
}

/// Compute the pitch number for a letter in the given octave.
///
/// A sharp adds one semitone and a flat removes one; when both are present
/// they cancel out. Octaves far outside any audible range saturate at the
/// ends of `i32` instead of wrapping.
pub fn resolve_pitch(octave: i32, letter: NoteLetter, modifiers: &Modifiers) -> i32 {
    let mut pitch = octave.saturating_mul(12).saturating_add(letter.semitone());
    if modifiers.sharp {
        pitch = pitch.saturating_add(1);
    }
    if modifiers.flat {
        pitch = pitch.saturating_sub(1);
    }
    pitch
}

/// Frequency in Hz of a pitch number, with A (pitch 69) at 440 Hz
pub fn pitch_to_frequency(pitch: i32) -> f32 {
    440.0 * 2f32.powf(pitch.saturating_sub(69) as f32 / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Resolve a whole clause; `None` means the clause is a rest
    fn resolve_clause(octave: i32, clause: &str) -> Option<i32> {
        let mut chars = clause.chars();
        let letter = NoteLetter::from_char(chars.next()?)?;
        Some(resolve_pitch(octave, letter, &Modifiers::parse(chars.as_str())))
    }

    #[test]
    fn test_natural_pitches() {
        assert_eq!(resolve_clause(5, "c"), Some(60));
        assert_eq!(resolve_clause(5, "a4"), Some(69));
        assert_eq!(resolve_clause(4, "b"), Some(59));
    }

    #[test]
    fn test_accidentals() {
        assert_eq!(resolve_clause(5, "c+"), Some(61));
        assert_eq!(resolve_clause(5, "c#8"), Some(61));
        assert_eq!(resolve_clause(5, "e-"), Some(63));
        // Sharp and flat cancel
        assert_eq!(resolve_clause(5, "c+-"), Some(60));
        // Repeated markers count once
        assert_eq!(resolve_clause(5, "c++"), Some(61));
    }

    #[test]
    fn test_rest_has_no_pitch() {
        assert_eq!(resolve_clause(5, "r4"), None);
    }

    #[test]
    fn test_no_clamping() {
        assert_eq!(resolve_clause(-1, "c"), Some(-12));
        assert_eq!(resolve_clause(11, "b"), Some(143));
        assert_eq!(resolve_clause(0, "c-"), Some(-1));
    }

    #[test]
    fn test_extreme_octaves_saturate() {
        assert_eq!(resolve_clause(200_000_000, "c"), Some(i32::MAX));
        assert_eq!(resolve_clause(i32::MAX, "b+"), Some(i32::MAX));
        assert_eq!(resolve_clause(i32::MIN, "c-"), Some(i32::MIN));
        assert!(pitch_to_frequency(i32::MIN) >= 0.0);
    }

    #[test]
    fn test_frequency() {
        assert!((pitch_to_frequency(69) - 440.0).abs() < 0.001);
        assert!((pitch_to_frequency(81) - 880.0).abs() < 0.01);
        assert!((pitch_to_frequency(60) - 261.63).abs() < 0.01);
    }
}
