//! Duration arithmetic for note and rest clauses
//!
//! A whole note lasts `240000 / tempo` milliseconds; a clause's length
//! denominator divides that, and each dot stretches the result by half.

use crate::parser::tokenizer::Modifiers;
use std::fmt;

/// Seconds in a whole note (four beats) at one beat per minute
pub const WHOLE_NOTE_SECONDS_AT_ONE_BPM: f64 = 240.0;

/// Stretch applied per dot
pub const DOT_FACTOR: f64 = 1.5;

/// Reasons a clause cannot be given a length
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LengthError {
    ZeroTempo,
    ZeroDenominator,
    NotPositive(f64),
}

impl fmt::Display for LengthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LengthError::ZeroTempo => write!(f, "tempo is zero"),
            LengthError::ZeroDenominator => write!(f, "length denominator is zero"),
            LengthError::NotPositive(ms) => write!(f, "duration {} ms is not positive", ms),
        }
    }
}

impl std::error::Error for LengthError {}

/// Length in milliseconds of a `1/denominator` note at `tempo` BPM
pub fn base_duration_ms(tempo: u32, denominator: u32) -> Result<f64, LengthError> {
    if tempo == 0 {
        return Err(LengthError::ZeroTempo);
    }
    if denominator == 0 {
        return Err(LengthError::ZeroDenominator);
    }
    let ms = WHOLE_NOTE_SECONDS_AT_ONE_BPM / (tempo as f64 * denominator as f64) * 1000.0;
    if ms.is_finite() && ms > 0.0 {
        Ok(ms)
    } else {
        Err(LengthError::NotPositive(ms))
    }
}

/// Apply `dots` successive 1.5x stretches
pub fn apply_dots(ms: f64, dots: u32) -> f64 {
    ms * DOT_FACTOR.powi(dots.min(i32::MAX as u32) as i32)
}

/// Duration of a note or rest clause, before tie folding
pub fn clause_duration(
    modifiers: &Modifiers,
    tempo: u32,
    default_length: u32,
) -> Result<f64, LengthError> {
    let denominator = modifiers.number.unwrap_or(default_length);
    let ms = apply_dots(base_duration_ms(tempo, denominator)?, modifiers.dots);
    if ms.is_finite() && ms > 0.0 {
        Ok(ms)
    } else {
        Err(LengthError::NotPositive(ms))
    }
}

/// Result of feeding one clause's duration through the tie accumulator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TieOutcome {
    /// The clause is tied onward; nothing is emitted yet
    Pending,
    /// The chain is complete with this total length
    Complete(f64),
}

/// Accumulate a tied duration, or close the chain and reset `pending`
pub fn fold_tie(pending: &mut f64, duration: f64, tied: bool) -> TieOutcome {
    if tied {
        *pending += duration;
        TieOutcome::Pending
    } else {
        let total = duration + *pending;
        *pending = 0.0;
        TieOutcome::Complete(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn length(number: Option<u32>, dots: u32) -> Modifiers {
        Modifiers {
            number,
            dots,
            ..Default::default()
        }
    }

    #[test]
    fn test_quarter_note_at_120() {
        assert_eq!(base_duration_ms(120, 4).unwrap(), 500.0);
    }

    #[test]
    fn test_default_tempo_quarter_is_one_second() {
        assert_eq!(clause_duration(&length(None, 0), 60, 4).unwrap(), 1000.0);
    }

    #[test]
    fn test_explicit_denominator_overrides_default() {
        assert_eq!(clause_duration(&length(Some(8), 0), 60, 4).unwrap(), 500.0);
    }

    #[test]
    fn test_dots_multiply() {
        assert_eq!(clause_duration(&length(Some(4), 1), 60, 4).unwrap(), 1500.0);
        assert_eq!(clause_duration(&length(Some(4), 2), 60, 4).unwrap(), 2250.0);
    }

    #[test]
    fn test_zero_values_fail() {
        assert_eq!(base_duration_ms(0, 4), Err(LengthError::ZeroTempo));
        assert_eq!(base_duration_ms(60, 0), Err(LengthError::ZeroDenominator));
        assert_eq!(
            clause_duration(&length(None, 0), 60, 0),
            Err(LengthError::ZeroDenominator)
        );
    }

    #[test]
    fn test_tie_accumulates_then_resets() {
        let mut pending = 0.0;
        assert_eq!(fold_tie(&mut pending, 1000.0, true), TieOutcome::Pending);
        assert_eq!(fold_tie(&mut pending, 500.0, true), TieOutcome::Pending);
        assert_eq!(pending, 1500.0);
        assert_eq!(
            fold_tie(&mut pending, 250.0, false),
            TieOutcome::Complete(1750.0)
        );
        assert_eq!(pending, 0.0);
    }
}
