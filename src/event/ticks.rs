//! Musical time in MIDI ticks.
//!
//! A note's length is a dot-count: one dot is a whole note (four quarter
//! notes) and every further dot halves it. Lengths are kept as hundredths of
//! a quarter note so the conversion to ticks stays in integer arithmetic:
//! `ticks = division * base_length(dots) / 100`.

use crate::midi::error::BackendError;

/// Default ticks per quarter note.
pub const DEFAULT_DIVISION: u16 = 120;

/// Length of a one-dot note in hundredths of a quarter note.
pub const WHOLE_NOTE_BASE: u32 = 400;

const MICROS_PER_MINUTE: i64 = 60_000_000;

/// Length of a `dots`-dot note in hundredths of a quarter note.
///
/// Zero dots and very long dot runs both give zero.
pub fn base_length(dots: u32) -> u32 {
    match dots {
        0 => 0,
        n => WHOLE_NOTE_BASE.checked_shr(n - 1).unwrap_or(0),
    }
}

/// Length of a `dots`-dot note in ticks at the given division.
pub fn note_ticks(division: u16, dots: u32) -> u32 {
    division as u32 * base_length(dots) / 100
}

/// Largest value the 24-bit tempo meta event can carry.
pub const MAX_TEMPO_MICROS: u32 = 0xFF_FFFF;

/// Microseconds per quarter note for a tempo in beats per minute.
///
/// Tempos below 4 bpm saturate at [`MAX_TEMPO_MICROS`].
pub fn tempo_micros(bpm: i64) -> Result<u32, BackendError> {
    if bpm <= 0 {
        return Err(BackendError::InvalidTempo(bpm));
    }
    Ok((MICROS_PER_MINUTE / bpm).min(MAX_TEMPO_MICROS as i64) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_dot_is_a_whole_note() {
        assert_eq!(base_length(1), 400);
        assert_eq!(note_ticks(120, 1), 480);
    }

    #[test]
    fn each_dot_halves() {
        assert_eq!(note_ticks(120, 2), 240);
        assert_eq!(note_ticks(120, 3), 120);
        assert_eq!(note_ticks(120, 4), 60);
        assert_eq!(note_ticks(480, 3), 480);
    }

    #[test]
    fn long_dot_runs_reach_zero() {
        assert_eq!(base_length(9), 1);
        assert_eq!(base_length(10), 0);
        assert_eq!(base_length(40), 0);
        assert_eq!(note_ticks(120, 12), 0);
    }

    #[test]
    fn zero_dots_is_zero_ticks() {
        assert_eq!(note_ticks(120, 0), 0);
    }

    #[test]
    fn tempo_conversion() {
        assert_eq!(tempo_micros(120).unwrap(), 500_000);
        assert_eq!(tempo_micros(140).unwrap(), 428_571);
        assert_eq!(tempo_micros(60).unwrap(), 1_000_000);
        assert!(tempo_micros(0).is_err());
        assert!(tempo_micros(-5).is_err());
    }

    #[test]
    fn very_slow_tempo_saturates() {
        assert_eq!(tempo_micros(1).unwrap(), MAX_TEMPO_MICROS);
        assert_eq!(tempo_micros(4).unwrap(), 15_000_000);
    }
}
