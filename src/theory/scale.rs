//! Scale-relative pitch resolution.
//!
//! Maps a (scale, degree) pair to an absolute MIDI note number using the
//! seven-tone diatonic step table rotated by the scale's mode.

use std::fmt;

/// Number of tones in a diatonic scale.
pub const DIATONIC: usize = 7;

/// Semitone offsets of the Ionian scale from its tonic.
pub const DIATONIC_STEPS: [i32; DIATONIC] = [0, 2, 4, 5, 7, 9, 11];

/// One of the seven rotations of [`DIATONIC_STEPS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    #[default]
    Ionian,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Aeolian,
    Locrian,
}

impl Mode {
    pub const ALL: [Mode; DIATONIC] = [
        Mode::Ionian,
        Mode::Dorian,
        Mode::Phrygian,
        Mode::Lydian,
        Mode::Mixolydian,
        Mode::Aeolian,
        Mode::Locrian,
    ];

    /// Rotation index into the step table (0 = Ionian).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Look a mode up by its source-level name (`ION`, `AEOL`, `MAJ`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ION" | "MAJ" => Some(Mode::Ionian),
            "DOR" => Some(Mode::Dorian),
            "PHRYG" => Some(Mode::Phrygian),
            "LYD" => Some(Mode::Lydian),
            "MIXOLYD" => Some(Mode::Mixolydian),
            "AEOL" | "MIN" => Some(Mode::Aeolian),
            "LOCR" => Some(Mode::Locrian),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Mode::Ionian => "ION",
            Mode::Dorian => "DOR",
            Mode::Phrygian => "PHRYG",
            Mode::Lydian => "LYD",
            Mode::Mixolydian => "MIXOLYD",
            Mode::Aeolian => "AEOL",
            Mode::Locrian => "LOCR",
        }
    }
}

/// An evaluated scale: tonic pitch class, mode and octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scale {
    pub tonic: i32,
    pub mode: Mode,
    pub octave: i32,
}

impl Default for Scale {
    /// C Ionian in octave 5, so degree 1 is middle C (MIDI 60).
    fn default() -> Self {
        Self {
            tonic: 0,
            mode: Mode::Ionian,
            octave: 5,
        }
    }
}

impl Scale {
    pub fn new(tonic: i32, mode: Mode, octave: i32) -> Self {
        Self {
            tonic,
            mode,
            octave,
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{} {} {}/", self.tonic, self.octave, self.mode.name())
    }
}

/// A pitch before resolution: either a raw MIDI number or a scale degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pitch {
    Abs(i32),
    /// `degree` is always within `1..=7`; octaves live in `shift`.
    Degree { degree: u8, shift: i32 },
}

impl Pitch {
    /// Interpret an integer literal as a scale degree.
    ///
    /// Integers outside `1..=7` are folded by whole octaves, so `8` is degree
    /// 1 an octave up and `0` is degree 7 an octave down. Returns `None` when
    /// the octave shift does not fit in an `i32`.
    pub fn from_int(n: i64) -> Option<Self> {
        let zero_based = n.checked_sub(1)?;
        let octave = zero_based.div_euclid(DIATONIC as i64);
        let degree = zero_based.rem_euclid(DIATONIC as i64) + 1;
        let shift = i32::try_from(octave.checked_mul(12)?).ok()?;
        Some(Pitch::Degree {
            degree: degree as u8,
            shift,
        })
    }

    /// Apply a semitone shift (from `'` or a pitch qualifier).
    ///
    /// Returns `None` on overflow.
    pub fn shifted(self, semitones: i32) -> Option<Self> {
        Some(match self {
            Pitch::Abs(p) => Pitch::Abs(p.checked_add(semitones)?),
            Pitch::Degree { degree, shift } => Pitch::Degree {
                degree,
                shift: shift.checked_add(semitones)?,
            },
        })
    }

    pub fn is_abs(&self) -> bool {
        matches!(self, Pitch::Abs(_))
    }
}

/// Absolute pitch of `degree` within `scale`.
///
/// Degrees above 7 continue into the following octaves. Returns `None`
/// when the result does not fit in an `i32`.
///
/// # Panics
///
/// Panics if `degree` is 0: the evaluator only ever produces degrees in
/// `1..=7`, so a zero degree means an upstream pass is broken.
pub fn abspitch_from_scale(scale: &Scale, degree: u32) -> Option<i32> {
    assert!(degree >= 1, "scale degree {degree} out of range (expected >= 1)");
    let folded = (degree - 1) as usize;
    let octaves = (folded / DIATONIC) as i32;
    let degree = folded % DIATONIC + 1;

    let mode = scale.mode.index();
    let rotated = degree + mode - 1;
    let step = if rotated < DIATONIC {
        DIATONIC_STEPS[rotated] - DIATONIC_STEPS[mode]
    } else {
        12 + DIATONIC_STEPS[rotated % DIATONIC] - DIATONIC_STEPS[mode]
    };

    let base = scale.octave.checked_mul(12)?.checked_add(scale.tonic)?;
    base.checked_add(step)?.checked_add(octaves.checked_mul(12)?)
}

/// Resolve any pitch to an absolute MIDI number against `scale`.
///
/// Returns `None` on overflow.
pub fn resolve_pitch(scale: &Scale, pitch: Pitch) -> Option<i32> {
    match pitch {
        Pitch::Abs(p) => Some(p),
        Pitch::Degree { degree, shift } => {
            abspitch_from_scale(scale, degree as u32)?.checked_add(shift)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c_major() -> Scale {
        Scale::default()
    }

    #[test]
    fn default_scale_is_c_major_octave_5() {
        let s = c_major();
        assert_eq!(s.tonic, 0);
        assert_eq!(s.mode, Mode::Ionian);
        assert_eq!(s.octave, 5);
    }

    #[test]
    fn c_major_triad() {
        let s = c_major();
        assert_eq!(abspitch_from_scale(&s, 1), Some(60));
        assert_eq!(abspitch_from_scale(&s, 3), Some(64));
        assert_eq!(abspitch_from_scale(&s, 5), Some(67));
    }

    #[test]
    fn c_major_full_octave() {
        let s = c_major();
        let got: Vec<i32> = (1..=7).flat_map(|d| abspitch_from_scale(&s, d)).collect();
        assert_eq!(got, vec![60, 62, 64, 65, 67, 69, 71]);
    }

    #[test]
    fn aeolian_rotation_gives_natural_minor_steps() {
        // Relative steps from the tonic: 0 2 3 5 7 8 10
        let s = Scale::new(0, Mode::Aeolian, 5);
        let got: Vec<i32> = (1..=7)
            .flat_map(|d| abspitch_from_scale(&s, d))
            .map(|p| p - 60)
            .collect();
        assert_eq!(got, vec![0, 2, 3, 5, 7, 8, 10]);
    }

    #[test]
    fn dorian_wraps_past_octave_boundary() {
        // Dorian: 0 2 3 5 7 9 10
        let s = Scale::new(2, Mode::Dorian, 4);
        let got: Vec<i32> = (1..=7)
            .flat_map(|d| abspitch_from_scale(&s, d))
            .map(|p| p - 50)
            .collect();
        assert_eq!(got, vec![0, 2, 3, 5, 7, 9, 10]);
    }

    #[test]
    fn every_scale_resolves_with_octave_equivalence() {
        for tonic in 0..12 {
            for mode in Mode::ALL {
                for octave in -1..=9 {
                    let s = Scale::new(tonic, mode, octave);
                    for d in 1..=7u32 {
                        let low = abspitch_from_scale(&s, d).unwrap();
                        let high = abspitch_from_scale(&s, d + 7).unwrap();
                        assert_eq!(high, low + 12, "{s} degree {d}");
                    }
                }
            }
        }
    }

    #[test]
    fn every_mode_ascends_within_an_octave() {
        for mode in Mode::ALL {
            let s = Scale::new(0, mode, 5);
            let pitches: Vec<i32> = (1..=8).flat_map(|d| abspitch_from_scale(&s, d)).collect();
            assert!(pitches.windows(2).all(|w| w[0] < w[1]), "{mode:?}");
            assert_eq!(pitches[7] - pitches[0], 12);
        }
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn degree_zero_is_a_contract_violation() {
        let _ = abspitch_from_scale(&c_major(), 0);
    }

    #[test]
    fn from_int_folds_into_degree_range() {
        assert_eq!(Pitch::from_int(1), Some(Pitch::Degree { degree: 1, shift: 0 }));
        assert_eq!(Pitch::from_int(7), Some(Pitch::Degree { degree: 7, shift: 0 }));
        assert_eq!(Pitch::from_int(8), Some(Pitch::Degree { degree: 1, shift: 12 }));
        assert_eq!(Pitch::from_int(0), Some(Pitch::Degree { degree: 7, shift: -12 }));
        assert_eq!(Pitch::from_int(-6), Some(Pitch::Degree { degree: 1, shift: -12 }));
    }

    #[test]
    fn resolve_abs_is_identity() {
        assert_eq!(resolve_pitch(&c_major(), Pitch::Abs(42)), Some(42));
    }

    #[test]
    fn resolve_degree_applies_shift() {
        let sharp_four = Pitch::from_int(4).and_then(|p| p.shifted(1)).unwrap();
        assert_eq!(resolve_pitch(&c_major(), sharp_four), Some(66));
        let low_seven = Pitch::from_int(0).unwrap();
        assert_eq!(resolve_pitch(&c_major(), low_seven), Some(59));
    }

    #[test]
    fn shifted_abs_moves_raw_value() {
        assert_eq!(Pitch::Abs(60).shifted(-12), Some(Pitch::Abs(48)));
    }

    #[test]
    fn from_int_rejects_unrepresentable_octaves() {
        // 7516192769 folds to 1073741824 octaves, past i32 semitones.
        assert_eq!(Pitch::from_int(7_516_192_769), None);
        assert_eq!(Pitch::from_int(i64::MIN), None);
        assert_eq!(Pitch::from_int(i64::MAX), None);
    }

    #[test]
    fn shifted_overflow_is_none() {
        assert_eq!(Pitch::Abs(i32::MAX).shifted(1), None);
        let degree = Pitch::Degree {
            degree: 1,
            shift: 2_000_000_000,
        };
        assert_eq!(degree.shifted(2_000_000_000), None);
    }

    #[test]
    fn huge_octave_or_degree_does_not_wrap() {
        let high = Scale::new(0, Mode::Ionian, 200_000_000);
        assert_eq!(abspitch_from_scale(&high, 1), None);
        assert_eq!(abspitch_from_scale(&c_major(), u32::MAX), None);
        let shifted = Pitch::Degree {
            degree: 1,
            shift: i32::MAX,
        };
        assert_eq!(resolve_pitch(&c_major(), shifted), None);
    }

    #[test]
    fn mode_names_round_trip() {
        for mode in Mode::ALL {
            assert_eq!(Mode::from_name(mode.name()), Some(mode));
        }
        assert_eq!(Mode::from_name("MAJ"), Some(Mode::Ionian));
        assert_eq!(Mode::from_name("MIN"), Some(Mode::Aeolian));
        assert_eq!(Mode::from_name("major"), None);
    }
}
