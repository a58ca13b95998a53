//! Music theory primitives: scales, modes and pitch resolution.

pub mod scale;

pub use scale::{abspitch_from_scale, resolve_pitch, Mode, Pitch, Scale, DIATONIC, DIATONIC_STEPS};

/// Builtin pitch-class names and their absolute values.
pub const PITCH_CONSTANTS: [(&str, i32); DIATONIC] = [
    ("C", 0),
    ("D", 2),
    ("E", 4),
    ("F", 5),
    ("G", 7),
    ("A", 9),
    ("B", 11),
];

/// Builtin mode names, including the `MAJ`/`MIN` aliases.
pub const MODE_CONSTANTS: [(&str, Mode); DIATONIC + 2] = [
    ("ION", Mode::Ionian),
    ("DOR", Mode::Dorian),
    ("PHRYG", Mode::Phrygian),
    ("LYD", Mode::Lydian),
    ("MIXOLYD", Mode::Mixolydian),
    ("AEOL", Mode::Aeolian),
    ("LOCR", Mode::Locrian),
    ("MAJ", Mode::Ionian),
    ("MIN", Mode::Aeolian),
];

/// Look up a builtin pitch-class constant by name.
pub fn pitch_constant(name: &str) -> Option<i32> {
    PITCH_CONSTANTS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, p)| *p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_constants_follow_step_table() {
        for (i, (_, pc)) in PITCH_CONSTANTS.iter().enumerate() {
            assert_eq!(*pc, DIATONIC_STEPS[i]);
        }
    }

    #[test]
    fn mode_constants_agree_with_from_name() {
        for (name, mode) in MODE_CONSTANTS {
            assert_eq!(Mode::from_name(name), Some(mode));
        }
    }

    #[test]
    fn pitch_constant_lookup() {
        assert_eq!(pitch_constant("G"), Some(7));
        assert_eq!(pitch_constant("H"), None);
    }
}
