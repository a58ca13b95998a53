//! Runtime values and the Track IR.

use crate::automation::Interpolation;
use crate::theory::{Mode, Pitch, Scale};
use crate::types::TypeId;

/// Default tempo of a section without a `bpm` attribute.
pub const DEFAULT_BPM: i64 = 120;
/// Default General MIDI program of a section without an `instrument`.
pub const DEFAULT_INSTRUMENT: i64 = 2;

/// Section attributes and the type each one expects.
pub const CONFIG_ATTRIBUTES: [(&str, TypeId); 3] = [
    ("scale", TypeId::SCALE),
    ("bpm", TypeId::INT),
    ("instrument", TypeId::INT),
];

pub fn config_type(name: &str) -> Option<TypeId> {
    CONFIG_ATTRIBUTES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, ty)| *ty)
}

/// A value tagged with its type.
#[derive(Debug, Clone, PartialEq)]
pub struct Val {
    pub data: ValData,
    pub ty: TypeId,
}

impl Val {
    pub fn new(data: ValData, ty: TypeId) -> Self {
        Self { data, ty }
    }
}

/// Value payloads. Degrees, absolute pitches and pitches share
/// [`ValData::Pitch`]; lists and spreads share [`ValData::List`].
#[derive(Debug, Clone, PartialEq)]
pub enum ValData {
    Void,
    Bool(bool),
    Int(i64),
    Pitch(Pitch),
    Mode(Mode),
    Scale(Scale),
    Note(Note),
    List(Vec<Val>),
    Section(Track),
}

impl ValData {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ValData::Void => "void",
            ValData::Bool(_) => "bool",
            ValData::Int(_) => "int",
            ValData::Pitch(_) => "pitch",
            ValData::Mode(_) => "mode",
            ValData::Scale(_) => "scale",
            ValData::Note(_) => "note",
            ValData::List(_) => "list",
            ValData::Section(_) => "section",
        }
    }
}

/// A chord (empty for a rest) and its dot-count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub pitches: Vec<Pitch>,
    pub dots: u32,
}

impl Note {
    pub fn is_rest(&self) -> bool {
        self.pitches.is_empty()
    }
}

/// Resolved section attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecConfig {
    pub bpm: i64,
    pub instrument: i64,
    pub scale: Scale,
}

impl Default for SecConfig {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            instrument: DEFAULT_INSTRUMENT,
            scale: Scale::default(),
        }
    }
}

/// A label placed in a track's flattened note sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackLabel {
    pub name: String,
    pub volume: u8,
    pub interpolation: Interpolation,
    /// Index of the first note the label applies to.
    pub note_index: usize,
}

/// One evaluated section: every pitch is absolute.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Track {
    pub notes: Vec<Note>,
    pub config: SecConfig,
    pub labels: Vec<TrackLabel>,
}
