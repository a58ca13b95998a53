//! Backend and codec errors.
//!
//! Everything except [`BackendError::Io`] is a contract violation: a value
//! that a correct upstream pass would never have produced.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no such track id {track} (backend has {count} tracks)")]
    NoSuchTrack { track: usize, count: usize },

    #[error("{event} cannot target {target}: only tempo events are global, and tempo events are only global")]
    GlobalEventMismatch {
        event: &'static str,
        target: &'static str,
    },

    #[error("bad note pitch value {0} (expected 0..=127)")]
    PitchOutOfRange(i64),

    #[error("track {track}: pitch of note {note} does not fit in a MIDI note number")]
    PitchOverflow { track: usize, note: usize },

    #[error("bad velocity {0} (expected 0..=127)")]
    VelocityOutOfRange(i64),

    #[error("invalid program number {0} (expected 0..=127)")]
    InvalidProgram(i64),

    #[error("invalid volume {0} (expected 0..=127)")]
    InvalidVolume(i64),

    #[error("bpm should be greater than 0, got {0}")]
    InvalidTempo(i64),

    #[error("{0} tracks exceed the 16 MIDI channels")]
    TooManyTracks(usize),

    #[error("track {track}: standalone NoteOff event (NoteOn: {on} NoteOff: {off})")]
    StandaloneNoteOff { track: usize, on: usize, off: usize },

    #[error("track {track}: {on} NoteOn events but {off} NoteOff events")]
    UnbalancedNotes { track: usize, on: usize, off: usize },

    #[error("track {track}: rest of {ticks} ticks exceeds the longest MIDI delta-time")]
    DeltaTooLong { track: usize, ticks: u64 },

    #[error("track {track}: automation at note {start} overlaps the span registered at note {existing}")]
    AutomationOverlap {
        track: usize,
        start: usize,
        existing: usize,
    },

    #[error("track {track}: automation at note {start} activated while another span is still active")]
    AutomationSlotBusy { track: usize, start: usize },

    #[error("track {track}: automation spanning notes {start}..{end} exceeds the {notes} notes in the track")]
    AutomationOutOfRange {
        track: usize,
        start: usize,
        end: usize,
        notes: usize,
    },

    #[error("track {track}: automation at note {start} has zero duration")]
    EmptyAutomation { track: usize, start: usize },

    #[error("invalid backend configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
