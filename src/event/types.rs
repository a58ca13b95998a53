//! MIDI event data model.
//!
//! A [`MidiEvent`] is one entry in a track's (or the global) event list.
//! Constructors validate MIDI data ranges so that the codec only ever sees
//! encodable values.

use crate::midi::error::BackendError;

use super::ticks::tempo_micros;

/// Where an event is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Track(usize),
    /// File-wide events, spliced into track 0 when serializing.
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MidiEvent {
    NoteOn {
        pitch: u8,
        velocity: u8,
    },
    /// `delta` is the time since the previous event; the first NoteOff of a
    /// chord carries the note's duration.
    NoteOff {
        pitch: u8,
        velocity: u8,
        delta: u32,
    },
    SetTempo {
        micros_per_quarter: u32,
    },
    SetInstrument {
        program: u8,
    },
    SetVolume {
        volume: u8,
    },
    /// Scale the track's current volume.
    SetVolumeRatio {
        ratio: f32,
    },
    /// A rest: adds `ticks` to the track's pending delay.
    BufferedDelay {
        ticks: u32,
    },
}

fn data_byte(value: i64, err: fn(i64) -> BackendError) -> Result<u8, BackendError> {
    u8::try_from(value)
        .ok()
        .filter(|v| *v <= 127)
        .ok_or_else(|| err(value))
}

impl MidiEvent {
    pub fn note_on(pitch: i64, velocity: i64) -> Result<Self, BackendError> {
        Ok(MidiEvent::NoteOn {
            pitch: data_byte(pitch, BackendError::PitchOutOfRange)?,
            velocity: data_byte(velocity, BackendError::VelocityOutOfRange)?,
        })
    }

    pub fn note_off(pitch: i64, velocity: i64, delta: u32) -> Result<Self, BackendError> {
        Ok(MidiEvent::NoteOff {
            pitch: data_byte(pitch, BackendError::PitchOutOfRange)?,
            velocity: data_byte(velocity, BackendError::VelocityOutOfRange)?,
            delta,
        })
    }

    pub fn set_tempo(bpm: i64) -> Result<Self, BackendError> {
        Ok(MidiEvent::SetTempo {
            micros_per_quarter: tempo_micros(bpm)?,
        })
    }

    pub fn set_instrument(program: i64) -> Result<Self, BackendError> {
        Ok(MidiEvent::SetInstrument {
            program: data_byte(program, BackendError::InvalidProgram)?,
        })
    }

    pub fn set_volume(volume: i64) -> Result<Self, BackendError> {
        Ok(MidiEvent::SetVolume {
            volume: data_byte(volume, BackendError::InvalidVolume)?,
        })
    }

    pub fn set_volume_ratio(ratio: f32) -> Self {
        MidiEvent::SetVolumeRatio { ratio }
    }

    pub fn rest(ticks: u32) -> Self {
        MidiEvent::BufferedDelay { ticks }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MidiEvent::NoteOn { .. } => "NoteOn",
            MidiEvent::NoteOff { .. } => "NoteOff",
            MidiEvent::SetTempo { .. } => "SetTempo",
            MidiEvent::SetInstrument { .. } => "SetInstrument",
            MidiEvent::SetVolume { .. } => "SetVolume",
            MidiEvent::SetVolumeRatio { .. } => "SetVolumeRatio",
            MidiEvent::BufferedDelay { .. } => "BufferedDelay",
        }
    }

    /// Tempo is the only file-global event kind.
    pub fn is_global(&self) -> bool {
        matches!(self, MidiEvent::SetTempo { .. })
    }

    pub fn is_note_on(&self) -> bool {
        matches!(self, MidiEvent::NoteOn { .. })
    }
}
