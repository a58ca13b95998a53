//! MIDI backend: per-track event queues serialized to a Standard MIDI File.
//!
//! The backend owns the output sink. Events are queued per track (tempo goes
//! to the global queue) and nothing reaches the sink until
//! [`Backend::dump_to_file`] has encoded every track in memory, so a failed
//! compile never leaves a partial file behind.

pub mod codec;
pub mod config;
pub mod error;

use std::io::Write;

use tracing::debug;

pub use config::MidiConfig;
pub use error::BackendError;

use crate::automation::{Automation, AutomationSchedule, AutomationTarget, Interpolation};
use crate::event::{MidiEvent, Target, TrackMeta};

/// MIDI has 16 channels; each track gets its own.
pub const MAX_TRACKS: usize = 16;

/// One member of a chord handed to [`Backend::add_note`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiNote {
    pub pitch: i64,
    pub velocity: i64,
    pub ticks: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct TrackState {
    pub(crate) channel: u8,
    pub(crate) events: Vec<MidiEvent>,
    pub(crate) meta: TrackMeta,
    pub(crate) automation: AutomationSchedule,
    /// Notes queued so far; automation registers against this index.
    pub(crate) note_count: usize,
}

impl TrackState {
    fn new(index: usize, volume: u8) -> Self {
        Self {
            channel: index as u8,
            events: Vec::new(),
            meta: TrackMeta::new(volume),
            automation: AutomationSchedule::new(index),
            note_count: 0,
        }
    }

    fn push(&mut self, event: MidiEvent) {
        if codec::is_note_start(self.events.last(), &event) {
            self.note_count += 1;
        }
        self.events.push(event);
    }
}

pub struct Backend<W: Write> {
    sink: W,
    config: MidiConfig,
    header: Vec<u8>,
    globals: Vec<MidiEvent>,
    tracks: Vec<TrackState>,
}

impl<W: Write> Backend<W> {
    /// Create a backend with `track_count` tracks writing to `sink`.
    pub fn init(sink: W, config: &MidiConfig, track_count: usize) -> Result<Self, BackendError> {
        config.validate()?;
        if track_count > MAX_TRACKS {
            return Err(BackendError::TooManyTracks(track_count));
        }
        let mut header = Vec::with_capacity(14);
        codec::write_header(&mut header, track_count as u16, config.division);
        let tracks = (0..track_count)
            .map(|i| TrackState::new(i, config.volume))
            .collect();
        debug!(tracks = track_count, division = config.division, "backend initialized");
        Ok(Self {
            sink,
            config: config.clone(),
            header,
            globals: Vec::new(),
            tracks,
        })
    }

    pub fn config(&self) -> &MidiConfig {
        &self.config
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    fn track_mut(&mut self, track: usize) -> Result<&mut TrackState, BackendError> {
        let count = self.tracks.len();
        self.tracks
            .get_mut(track)
            .ok_or(BackendError::NoSuchTrack { track, count })
    }

    /// Queue an event. Tempo events must target [`Target::Global`] and
    /// nothing else may.
    pub fn add_event(&mut self, target: Target, event: MidiEvent) -> Result<(), BackendError> {
        match target {
            Target::Global if !event.is_global() => Err(BackendError::GlobalEventMismatch {
                event: event.name(),
                target: "the global track",
            }),
            Target::Global => {
                self.globals.push(event);
                Ok(())
            }
            Target::Track(_) if event.is_global() => Err(BackendError::GlobalEventMismatch {
                event: event.name(),
                target: "a single track",
            }),
            Target::Track(track) => {
                self.track_mut(track)?.push(event);
                Ok(())
            }
        }
    }

    /// Queue a chord: every NoteOn, then every NoteOff. The first NoteOff
    /// carries the duration of the first member; the chord shares it.
    ///
    /// An empty chord queues nothing.
    pub fn add_note(&mut self, track: usize, notes: &[MidiNote]) -> Result<(), BackendError> {
        let Some(first) = notes.first() else {
            return Ok(());
        };
        let mut events = Vec::with_capacity(notes.len() * 2);
        for note in notes {
            events.push(MidiEvent::note_on(note.pitch, note.velocity)?);
        }
        for (i, note) in notes.iter().enumerate() {
            let delta = if i == 0 { first.ticks } else { 0 };
            events.push(MidiEvent::note_off(note.pitch, note.velocity, delta)?);
        }
        let state = self.track_mut(track)?;
        for event in events {
            state.push(event);
        }
        Ok(())
    }

    /// Queue a rest of `ticks`.
    pub fn add_rest(&mut self, track: usize, ticks: u32) -> Result<(), BackendError> {
        self.add_event(Target::Track(track), MidiEvent::rest(ticks))
    }

    /// Register an automation span that begins with the next note queued on
    /// `track` and covers `duration` notes.
    pub fn add_automation(
        &mut self,
        track: usize,
        target: AutomationTarget,
        start: u8,
        end: u8,
        duration: usize,
        interpolation: Interpolation,
    ) -> Result<(), BackendError> {
        for value in [start, end] {
            if value > 127 {
                return Err(BackendError::InvalidVolume(value as i64));
            }
        }
        let state = self.track_mut(track)?;
        let at = state.note_count;
        state.automation.register(
            at,
            Automation {
                target,
                start,
                end,
                duration,
                interpolation,
            },
        )
    }

    /// Notes queued so far on `track`.
    pub fn note_count(&self, track: usize) -> Option<usize> {
        self.tracks.get(track).map(|t| t.note_count)
    }

    /// Scheduling state of `track` as of the last serialization.
    pub fn meta(&self, track: usize) -> Option<&TrackMeta> {
        self.tracks.get(track).map(|t| &t.meta)
    }

    /// Encode every track and write the whole file to the sink.
    pub fn dump_to_file(&mut self) -> Result<(), BackendError> {
        let mut out = self.header.clone();
        let volume = self.config.volume;
        for (index, track) in self.tracks.iter_mut().enumerate() {
            codec::encode_track(&mut out, index, track, &self.globals, volume)?;
        }
        self.sink.write_all(&out)?;
        self.sink.flush()?;
        debug!(
            tracks = self.tracks.len(),
            bytes = out.len(),
            "flushed MIDI file to sink"
        );
        Ok(())
    }

    /// Release the backend, returning its sink.
    pub fn free(self) -> W {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(tracks: usize) -> Backend<Vec<u8>> {
        Backend::init(Vec::new(), &MidiConfig::default(), tracks).unwrap()
    }

    fn note(pitch: i64, ticks: u32) -> MidiNote {
        MidiNote {
            pitch,
            velocity: 64,
            ticks,
        }
    }

    #[test]
    fn too_many_tracks() {
        assert!(matches!(
            Backend::init(Vec::new(), &MidiConfig::default(), 17),
            Err(BackendError::TooManyTracks(17))
        ));
        assert!(Backend::init(Vec::new(), &MidiConfig::default(), 16).is_ok());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = MidiConfig {
            division: 0,
            ..MidiConfig::default()
        };
        assert!(matches!(
            Backend::init(Vec::new(), &config, 1),
            Err(BackendError::InvalidConfig(_))
        ));
    }

    #[test]
    fn tempo_must_be_global() {
        let mut b = backend(1);
        let tempo = MidiEvent::set_tempo(120).unwrap();
        assert!(matches!(
            b.add_event(Target::Track(0), tempo),
            Err(BackendError::GlobalEventMismatch { .. })
        ));
        assert!(matches!(
            b.add_event(Target::Global, MidiEvent::rest(10)),
            Err(BackendError::GlobalEventMismatch { .. })
        ));
        assert!(b.add_event(Target::Global, tempo).is_ok());
    }

    #[test]
    fn unknown_track_is_rejected() {
        let mut b = backend(2);
        assert!(matches!(
            b.add_rest(2, 10),
            Err(BackendError::NoSuchTrack { track: 2, count: 2 })
        ));
    }

    #[test]
    fn chord_timing() {
        let mut b = backend(1);
        b.add_note(0, &[note(60, 240), note(64, 240), note(67, 240)])
            .unwrap();
        assert_eq!(b.note_count(0), Some(1));
        b.dump_to_file().unwrap();
        let bytes = b.free();
        assert_eq!(
            &bytes[22..],
            &[
                0x00, 0xB0, 0x07, 80, //
                0x00, 0x90, 60, 64, 0x00, 0x90, 64, 64, 0x00, 0x90, 67, 64, //
                0x81, 0x70, 0x80, 60, 64, 0x00, 0x80, 64, 64, 0x00, 0x80, 67, 64, //
                0x00, 0xFF, 0x2F, 0x00,
            ]
        );
    }

    #[test]
    fn out_of_range_pitch_queues_nothing() {
        let mut b = backend(1);
        assert!(matches!(
            b.add_note(0, &[note(60, 10), note(128, 10)]),
            Err(BackendError::PitchOutOfRange(128))
        ));
        assert_eq!(b.note_count(0), Some(0));
    }

    #[test]
    fn automation_registers_at_current_note() {
        let mut b = backend(1);
        b.add_note(0, &[note(60, 10)]).unwrap();
        b.add_automation(0, AutomationTarget::Volume, 10, 20, 2, Interpolation::Linear)
            .unwrap();
        b.add_rest(0, 10).unwrap();
        b.add_note(0, &[note(62, 10)]).unwrap();
        assert_eq!(b.note_count(0), Some(3));
        b.dump_to_file().unwrap();
        assert_eq!(b.meta(0).map(|m| m.volume), Some(15));
    }

    #[test]
    fn failed_dump_writes_nothing() {
        let mut b = backend(2);
        b.add_automation(1, AutomationTarget::Volume, 10, 20, 3, Interpolation::Hold)
            .unwrap();
        b.add_note(1, &[note(60, 10)]).unwrap();
        assert!(b.dump_to_file().is_err());
        assert!(b.free().is_empty());
    }
}
