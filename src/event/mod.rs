//! Event model: scheduled MIDI events, tick arithmetic and per-track
//! scheduling state.
//!
//! Events are queued per track (plus one global list for tempo) and turned
//! into bytes by [`crate::midi::codec`]. Timing is delta-based: a rest does
//! not produce bytes of its own but accumulates in the track's
//! [`TrackMeta::delay`] until the next NoteOn consumes it.

pub mod ticks;
pub mod types;

pub use ticks::{base_length, note_ticks, tempo_micros, DEFAULT_DIVISION};
pub use types::{MidiEvent, Target};

/// Scheduling metadata carried by each track while it is serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackMeta {
    /// Rest duration not yet emitted as a delta-time.
    pub delay: u32,
    /// Last volume written to the track, the base for ratio changes.
    pub volume: u8,
}

impl TrackMeta {
    pub fn new(volume: u8) -> Self {
        Self { delay: 0, volume }
    }

    /// Add a rest to the pending delay.
    pub fn buffer_delay(&mut self, ticks: u32) {
        self.delay = self.delay.saturating_add(ticks);
    }

    /// Consume the pending delay.
    pub fn take_delay(&mut self) -> u32 {
        std::mem::take(&mut self.delay)
    }

    /// Apply a volume ratio to the current volume and return the new value.
    ///
    /// A non-positive ratio drops the volume to 1; results clamp to 127.
    pub fn apply_ratio(&mut self, ratio: f32) -> u8 {
        let volume = if ratio <= 0.0 {
            1
        } else {
            (self.volume as f32 * ratio).clamp(0.0, 127.0) as u8
        };
        self.volume = volume;
        volume
    }
}
