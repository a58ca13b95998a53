//! Standard MIDI File byte encoding.
//!
//! Tracks are encoded in two passes. The first checks NoteOn/NoteOff
//! balance and counts notes so automation spans can be validated; the
//! second writes the chunk body, activating automation as each note starts.

use tracing::debug;

use super::error::BackendError;
use super::TrackState;
use crate::automation::AutomationTarget;
use crate::event::{MidiEvent, TrackMeta};

const HEADER_MAGIC: &[u8; 4] = b"MThd";
const TRACK_MAGIC: &[u8; 4] = b"MTrk";
const FORMAT_MULTI_TRACK: u16 = 1;

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;
const CONTROL_CHANGE: u8 = 0xB0;
const PROGRAM_CHANGE: u8 = 0xC0;
const CC_VOLUME: u8 = 0x07;
const META: u8 = 0xFF;
const META_TEMPO: u8 = 0x51;
const META_END_OF_TRACK: u8 = 0x2F;

/// Largest delta-time a Standard MIDI File can carry (four VLQ bytes).
pub const MAX_DELTA: u32 = 0x0FFF_FFFF;

/// Append `value` as a variable-length quantity (7 bits per byte, MSB first).
///
/// Values above [`MAX_DELTA`] take five bytes, which SMF readers reject;
/// delta-times are checked against it in [`count_notes`].
pub fn write_vlq(out: &mut Vec<u8>, value: u32) {
    let mut groups = [0u8; 5];
    let mut len = 0;
    let mut v = value;
    loop {
        groups[len] = (v & 0x7F) as u8;
        len += 1;
        v >>= 7;
        if v == 0 {
            break;
        }
    }
    for i in (0..len).rev() {
        let continuation = if i > 0 { 0x80 } else { 0 };
        out.push(groups[i] | continuation);
    }
}

/// Decode a variable-length quantity, returning the value and bytes consumed.
pub fn read_vlq(bytes: &[u8]) -> Option<(u32, usize)> {
    let mut value: u32 = 0;
    for (i, &b) in bytes.iter().enumerate().take(5) {
        value = (value << 7) | (b & 0x7F) as u32;
        if b & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

/// Append the `MThd` chunk.
pub fn write_header(out: &mut Vec<u8>, track_count: u16, division: u16) {
    out.extend_from_slice(HEADER_MAGIC);
    out.extend_from_slice(&6u32.to_be_bytes());
    out.extend_from_slice(&FORMAT_MULTI_TRACK.to_be_bytes());
    out.extend_from_slice(&track_count.to_be_bytes());
    out.extend_from_slice(&division.to_be_bytes());
}

/// Whether `event` begins a new note given the event before it.
///
/// Consecutive NoteOns form one chord; a rest is a note on its own.
pub fn is_note_start(prev: Option<&MidiEvent>, event: &MidiEvent) -> bool {
    match event {
        MidiEvent::NoteOn { .. } => !prev.is_some_and(MidiEvent::is_note_on),
        MidiEvent::BufferedDelay { .. } => true,
        _ => false,
    }
}

fn check_delta(track: usize, ticks: u64) -> Result<(), BackendError> {
    if ticks > MAX_DELTA as u64 {
        return Err(BackendError::DeltaTooLong { track, ticks });
    }
    Ok(())
}

/// First pass: check NoteOn/NoteOff pairing and delta-times, and count notes.
pub fn count_notes(track: usize, events: &[MidiEvent]) -> Result<usize, BackendError> {
    let (mut on, mut off, mut notes) = (0usize, 0usize, 0usize);
    let mut pending: u64 = 0;
    let mut prev = None;
    for event in events {
        if is_note_start(prev, event) {
            notes += 1;
        }
        match *event {
            MidiEvent::NoteOn { .. } => {
                check_delta(track, pending)?;
                pending = 0;
                on += 1;
            }
            MidiEvent::NoteOff { delta, .. } => {
                if off >= on {
                    return Err(BackendError::StandaloneNoteOff { track, on, off });
                }
                check_delta(track, delta as u64)?;
                off += 1;
            }
            MidiEvent::BufferedDelay { ticks } => pending += ticks as u64,
            _ => {}
        }
        prev = Some(event);
    }
    if on != off {
        return Err(BackendError::UnbalancedNotes { track, on, off });
    }
    // Trailing rests are carried by end-of-track.
    check_delta(track, pending)?;
    Ok(notes)
}

fn write_volume(out: &mut Vec<u8>, channel: u8, volume: u8) {
    write_vlq(out, 0);
    out.extend_from_slice(&[CONTROL_CHANGE | channel, CC_VOLUME, volume]);
}

fn write_event(out: &mut Vec<u8>, channel: u8, meta: &mut TrackMeta, event: &MidiEvent) {
    match *event {
        MidiEvent::NoteOn { pitch, velocity } => {
            write_vlq(out, meta.take_delay());
            out.extend_from_slice(&[NOTE_ON | channel, pitch, velocity]);
        }
        MidiEvent::NoteOff {
            pitch,
            velocity,
            delta,
        } => {
            write_vlq(out, delta);
            out.extend_from_slice(&[NOTE_OFF | channel, pitch, velocity]);
        }
        MidiEvent::SetTempo { micros_per_quarter } => {
            write_vlq(out, 0);
            let [_, hi, mid, lo] = micros_per_quarter.to_be_bytes();
            out.extend_from_slice(&[META, META_TEMPO, 0x03, hi, mid, lo]);
        }
        MidiEvent::SetInstrument { program } => {
            write_vlq(out, 0);
            out.extend_from_slice(&[PROGRAM_CHANGE | channel, program]);
        }
        MidiEvent::SetVolume { volume } => {
            meta.volume = volume;
            write_volume(out, channel, volume);
        }
        MidiEvent::SetVolumeRatio { ratio } => {
            let volume = meta.apply_ratio(ratio);
            write_volume(out, channel, volume);
        }
        MidiEvent::BufferedDelay { ticks } => meta.buffer_delay(ticks),
    }
}

/// Encode one `MTrk` chunk onto `out`.
///
/// `globals` are written at the head of track 0 only. Every track starts
/// with a volume change to `default_volume`.
pub(crate) fn encode_track(
    out: &mut Vec<u8>,
    index: usize,
    track: &mut TrackState,
    globals: &[MidiEvent],
    default_volume: u8,
) -> Result<(), BackendError> {
    let note_count = count_notes(index, &track.events)?;
    track.automation.validate(note_count)?;
    track.automation.reset();
    track.meta = TrackMeta::new(default_volume);

    out.extend_from_slice(TRACK_MAGIC);
    let length_at = out.len();
    out.extend_from_slice(&[0; 4]);
    let body_start = out.len();

    let channel = track.channel;
    if index == 0 {
        for event in globals {
            write_event(out, channel, &mut track.meta, event);
        }
    }
    write_volume(out, channel, default_volume);

    let mut note = 0;
    let mut prev = None;
    for event in &track.events {
        if is_note_start(prev, event) {
            if let Some((target, value)) = track.automation.on_note_start(note)? {
                match target {
                    AutomationTarget::Volume => {
                        track.meta.volume = value;
                        write_volume(out, channel, value);
                    }
                }
            }
            note += 1;
        }
        write_event(out, channel, &mut track.meta, event);
        prev = Some(event);
    }

    write_vlq(out, track.meta.take_delay());
    out.extend_from_slice(&[META, META_END_OF_TRACK, 0x00]);

    let length = (out.len() - body_start) as u32;
    out[length_at..body_start].copy_from_slice(&length.to_be_bytes());
    debug!(
        track = index,
        channel,
        notes = note_count,
        bytes = length,
        "encoded track"
    );
    Ok(())
}
