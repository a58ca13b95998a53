//! Lowering: Track IR to backend events.
//!
//! Track `i` becomes MIDI track `i` on channel `i`. The first track's tempo
//! is the file tempo. Labels become volume automation spans registered just
//! before the note they start on.

use std::io::Write;

use tracing::{debug, warn};

use crate::automation::{AutomationTarget, Interpolation};
use crate::eval::Track;
use crate::event::{note_ticks, MidiEvent, Target};
use crate::midi::{Backend, BackendError, MidiNote};
use crate::theory::resolve_pitch;

/// A label turned into an automation span over `duration` notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelSpan {
    pub at: usize,
    pub start: u8,
    pub end: u8,
    pub duration: usize,
    pub interpolation: Interpolation,
}

/// Spans for a track's labels: each runs to the next label, the last one
/// holds its value to the end of the track. Empty spans are dropped.
pub fn label_spans(track: &Track) -> Vec<LabelSpan> {
    let total = track.notes.len();
    let labels = &track.labels;
    let mut spans = Vec::with_capacity(labels.len());
    for (k, label) in labels.iter().enumerate() {
        let next = labels.get(k + 1);
        let until = next.map_or(total, |n| n.note_index).min(total);
        let duration = until.saturating_sub(label.note_index);
        if duration == 0 {
            continue;
        }
        let (end, interpolation) = match next {
            Some(n) => (n.volume, label.interpolation),
            None => (label.volume, Interpolation::Hold),
        };
        spans.push(LabelSpan {
            at: label.note_index,
            start: label.volume,
            end,
            duration,
            interpolation,
        });
    }
    spans
}

/// Queue every track's events on `backend`.
pub fn emit_tracks<W: Write>(backend: &mut Backend<W>, tracks: &[Track]) -> Result<(), BackendError> {
    let division = backend.config().division;
    let velocity = backend.config().velocity as i64;

    let Some(first) = tracks.first() else {
        return Ok(());
    };
    let tempo = first.config.bpm;
    backend.add_event(Target::Global, MidiEvent::set_tempo(tempo)?)?;

    for (index, track) in tracks.iter().enumerate() {
        if track.config.bpm != tempo {
            warn!(
                track = index,
                bpm = track.config.bpm,
                tempo,
                "MIDI tempo is file-global; using the first track's bpm"
            );
        }
        let target = Target::Track(index);
        backend.add_event(target, MidiEvent::set_instrument(track.config.instrument)?)?;

        let mut spans = label_spans(track).into_iter().peekable();
        for (n, note) in track.notes.iter().enumerate() {
            while let Some(span) = spans.next_if(|s| s.at == n) {
                backend.add_automation(
                    index,
                    AutomationTarget::Volume,
                    span.start,
                    span.end,
                    span.duration,
                    span.interpolation,
                )?;
            }

            let ticks = note_ticks(division, note.dots);
            if note.is_rest() {
                backend.add_rest(index, ticks)?;
                continue;
            }
            let chord = note
                .pitches
                .iter()
                .map(|&p| {
                    let pitch = resolve_pitch(&track.config.scale, p)
                        .ok_or(BackendError::PitchOverflow { track: index, note: n })?;
                    Ok(MidiNote {
                        pitch: pitch as i64,
                        velocity,
                        ticks,
                    })
                })
                .collect::<Result<Vec<_>, BackendError>>()?;
            backend.add_note(index, &chord)?;
        }
        debug!(
            track = index,
            notes = track.notes.len(),
            labels = track.labels.len(),
            instrument = track.config.instrument,
            "lowered track"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{Note, SecConfig, TrackLabel};
    use crate::midi::MidiConfig;
    use crate::theory::Pitch;

    fn note(pitch: i32, dots: u32) -> Note {
        Note {
            pitches: vec![Pitch::Abs(pitch)],
            dots,
        }
    }

    fn rest(dots: u32) -> Note {
        Note {
            pitches: Vec::new(),
            dots,
        }
    }

    fn label(volume: u8, interpolation: Interpolation, note_index: usize) -> TrackLabel {
        TrackLabel {
            name: format!("at{note_index}"),
            volume,
            interpolation,
            note_index,
        }
    }

    fn render(tracks: &[Track]) -> Vec<u8> {
        let mut backend =
            Backend::init(Vec::new(), &MidiConfig::default(), tracks.len()).unwrap();
        emit_tracks(&mut backend, tracks).unwrap();
        backend.dump_to_file().unwrap();
        backend.free()
    }

    fn volumes(bytes: &[u8], channel: u8) -> Vec<u8> {
        bytes
            .windows(3)
            .filter(|w| w[0] == (0xB0 | channel) && w[1] == 0x07)
            .map(|w| w[2])
            .collect()
    }

    #[test]
    fn spans_run_to_next_label() {
        let track = Track {
            notes: vec![note(60, 3); 5],
            config: SecConfig::default(),
            labels: vec![
                label(20, Interpolation::Linear, 0),
                label(60, Interpolation::Zoom, 2),
            ],
        };
        assert_eq!(
            label_spans(&track),
            vec![
                LabelSpan {
                    at: 0,
                    start: 20,
                    end: 60,
                    duration: 2,
                    interpolation: Interpolation::Linear,
                },
                LabelSpan {
                    at: 2,
                    start: 60,
                    end: 60,
                    duration: 3,
                    interpolation: Interpolation::Hold,
                },
            ]
        );
    }

    #[test]
    fn empty_spans_are_dropped() {
        let track = Track {
            notes: vec![note(60, 3); 2],
            config: SecConfig::default(),
            labels: vec![
                label(10, Interpolation::Linear, 0),
                label(20, Interpolation::Linear, 0),
                label(30, Interpolation::Hold, 2),
            ],
        };
        let spans = label_spans(&track);
        assert_eq!(spans.len(), 1);
        assert_eq!((spans[0].start, spans[0].end, spans[0].duration), (20, 30, 2));
    }

    #[test]
    fn automation_emits_one_volume_per_note() {
        let track = Track {
            notes: vec![note(60, 3), rest(3), note(62, 3), note(64, 3)],
            config: SecConfig::default(),
            labels: vec![
                label(20, Interpolation::Linear, 0),
                label(60, Interpolation::Hold, 2),
            ],
        };
        let bytes = render(&[track]);
        assert_eq!(volumes(&bytes, 0), vec![80, 20, 40, 60, 60]);
    }

    #[test]
    fn tempo_comes_from_first_track_only() {
        let fast = Track {
            notes: vec![note(60, 3)],
            config: SecConfig {
                bpm: 150,
                ..SecConfig::default()
            },
            labels: Vec::new(),
        };
        let slow = Track {
            config: SecConfig {
                bpm: 60,
                instrument: 40,
                ..SecConfig::default()
            },
            ..fast.clone()
        };
        let bytes = render(&[fast, slow]);
        let tempo_events = bytes.windows(3).filter(|w| *w == [0xFF, 0x51, 0x03]).count();
        assert_eq!(tempo_events, 1);
        // 60_000_000 / 150 = 400_000 = 0x061A80
        assert!(bytes.windows(3).any(|w| w == [0x06, 0x1A, 0x80]));
        // Second track's program change on channel 1.
        assert!(bytes.windows(3).any(|w| w == [0x00, 0xC1, 40]));
    }

    #[test]
    fn rest_between_notes_becomes_delta() {
        let track = Track {
            notes: vec![note(60, 3), rest(2), note(62, 3)],
            config: SecConfig::default(),
            labels: Vec::new(),
        };
        let bytes = render(&[track]);
        // Rest of 240 ticks (81 70) precedes the second NoteOn.
        assert!(bytes
            .windows(5)
            .any(|w| w == [0x81, 0x70, 0x90, 62, 64]));
    }

    #[test]
    fn unresolvable_degree_is_reported() {
        let track = Track {
            notes: vec![Note {
                pitches: vec![Pitch::Degree {
                    degree: 1,
                    shift: i32::MAX,
                }],
                dots: 1,
            }],
            config: SecConfig::default(),
            labels: Vec::new(),
        };
        let mut backend = Backend::init(Vec::new(), &MidiConfig::default(), 1).unwrap();
        let err = emit_tracks(&mut backend, &[track]).unwrap_err();
        assert!(matches!(err, BackendError::PitchOverflow { track: 0, note: 0 }));
    }

    #[test]
    fn no_tracks_writes_only_header() {
        let bytes = render(&[]);
        assert_eq!(bytes.len(), 14);
    }
}
