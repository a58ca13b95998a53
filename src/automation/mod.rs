//! Label-driven automation.
//!
//! A label starts a span of notes over which a continuous parameter ramps
//! from the label's value toward the next label's value. Spans are
//! registered per track against the note index where they begin; while
//! serializing, the track's [`AutomationSchedule`] activates a span when its
//! first note starts and yields one value per note until the span ends.
//! Only one span may be active per track at a time.

pub mod curve;

use std::collections::BTreeMap;

use tracing::trace;

pub use curve::{apply_curve, interpolate, map_value, Interpolation};

use crate::midi::error::BackendError;

/// Parameter driven by an automation span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutomationTarget {
    Volume,
}

/// One registered ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Automation {
    pub target: AutomationTarget,
    pub start: u8,
    pub end: u8,
    pub duration: usize,
    pub interpolation: Interpolation,
}

impl Automation {
    pub fn value_at(&self, step: usize) -> u8 {
        interpolate(self.interpolation, self.start, self.end, step, self.duration)
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveSpan {
    automation: Automation,
    start: usize,
    step: usize,
}

/// Registered spans of one track plus its single active slot.
#[derive(Debug, Clone, Default)]
pub struct AutomationSchedule {
    track: usize,
    pending: BTreeMap<usize, Automation>,
    active: Option<ActiveSpan>,
}

impl AutomationSchedule {
    pub fn new(track: usize) -> Self {
        Self {
            track,
            ..Self::default()
        }
    }

    /// Register `automation` to begin at note index `start`.
    pub fn register(&mut self, start: usize, automation: Automation) -> Result<(), BackendError> {
        if automation.duration == 0 {
            return Err(BackendError::EmptyAutomation {
                track: self.track,
                start,
            });
        }
        let end = start + automation.duration;
        let overlapping = self
            .pending
            .iter()
            .find(|(s, a)| start < **s + a.duration && **s < end);
        if let Some((&existing, _)) = overlapping {
            return Err(BackendError::AutomationOverlap {
                track: self.track,
                start,
                existing,
            });
        }
        self.pending.insert(start, automation);
        Ok(())
    }

    /// Check that every registered span ends within `note_count` notes.
    pub fn validate(&self, note_count: usize) -> Result<(), BackendError> {
        for (&start, a) in &self.pending {
            let end = start + a.duration;
            if end > note_count {
                return Err(BackendError::AutomationOutOfRange {
                    track: self.track,
                    start,
                    end,
                    notes: note_count,
                });
            }
        }
        Ok(())
    }

    /// Advance to note `index`, returning the value to emit before it, if any.
    ///
    /// Activates a span registered at `index`, yields its current value and
    /// frees the slot after the span's last note.
    pub fn on_note_start(
        &mut self,
        index: usize,
    ) -> Result<Option<(AutomationTarget, u8)>, BackendError> {
        if let Some(&automation) = self.pending.get(&index) {
            if self.active.is_some() {
                return Err(BackendError::AutomationSlotBusy {
                    track: self.track,
                    start: index,
                });
            }
            self.active = Some(ActiveSpan {
                automation,
                start: index,
                step: 0,
            });
        }

        let Some(span) = self.active.as_mut() else {
            return Ok(None);
        };
        let value = span.automation.value_at(span.step);
        let target = span.automation.target;
        trace!(
            track = self.track,
            span_start = span.start,
            step = span.step,
            value,
            "automation step"
        );
        span.step += 1;
        if span.step == span.automation.duration {
            self.active = None;
        }
        Ok(Some((target, value)))
    }

    /// Rewind the active slot so the schedule can be replayed.
    pub fn reset(&mut self) {
        self.active = None;
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(start: u8, end: u8, duration: usize) -> Automation {
        Automation {
            target: AutomationTarget::Volume,
            start,
            end,
            duration,
            interpolation: Interpolation::Linear,
        }
    }

    #[test]
    fn span_emits_exactly_duration_values() {
        let mut s = AutomationSchedule::new(0);
        s.register(2, ramp(20, 60, 4)).unwrap();
        let mut emitted = Vec::new();
        for idx in 0..10 {
            if let Some((_, v)) = s.on_note_start(idx).unwrap() {
                emitted.push((idx, v));
            }
        }
        assert_eq!(emitted, vec![(2, 20), (3, 30), (4, 40), (5, 50)]);
        assert!(!s.is_active());
    }

    #[test]
    fn slot_frees_after_last_note() {
        let mut s = AutomationSchedule::new(0);
        s.register(0, ramp(10, 10, 1)).unwrap();
        assert!(s.on_note_start(0).unwrap().is_some());
        assert!(!s.is_active());
        assert!(s.on_note_start(1).unwrap().is_none());
    }

    #[test]
    fn adjacent_spans_hand_over() {
        let mut s = AutomationSchedule::new(0);
        s.register(0, ramp(0, 100, 2)).unwrap();
        s.register(2, ramp(100, 100, 1)).unwrap();
        let values: Vec<u8> = (0..3)
            .filter_map(|i| s.on_note_start(i).unwrap().map(|(_, v)| v))
            .collect();
        assert_eq!(values, vec![0, 50, 100]);
    }

    #[test]
    fn overlapping_registration_is_rejected() {
        let mut s = AutomationSchedule::new(3);
        s.register(0, ramp(0, 100, 4)).unwrap();
        let err = s.register(2, ramp(0, 100, 1)).unwrap_err();
        assert!(matches!(
            err,
            BackendError::AutomationOverlap {
                track: 3,
                start: 2,
                existing: 0
            }
        ));
        // Same start is an overlap too.
        assert!(s.register(0, ramp(0, 1, 1)).is_err());
    }

    #[test]
    fn zero_duration_is_rejected() {
        let mut s = AutomationSchedule::new(0);
        assert!(matches!(
            s.register(0, ramp(1, 2, 0)),
            Err(BackendError::EmptyAutomation { .. })
        ));
    }

    #[test]
    fn validate_against_note_count() {
        let mut s = AutomationSchedule::new(0);
        s.register(1, ramp(0, 10, 3)).unwrap();
        assert!(s.validate(4).is_ok());
        assert!(matches!(
            s.validate(3),
            Err(BackendError::AutomationOutOfRange { end: 4, notes: 3, .. })
        ));
    }

    #[test]
    fn reset_clears_active_slot() {
        let mut s = AutomationSchedule::new(0);
        s.register(0, ramp(0, 10, 5)).unwrap();
        s.on_note_start(0).unwrap();
        assert!(s.is_active());
        s.reset();
        assert!(!s.is_active());
        assert_eq!(s.len(), 1);
    }
}
