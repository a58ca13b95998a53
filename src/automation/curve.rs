//! Interpolation curves for label-driven automation.
//!
//! Each curve maps a normalized position in `[0.0, 1.0]` to an output in
//! `[0.0, 1.0]`, which is then scaled to the span's start/end values.

/// How a label's value moves toward the next label's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Stay at the start value for the whole span.
    #[default]
    Hold,
    Linear,
    /// Quadratic ease-in.
    Zoom,
}

impl Interpolation {
    /// Look up an interpolation by its label keyword.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "linear" => Some(Interpolation::Linear),
            "zoom" => Some(Interpolation::Zoom),
            _ => None,
        }
    }
}

/// Apply a curve to a normalized value in `[0.0, 1.0]`.
///
/// Values are clamped to `[0.0, 1.0]` before applying the curve.
pub fn apply_curve(kind: Interpolation, t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    match kind {
        Interpolation::Hold => 0.0,
        Interpolation::Linear => t,
        Interpolation::Zoom => t * t,
    }
}

/// Map a normalized value through a curve to a target range.
pub fn map_value(kind: Interpolation, t: f64, range: (f64, f64)) -> f64 {
    let curved = apply_curve(kind, t);
    range.0 + curved * (range.1 - range.0)
}

/// Value at `step` of a `duration`-note span from `start` toward `end`,
/// rounded and clamped to the MIDI data range.
pub fn interpolate(kind: Interpolation, start: u8, end: u8, step: usize, duration: usize) -> u8 {
    if duration == 0 {
        return start.min(127);
    }
    let t = step as f64 / duration as f64;
    let v = map_value(kind, t, (start as f64, end as f64));
    v.round().clamp(0.0, 127.0) as u8
}
