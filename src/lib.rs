//! modal: a compiler from scale-relative music notation to Standard MIDI
//! Files.
//!
//! Source is lexed and parsed into an arena AST ([`dsl`]), type-checked
//! against the lattice in [`types`], evaluated into per-section tracks
//! ([`eval`]), lowered to MIDI events ([`event`], [`automation`]) and
//! serialized by the [`midi`] backend.

pub mod automation;
pub mod dsl;
pub mod error;
pub mod eval;
pub mod event;
pub mod midi;
pub mod theory;
pub mod types;

pub use error::{Error, Result};
