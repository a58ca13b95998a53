//! Crate-level error.
//!
//! Two classes: located semantic errors in the user's program, and internal
//! contract violations that mean an upstream pass handed over something it
//! should have rejected. The CLI prints the latter with an `internal error:`
//! prefix.

use thiserror::Error;

use crate::dsl::error::CompileError;
use crate::midi::error::BackendError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("internal error: {0}")]
    Contract(String),

    #[error("internal error: {0}")]
    Backend(BackendError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn contract(message: impl Into<String>) -> Self {
        Error::Contract(message.into())
    }

    /// Whether this is a contract violation rather than a problem with the
    /// user's program or environment.
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Contract(_) | Error::Backend(_))
    }
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Io(io) => Error::Io(io),
            other => Error::Backend(other),
        }
    }
}
