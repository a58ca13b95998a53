//! Error types for the DSL frontend and evaluator.

use super::ast::Pos;

/// A located, user-facing compile error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("[{line}:{col}] {kind:?}: {message}")]
pub struct CompileError {
    pub message: String,
    pub line: usize,
    pub col: usize,
    pub kind: ErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    LexError,
    ParseError,
    TypeError,
    EvalError,
}

impl CompileError {
    pub fn lex(message: impl Into<String>, pos: Pos) -> Self {
        Self::new(ErrorKind::LexError, message, pos)
    }

    pub fn parse(message: impl Into<String>, pos: Pos) -> Self {
        Self::new(ErrorKind::ParseError, message, pos)
    }

    pub fn type_error(message: impl Into<String>, pos: Pos) -> Self {
        Self::new(ErrorKind::TypeError, message, pos)
    }

    pub fn eval(message: impl Into<String>, pos: Pos) -> Self {
        Self::new(ErrorKind::EvalError, message, pos)
    }

    fn new(kind: ErrorKind, message: impl Into<String>, pos: Pos) -> Self {
        Self {
            message: message.into(),
            line: pos.line,
            col: pos.col,
            kind,
        }
    }
}
