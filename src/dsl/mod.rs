//! Notation compiler: source → tokens → AST → type table → tracks → SMF bytes.

pub mod ast;
pub mod check;
pub mod compile;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod token;

use std::io::Write;

use tracing::info;

pub use ast::*;
pub use error::{CompileError, ErrorKind};

use crate::error::Result;
use crate::eval::{eval_program, Track};
use crate::midi::{Backend, MidiConfig};
use crate::types::TypeTable;
use compile::emit_tracks;
use lexer::Lexer;
use parser::Parser;

/// The notation compiler.
///
/// Runs the whole pipeline for one source text. Nothing is written to the
/// sink unless every stage succeeds.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    config: MidiConfig,
}

impl Compiler {
    pub fn new(config: MidiConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MidiConfig {
        &self.config
    }

    /// Parse source into a Program AST.
    pub fn parse(source: &str) -> Result<Program, CompileError> {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.tokenize()?;
        Parser::new(tokens).parse()
    }

    /// Parse and type-check source.
    pub fn check(source: &str) -> Result<(Program, TypeTable), CompileError> {
        let program = Self::parse(source)?;
        let table = check::check(&program)?;
        Ok((program, table))
    }

    /// Evaluate source into one track per section of `main`.
    pub fn evaluate(source: &str) -> Result<Vec<Track>> {
        let (program, table) = Self::check(source)?;
        eval_program(&program, &table)
    }

    /// Compile source and write the MIDI file to `sink`, returning the sink.
    pub fn compile_to<W: Write>(&self, source: &str, sink: W) -> Result<W> {
        let tracks = Self::evaluate(source)?;
        info!(tracks = tracks.len(), "compiled program");
        let mut backend = Backend::init(sink, &self.config, tracks.len())?;
        emit_tracks(&mut backend, &tracks)?;
        backend.dump_to_file()?;
        Ok(backend.free())
    }

    /// Compile source into the bytes of a MIDI file.
    pub fn compile(&self, source: &str) -> Result<Vec<u8>> {
        self.compile_to(source, Vec::new())
    }
}
