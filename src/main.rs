//! modal: compile scale-relative music notation to a Standard MIDI File.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use modal::dsl::Compiler;
use modal::midi::MidiConfig;

#[derive(Parser)]
#[command(name = "modal")]
#[command(about = "Compile scale-relative music notation to a Standard MIDI File")]
#[command(version)]
struct Cli {
    /// Source file to compile
    input: PathBuf,

    /// Output MIDI file (defaults to the input with a .mid extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Ticks per quarter note
    #[arg(long)]
    division: Option<u16>,

    /// Channel volume at the start of each track (0-127)
    #[arg(long)]
    volume: Option<u8>,

    /// Note velocity (0-127)
    #[arg(long)]
    velocity: Option<u8>,

    /// Config file (defaults to ~/.modal/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn resolve_config(cli: &Cli) -> Result<MidiConfig> {
    let mut config = match &cli.config {
        Some(path) => MidiConfig::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => MidiConfig::load().unwrap_or_default(),
    };
    if let Some(division) = cli.division {
        config.division = division;
    }
    if let Some(volume) = cli.volume {
        config.volume = volume;
    }
    if let Some(velocity) = cli.velocity {
        config.velocity = velocity;
    }
    config.validate()?;
    Ok(config)
}

fn output_path(cli: &Cli) -> PathBuf {
    cli.output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension("mid"))
}

fn run(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;
    debug!(?config, "resolved config");

    let source = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;
    let bytes = Compiler::new(config).compile(&source)?;

    let output = output_path(cli);
    write_output(&output, &bytes)?;
    info!(path = %output.display(), bytes = bytes.len(), "wrote MIDI file");
    Ok(())
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e:#}", cli.input.display());
            ExitCode::FAILURE
        }
    }
}
