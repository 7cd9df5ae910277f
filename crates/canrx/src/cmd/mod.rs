use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod classify;
pub mod replay;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show which bucket a filter lands in.
    Classify(ClassifyArgs),
    /// Feed a recorded log through the engine and print matches.
    Replay(ReplayArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Classify(args) => classify::run(args, format),
        Command::Replay(args) => replay::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Filter identifier, hex (flag bits included).
    pub id: String,
    /// Filter mask, hex.
    pub mask: String,
    /// Match identifiers that differ from the filter.
    #[arg(long)]
    pub invert: bool,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Log file to read. Default: stdin.
    pub file: Option<PathBuf>,
    /// Receiver filter, `[IFACE,]ID:MASK`, `ID~MASK` or `#ERRMASK`. Repeatable.
    #[arg(long = "filter", short = 'f', value_name = "FILTER", required = true)]
    pub filters: Vec<String>,
    /// Input is binary 16-byte frame records instead of a candump log.
    #[arg(long, requires = "bus")]
    pub binary: bool,
    /// Interface binary records were received on.
    #[arg(long, value_name = "IFACE")]
    pub bus: Option<String>,
    /// Stop after N input frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
