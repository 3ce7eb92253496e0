//! Top-level CLI parser and global options.

use clap::Parser;

use crate::commands::Commands;

/// Command-line interface for the OCR serving stack supervisor.
#[derive(Parser)]
#[command(name = "ocrstack")]
#[command(about = "Launch and supervise the OCR inference stack")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
