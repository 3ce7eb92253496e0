//! CLI adapter for the OCR serving stack supervisor.

pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;

pub use commands::{Commands, RunArgs};
pub use error::CliError;
pub use parser::Cli;
