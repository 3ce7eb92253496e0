//! CLI entry point.
//!
//! Parses arguments, wires up logging, and dispatches to handlers. The
//! process exit code comes from the supervisor outcome for `run`, and
//! from `CliError` mappings for everything that fails before a run.

use std::process::ExitCode;

use clap::Parser;

use ocrstack_cli::{Cli, Commands, handlers};

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables before clap reads env fallbacks
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Some(Commands::Run(args)) => handlers::run::execute(&args).await,
        Some(Commands::Paths) => handlers::paths::execute().map(|()| 0),
        None => {
            use clap::CommandFactory;
            let _ = Cli::command().print_help();
            Ok(0)
        }
    };

    match result {
        Ok(code) => to_exit_code(code),
        Err(e) => {
            eprintln!("Error: {e}");
            to_exit_code(e.exit_code())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn to_exit_code(code: i32) -> ExitCode {
    u8::try_from(code).map_or(ExitCode::FAILURE, ExitCode::from)
}
