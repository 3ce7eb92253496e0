//! Command handlers, one module per subcommand.

pub mod paths;
pub mod run;
