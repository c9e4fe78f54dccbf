//! # OpenChart CLI
//!
//! Command-line interface for OpenChart diagrams.
//!
//! ## Commands
//!
//! - `new` - Create an empty diagram from a schema
//! - `inspect` - Show object counts by kind
//! - `graph` - Print the diagram as nodes and edges
//! - `check` - Validate a diagram
//! - `roundtrip` - Import and re-export a diagram and compare the bytes
//!

mod args;
mod commands;
pub mod config;
pub mod schema;

pub use args::{Cli, Command, DiagramArgs, SchemaArgs};
pub use config::{CliConfig, load_config};

// Re-export dependencies for use in main.rs
pub use openchart_core;
pub use openchart_model;

use std::process::ExitCode;
use tracing::debug;

/// CLI version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Run a parsed command line
///
/// Returns the process exit code. `check` and `roundtrip` report failure
/// through the exit code rather than as an error.
pub fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;
    debug!("Using configuration {:?}", config);

    match &cli.command {
        Command::New { schema, output } => commands::new_diagram(schema, output.as_deref(), &config),
        Command::Inspect(args) => commands::inspect(args, &config),
        Command::Graph(args) => commands::graph(args, &config),
        Command::Check { diagram, strict } => commands::check(diagram, *strict, &config),
        Command::Roundtrip { diagram, output } => {
            commands::roundtrip(diagram, output.as_deref(), &config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "openchart_cli");
    }
}
