//! Command-line argument definitions for the OpenChart CLI.
//!
//! [`Cli`] is parsed with [`clap`]. Every subcommand that reads a diagram
//! takes the diagram path plus an optional schema path; a schema given in
//! the configuration file is used when the flag is absent.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the OpenChart diagram tool
#[derive(Parser, Debug)]
#[command(name = "openchart", author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (TOML)
    #[arg(short, long, global = true, env = "OPENCHART_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Schema selection shared by all subcommands
#[derive(Args, Debug, Clone, Default)]
pub struct SchemaArgs {
    /// Schema file, or a directory searched for `.ocs` schema files
    #[arg(short, long)]
    pub schema: Option<PathBuf>,
}

/// A diagram file and the schema it was made with
#[derive(Args, Debug, Clone)]
pub struct DiagramArgs {
    /// Path to the diagram file
    pub file: PathBuf,

    #[command(flatten)]
    pub schema: SchemaArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an empty diagram
    New {
        #[command(flatten)]
        schema: SchemaArgs,

        /// Output path (defaults to a name derived from the schema id)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show object counts by kind
    Inspect(DiagramArgs),

    /// Print the diagram as nodes and edges
    Graph(DiagramArgs),

    /// Validate a diagram
    Check {
        #[command(flatten)]
        diagram: DiagramArgs,

        /// Fail on warnings too
        #[arg(long)]
        strict: bool,
    },

    /// Import and re-export a diagram and compare the result
    Roundtrip {
        #[command(flatten)]
        diagram: DiagramArgs,

        /// Write the re-exported diagram here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_check() {
        let cli = Cli::parse_from([
            "openchart", "check", "flow.ocd", "--schema", "schemas", "--strict", "-v",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Command::Check { diagram, strict } => {
                assert!(strict);
                assert_eq!(diagram.file, PathBuf::from("flow.ocd"));
                assert_eq!(diagram.schema.schema, Some(PathBuf::from("schemas")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_new_without_schema() {
        let cli = Cli::parse_from(["openchart", "new", "-o", "out.ocd"]);
        match cli.command {
            Command::New { schema, output } => {
                assert!(schema.schema.is_none());
                assert_eq!(output, Some(PathBuf::from("out.ocd")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
