//! Defines the command-line arguments and subcommands for the defcheck CLI.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::config::ColorMode;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "defcheck",
    version,
    about = "Compile-check parameterized configuration definitions."
)]
pub struct DefcheckArgs {
    /// Configuration file (defaults to ./defcheck.yaml when present).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Extra manifest file or directory to load definitions from.
    #[arg(short = 'd', long = "definitions", global = true, value_name = "PATH")]
    pub definitions: Vec<PathBuf>,

    /// Do not load the bundled definitions.
    #[arg(long, global = true)]
    pub no_builtin: bool,

    /// When to color output.
    #[arg(long, global = true, value_enum)]
    pub color: Option<ColorMode>,

    /// Log more (-v for info, -vv for debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check whether a declaration compiles.
    Check(InvocationArgs),
    /// Print the resolved declaration, defaults included.
    Show(InvocationArgs),
    /// Discover and run all check suites under a path.
    Test {
        /// Suite file or directory (defaults to the configured suites path).
        path: Option<PathBuf>,

        /// Print the results as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List all known definitions and their parameters.
    List {
        /// Print the catalog as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// A declaration given on the command line.
#[derive(Debug, Args)]
pub struct InvocationArgs {
    /// Definition name, e.g. `puppet_nonroot`.
    pub definition: String,

    /// Resource title.
    pub title: String,

    /// Parameter as KEY=VALUE; values use YAML scalar syntax.
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// YAML mapping of parameters, applied before any -p.
    #[arg(long, value_name = "FILE")]
    pub params_file: Option<PathBuf>,

    /// Print the result as JSON.
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        DefcheckArgs::command().debug_assert();
    }

    #[test]
    fn parses_check_with_params() {
        let args = DefcheckArgs::try_parse_from([
            "defcheck",
            "--no-builtin",
            "-d",
            "manifests",
            "check",
            "puppet_nonroot",
            "nra.puppet",
            "-p",
            "user=bob",
            "--param",
            "run_interval=600",
        ])
        .unwrap();
        assert!(args.no_builtin);
        assert_eq!(args.definitions, vec![PathBuf::from("manifests")]);
        let Command::Check(inv) = args.command else {
            panic!("expected check");
        };
        assert_eq!(inv.definition, "puppet_nonroot");
        assert_eq!(inv.params, vec!["user=bob", "run_interval=600"]);
    }
}
