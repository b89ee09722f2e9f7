//! The defcheck command-line interface.
//!
//! This module is the main entry point for all CLI commands and orchestrates
//! the core library functions.

use std::fs;
use std::io::Write;
use std::path::Path;

use clap::Parser;
use once_cell::sync::Lazy;
use regex::Regex;
use termcolor::{ColorChoice, StandardStream};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::catalog::Catalog;
use crate::cli::args::{Command, DefcheckArgs, InvocationArgs};
use crate::compiler::{check, compile, Outcome};
use crate::config::Config;
use crate::errors::{DefcheckError, DefcheckResult};
use crate::invocation::Invocation;
use crate::suite::run_path;
use crate::value::Value;

pub mod args;
pub mod output;

/// Exit status when the checked declaration (or any suite case) failed.
pub const EXIT_FAILED: i32 = 1;
/// Exit status when the tool itself could not do its job.
pub const EXIT_ERROR: i32 = 2;

static PARAM_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("parameter name pattern is valid"));

/// The main entry point for the CLI. Returns the process exit status.
pub fn run() -> i32 {
    let args = DefcheckArgs::parse();
    init_tracing(args.verbose);

    match dispatch(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            EXIT_ERROR
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn dispatch(args: DefcheckArgs) -> DefcheckResult<i32> {
    let cwd = std::env::current_dir().map_err(|e| DefcheckError::io("read", ".", e))?;
    let config = Config::discover(args.config.as_deref(), &cwd)?;
    let color = args.color.unwrap_or(config.color).to_color_choice();
    let catalog = build_catalog(&config, &args.definitions, args.no_builtin)?;
    debug!(definitions = catalog.len(), "catalog ready");

    match args.command {
        Command::Check(inv_args) => handle_check(&catalog, &inv_args, color),
        Command::Show(inv_args) => handle_show(&catalog, &inv_args, color),
        Command::Test { path, json } => {
            let path = path.unwrap_or_else(|| config.suites.clone());
            handle_test(&catalog, &path, json, color)
        }
        Command::List { json } => handle_list(&catalog, json, color),
    }
}

/// Builtin definitions (unless disabled), then config paths, then `-d` paths.
fn build_catalog(
    config: &Config,
    extra: &[std::path::PathBuf],
    no_builtin: bool,
) -> DefcheckResult<Catalog> {
    let mut catalog = if config.builtin && !no_builtin {
        Catalog::builtin()?
    } else {
        Catalog::new()
    };
    for path in config.definitions.iter().chain(extra) {
        catalog.load_path(path)?;
    }
    Ok(catalog)
}

/// Builds an invocation from positional arguments, `--params-file`, and `-p`.
pub fn invocation_from_args(args: &InvocationArgs) -> DefcheckResult<Invocation> {
    let mut invocation = Invocation::new(&args.definition, &args.title);

    if let Some(path) = &args.params_file {
        let text = fs::read_to_string(path).map_err(|e| DefcheckError::io("read", path, e))?;
        let params: std::collections::BTreeMap<String, Value> = if text.trim().is_empty() {
            Default::default()
        } else {
            serde_yaml::from_str(&text).map_err(|e| DefcheckError::InvalidArgument {
                message: format!("{} is not a YAML mapping of parameters: {}", path.display(), e),
                help: Some("write one `name: value` pair per line".to_string()),
            })?
        };
        invocation = invocation.with_params(params);
    }

    for raw in &args.params {
        let (key, value) = parse_param(raw)?;
        invocation = invocation.with_param(key, value);
    }
    Ok(invocation)
}

/// Splits `key=value`, parsing the value as a YAML scalar.
pub fn parse_param(raw: &str) -> DefcheckResult<(String, Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(DefcheckError::InvalidArgument {
            message: format!("'{}' is not KEY=VALUE", raw),
            help: Some("e.g. -p user=bob".to_string()),
        });
    };
    let key = key.trim();
    if !PARAM_NAME.is_match(key) {
        return Err(DefcheckError::InvalidArgument {
            message: format!("'{}' is not a valid parameter name", key),
            help: Some("parameter names are lowercase letters, digits, and '_'".to_string()),
        });
    }
    Ok((key.to_string(), Value::from_cli(value)))
}

fn handle_check(
    catalog: &Catalog,
    args: &InvocationArgs,
    color: ColorChoice,
) -> DefcheckResult<i32> {
    let invocation = invocation_from_args(args)?;
    let outcome = check(catalog, &invocation);

    if args.json {
        print_json(&outcome)?;
    } else {
        let mut stdout = StandardStream::stdout(color);
        output::print_outcome(&mut stdout, &invocation, &outcome).map_err(stdout_error)?;
    }

    Ok(match outcome {
        Outcome::Compiled => 0,
        Outcome::Failed(_) => EXIT_FAILED,
    })
}

fn handle_show(
    catalog: &Catalog,
    args: &InvocationArgs,
    color: ColorChoice,
) -> DefcheckResult<i32> {
    let invocation = invocation_from_args(args)?;
    match compile(catalog, &invocation) {
        Ok(resource) if args.json => {
            print_json(&resource)?;
            Ok(0)
        }
        Ok(resource) => {
            let mut stdout = StandardStream::stdout(color);
            output::print_resource(&mut stdout, &resource).map_err(stdout_error)?;
            Ok(0)
        }
        Err(failure) => {
            eprintln!("{:?}", miette::Report::new(failure));
            Ok(EXIT_FAILED)
        }
    }
}

fn handle_test(
    catalog: &Catalog,
    path: &Path,
    json: bool,
    color: ColorChoice,
) -> DefcheckResult<i32> {
    let summary = run_path(catalog, path)?;
    if json {
        print_json(&summary)?;
    } else {
        let mut stdout = StandardStream::stdout(color);
        output::print_summary(&mut stdout, &summary).map_err(stdout_error)?;
    }
    Ok(if summary.is_success() { 0 } else { EXIT_FAILED })
}

fn handle_list(catalog: &Catalog, json: bool, color: ColorChoice) -> DefcheckResult<i32> {
    if json {
        print_json(catalog)?;
    } else {
        let mut stdout = StandardStream::stdout(color);
        output::print_catalog(&mut stdout, catalog).map_err(stdout_error)?;
    }
    Ok(0)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> DefcheckResult<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)
        .map_err(|e| stdout_error(std::io::Error::from(e)))?;
    writeln!(stdout).map_err(stdout_error)
}

fn stdout_error(e: std::io::Error) -> DefcheckError {
    DefcheckError::io("write", "<stdout>", e)
}
