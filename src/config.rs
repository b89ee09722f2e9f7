//! Project configuration (`defcheck.yaml`).
//!
//! ```yaml
//! definitions: [manifests]   # extra manifest files or directories
//! suites: spec               # default path for `defcheck test`
//! builtin: true              # include the bundled definitions
//! color: auto                # auto | always | never
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::errors::{DefcheckError, DefcheckResult};

/// File looked up in the working directory when `--config` is not given.
pub const CONFIG_FILE_NAME: &str = "defcheck.yaml";

/// Suites path used when neither the command line nor the config names one.
pub const DEFAULT_SUITES_DIR: &str = "spec";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    /// Resolves `Auto` against whether stdout is a terminal.
    pub fn to_color_choice(self) -> termcolor::ColorChoice {
        match self {
            ColorMode::Always => termcolor::ColorChoice::Always,
            ColorMode::Never => termcolor::ColorChoice::Never,
            ColorMode::Auto if atty::is(atty::Stream::Stdout) => termcolor::ColorChoice::Auto,
            ColorMode::Auto => termcolor::ColorChoice::Never,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub definitions: Vec<PathBuf>,
    pub suites: PathBuf,
    pub builtin: bool,
    pub color: ColorMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            definitions: Vec::new(),
            suites: PathBuf::from(DEFAULT_SUITES_DIR),
            builtin: true,
            color: ColorMode::Auto,
        }
    }
}

impl Config {
    pub fn from_yaml(path: &Path, text: &str) -> DefcheckResult<Config> {
        let mut config: Config = if text.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(text).map_err(|e| DefcheckError::Config {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        };
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.definitions = config
            .definitions
            .iter()
            .map(|p| resolve(base, p))
            .collect();
        config.suites = resolve(base, &config.suites);
        Ok(config)
    }

    pub fn load(path: &Path) -> DefcheckResult<Config> {
        let text = fs::read_to_string(path).map_err(|e| DefcheckError::io("read", path, e))?;
        debug!(path = %path.display(), "loaded configuration");
        Config::from_yaml(path, &text)
    }

    /// Loads `explicit` if given (it must exist), else `defcheck.yaml` in `dir`
    /// if present, else the defaults.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> DefcheckResult<Config> {
        if let Some(path) = explicit {
            return Config::load(path);
        }
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Config::load(&candidate);
        }
        Ok(Config::default())
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() || base.as_os_str().is_empty() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
