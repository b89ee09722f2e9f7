//! Tool-level errors for defcheck.
//!
//! These are the failures of the *tool* (unreadable files, malformed manifests,
//! bad suite documents). A definition that does not compile is not an error in
//! this sense; it is a [`Failure`](crate::compiler::Failure) value returned by the
//! compiler check.
//!
//! Every variant carries a stable `defcheck::<area>::<kind>` diagnostic code so
//! the CLI can render it through `miette`.

use std::path::PathBuf;
use std::sync::Arc;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Type alias for shared, named manifest sources.
pub type SourceArc = Arc<NamedSource<String>>;

/// Result alias used across the library.
pub type DefcheckResult<T> = Result<T, DefcheckError>;

#[derive(Debug, Error, Diagnostic)]
pub enum DefcheckError {
    #[error("failed to {operation} '{path}'")]
    #[diagnostic(code(defcheck::io))]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
        #[help]
        help: Option<String>,
    },

    #[error("syntax error: {message}")]
    #[diagnostic(code(defcheck::parse::syntax))]
    Syntax {
        message: String,
        #[source_code]
        src: SourceArc,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("invalid definition '{definition}': {message}")]
    #[diagnostic(code(defcheck::schema::invalid))]
    Schema {
        definition: String,
        message: String,
        #[source_code]
        src: SourceArc,
        #[label("{message}")]
        span: SourceSpan,
        #[help]
        help: Option<String>,
    },

    #[error("definition '{name}' is defined more than once")]
    #[diagnostic(
        code(defcheck::catalog::duplicate),
        help("definition names must be unique across all loaded manifests")
    )]
    DuplicateDefinition { name: String },

    #[error("invalid suite '{path}': {message}")]
    #[diagnostic(code(defcheck::suite::format))]
    SuiteFormat {
        path: PathBuf,
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("invalid configuration '{path}': {message}")]
    #[diagnostic(code(defcheck::config::invalid))]
    Config { path: PathBuf, message: String },

    #[error("invalid argument: {message}")]
    #[diagnostic(code(defcheck::cli::argument))]
    InvalidArgument {
        message: String,
        #[help]
        help: Option<String>,
    },
}

impl DefcheckError {
    /// Wraps an I/O failure on a path.
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let help = match source.kind() {
            std::io::ErrorKind::NotFound => Some("check that the path exists".to_string()),
            std::io::ErrorKind::PermissionDenied => {
                Some("check that the path is readable".to_string())
            }
            _ => None,
        };
        DefcheckError::Io {
            operation,
            path: path.into(),
            source,
            help,
        }
    }

    /// Wraps a directory-walk failure under `root`.
    pub fn walk(root: &std::path::Path, error: walkdir::Error) -> Self {
        let path = error.path().unwrap_or(root).to_path_buf();
        let source = error
            .into_io_error()
            .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "filesystem loop"));
        DefcheckError::io("walk", path, source)
    }
}

/// Builds a shared named source for diagnostics.
pub fn named_source(name: impl AsRef<str>, content: impl Into<String>) -> SourceArc {
    Arc::new(NamedSource::new(name, content.into()))
}

/// Converts a byte range into a miette span.
pub fn to_source_span(start: usize, end: usize) -> SourceSpan {
    SourceSpan::from(start..end.max(start))
}
