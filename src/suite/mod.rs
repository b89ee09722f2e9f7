//! Declarative check suites.
//!
//! A suite is a YAML document describing one definition, a title, a base
//! parameter mapping, and a list of contexts that tweak the parameters and say
//! what the compiler check should report:
//!
//! ```yaml
//! definition: puppet_nonroot
//! title: nra.puppet
//! params:
//!   user: bob
//!   puppet_master_fqdn: puppet.fake
//!   challenge_password: top_secret
//! contexts:
//!   - name: with default values for all parameters
//!     expect: compile
//!   - name: without a user
//!     without: [user]
//!     expect: { fail: missing_required_parameter }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::compiler::{FailureReason, Outcome};
use crate::errors::{DefcheckError, DefcheckResult};
use crate::invocation::Invocation;
use crate::value::Value;

pub mod discovery;
pub mod runner;

pub use discovery::discover_suite_files;
pub use runner::{run_path, run_suite, CaseReport, SuiteSummary};

/// Title used when a suite does not name one.
pub const DEFAULT_TITLE: &str = "title";

/// What a case expects the compiler check to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawExpectation", into = "RawExpectation")]
pub enum Expectation {
    #[default]
    Compile,
    Fail(FailureReason),
}

impl Expectation {
    pub fn matches(&self, outcome: &Outcome) -> bool {
        match (self, outcome) {
            (Expectation::Compile, Outcome::Compiled) => true,
            (Expectation::Fail(reason), Outcome::Failed(failure)) => failure.reason == *reason,
            _ => false,
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Compile => write!(f, "compile"),
            Expectation::Fail(reason) => write!(f, "fail with {}", reason),
        }
    }
}

/// Wire form of an expectation: `compile` or `{ fail: <reason> }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawExpectation {
    Word(String),
    Fail { fail: String },
}

impl TryFrom<RawExpectation> for Expectation {
    type Error = String;

    fn try_from(raw: RawExpectation) -> Result<Self, Self::Error> {
        match raw {
            RawExpectation::Word(word) if word == "compile" => Ok(Expectation::Compile),
            RawExpectation::Word(word) => Err(format!(
                "unknown expectation '{}', expected 'compile' or {{ fail: <reason> }}",
                word
            )),
            RawExpectation::Fail { fail } => FailureReason::parse(&fail)
                .map(Expectation::Fail)
                .ok_or_else(|| format!("unknown failure reason '{}'", fail)),
        }
    }
}

impl From<Expectation> for RawExpectation {
    fn from(expectation: Expectation) -> Self {
        match expectation {
            Expectation::Compile => RawExpectation::Word("compile".to_string()),
            Expectation::Fail(reason) => RawExpectation::Fail {
                fail: reason.as_str().to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SuiteDocument {
    definition: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    params: BTreeMap<String, Value>,
    #[serde(default)]
    contexts: Vec<ContextDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ContextDocument {
    name: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    params: BTreeMap<String, Value>,
    #[serde(default)]
    without: Vec<String>,
    #[serde(default)]
    expect: Expectation,
}

/// One resolved check case.
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub name: String,
    pub invocation: Invocation,
    pub expect: Expectation,
}

/// A parsed suite file.
#[derive(Debug, Clone)]
pub struct Suite {
    pub path: PathBuf,
    pub definition: String,
    pub cases: Vec<Case>,
}

impl Suite {
    /// Parses a suite document. `path` is only used for reporting.
    pub fn from_yaml(path: impl Into<PathBuf>, text: &str) -> DefcheckResult<Suite> {
        let path = path.into();
        let doc: SuiteDocument = serde_yaml::from_str(text).map_err(|e| {
            let message = match e.location() {
                Some(loc) => format!("{} (line {}, column {})", e, loc.line(), loc.column()),
                None => e.to_string(),
            };
            DefcheckError::SuiteFormat {
                path: path.clone(),
                message,
                help: Some(
                    "suites have the keys definition, title, params, and contexts".to_string(),
                ),
            }
        })?;

        let base = Invocation::new(
            doc.definition.clone(),
            doc.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        )
        .with_params(doc.params);

        let cases = if doc.contexts.is_empty() {
            vec![Case {
                name: "compiles".to_string(),
                invocation: base,
                expect: Expectation::Compile,
            }]
        } else {
            let mut seen = std::collections::HashSet::new();
            let mut cases = Vec::with_capacity(doc.contexts.len());
            for context in doc.contexts {
                if !seen.insert(context.name.clone()) {
                    return Err(DefcheckError::SuiteFormat {
                        path,
                        message: format!("context '{}' appears more than once", context.name),
                        help: None,
                    });
                }
                let mut invocation = base.with_params(context.params);
                for key in &context.without {
                    invocation = invocation.without_param(key);
                }
                if let Some(title) = context.title {
                    invocation = invocation.with_title(title);
                }
                cases.push(Case {
                    name: context.name,
                    invocation,
                    expect: context.expect,
                });
            }
            cases
        };

        Ok(Suite {
            path,
            definition: doc.definition,
            cases,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> DefcheckResult<Suite> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|e| DefcheckError::io("read", path, e))?;
        Suite::from_yaml(path, &text)
    }
}
