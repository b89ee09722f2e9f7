//! The definition compiler check.
//!
//! Resolves one [`Invocation`] against the schema of the definition it names
//! and reports whether the declaration would compile. Nothing is applied and
//! the body of the definition is never evaluated.
//!
//! Problems are reported in a fixed order so the same input always produces
//! the same failure:
//!
//! 1. empty title
//! 2. unknown definition
//! 3. missing required parameters (all of them, in declaration order)
//! 4. parameters the definition does not declare (all of them, sorted)
//! 5. values of the wrong type (the first one, in declaration order)

use std::fmt;
use std::thread;

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::catalog::Catalog;
use crate::invocation::{Invocation, Params};
use crate::schema::DefinitionSchema;

/// Parameters every resource accepts without declaring them.
pub const METAPARAMETERS: &[&str] = &[
    "alias", "audit", "before", "loglevel", "noop", "notify", "require", "schedule", "stage",
    "subscribe", "tag",
];

pub fn is_metaparameter(name: &str) -> bool {
    METAPARAMETERS.contains(&name)
}

/// Why a declaration does not compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    MissingRequiredParameter,
    InvalidValueType,
    UnknownDefinitionName,
    UnknownParameter,
    InvalidTitle,
}

impl FailureReason {
    pub const ALL: [FailureReason; 5] = [
        FailureReason::MissingRequiredParameter,
        FailureReason::InvalidValueType,
        FailureReason::UnknownDefinitionName,
        FailureReason::UnknownParameter,
        FailureReason::InvalidTitle,
    ];

    /// The snake_case name used in suites, JSON output, and diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::MissingRequiredParameter => "missing_required_parameter",
            FailureReason::InvalidValueType => "invalid_value_type",
            FailureReason::UnknownDefinitionName => "unknown_definition_name",
            FailureReason::UnknownParameter => "unknown_parameter",
            FailureReason::InvalidTitle => "invalid_title",
        }
    }

    pub fn parse(s: &str) -> Option<FailureReason> {
        Self::ALL.into_iter().find(|r| r.as_str() == s)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed check: the kind of failure plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{reference}: {message}")]
pub struct Failure {
    pub reason: FailureReason,
    pub reference: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl Diagnostic for Failure {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(format!("defcheck::compile::{}", self.reason)))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display + 'a>)
    }
}

/// Result of a check: compiled, or failed with a reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Compiled,
    Failed(Failure),
}

impl Outcome {
    pub fn is_compiled(&self) -> bool {
        matches!(self, Outcome::Compiled)
    }

    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            Outcome::Compiled => None,
            Outcome::Failed(failure) => Some(failure.reason),
        }
    }
}

/// A declaration that compiled, with defaults filled in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledResource {
    pub definition: String,
    pub title: String,
    /// Declared parameters (supplied or defaulted) plus supplied metaparameters.
    pub params: Params,
}

/// Compile-checks `invocation` and returns the resolved resource.
pub fn compile(catalog: &Catalog, invocation: &Invocation) -> Result<CompiledResource, Failure> {
    let result = resolve(catalog, invocation);
    match &result {
        Ok(_) => debug!(resource = %invocation.reference(), "compiled"),
        Err(failure) => debug!(
            resource = %invocation.reference(),
            reason = %failure.reason,
            "failed to compile"
        ),
    }
    result
}

/// Compile-checks `invocation`, keeping only the outcome.
pub fn check(catalog: &Catalog, invocation: &Invocation) -> Outcome {
    match compile(catalog, invocation) {
        Ok(_) => Outcome::Compiled,
        Err(failure) => Outcome::Failed(failure),
    }
}

/// Checks every invocation in parallel. Outcomes come back in input order.
pub fn check_all(catalog: &Catalog, invocations: &[Invocation]) -> Vec<Outcome> {
    let workers = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(invocations.len().max(1));
    let chunk_size = invocations.len().div_ceil(workers).max(1);

    thread::scope(|scope| {
        let handles: Vec<_> = invocations
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|inv| check(catalog, inv))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| match handle.join() {
                Ok(outcomes) => outcomes,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    })
}

fn resolve(catalog: &Catalog, invocation: &Invocation) -> Result<CompiledResource, Failure> {
    let reference = invocation.reference();
    let fail = |reason, message: String, help: Option<String>| Failure {
        reason,
        reference: reference.clone(),
        message,
        help,
    };

    if invocation.title.trim().is_empty() {
        return Err(fail(
            FailureReason::InvalidTitle,
            "title must not be empty".to_string(),
            None,
        ));
    }

    let Some(schema) = catalog.lookup(&invocation.definition) else {
        return Err(fail(
            FailureReason::UnknownDefinitionName,
            format!("unknown definition '{}'", invocation.definition),
            suggest_definition(catalog, &invocation.definition),
        ));
    };

    let missing: Vec<&str> = schema
        .required()
        .filter(|p| invocation.supplied(&p.name).is_none())
        .map(|p| p.name.as_str())
        .collect();
    if !missing.is_empty() {
        let names: Vec<String> = missing.iter().map(|n| format!("${}", n)).collect();
        let noun = if missing.len() == 1 { "parameter" } else { "parameters" };
        return Err(fail(
            FailureReason::MissingRequiredParameter,
            format!("missing required {} {}", noun, names.join(", ")),
            Some(format!("'{}' has no default for these", schema.name)),
        ));
    }

    let unknown: Vec<&str> = invocation
        .params
        .keys()
        .map(String::as_str)
        .filter(|k| schema.param(k).is_none() && !is_metaparameter(k))
        .collect();
    if !unknown.is_empty() {
        let names: Vec<String> = unknown.iter().map(|n| format!("${}", n)).collect();
        let noun = if unknown.len() == 1 { "parameter" } else { "parameters" };
        return Err(fail(
            FailureReason::UnknownParameter,
            format!("invalid {} {}", noun, names.join(", ")),
            Some(accepted_parameters(schema)),
        ));
    }

    let mut resolved = Params::new();
    for param in &schema.params {
        let value = match (invocation.supplied(&param.name), &param.default) {
            (Some(value), _) if !param.ty.accepts(value) => {
                return Err(fail(
                    FailureReason::InvalidValueType,
                    format!(
                        "parameter ${} expects a {} value, got {} ({})",
                        param.name,
                        param.ty,
                        value.type_name(),
                        value
                    ),
                    None,
                ));
            }
            (Some(value), _) => value,
            // Defaults were type-checked when the schema was built.
            (None, Some(default)) => default,
            (None, None) => continue,
        };
        resolved.insert(param.name.clone(), value.clone());
    }
    for (name, value) in invocation.params.iter() {
        if is_metaparameter(name) && !value.is_undef() {
            resolved.insert(name.clone(), value.clone());
        }
    }

    Ok(CompiledResource {
        definition: schema.name.clone(),
        title: invocation.title.clone(),
        params: resolved,
    })
}

fn suggest_definition(catalog: &Catalog, name: &str) -> Option<String> {
    let leaf = name.rsplit("::").next().unwrap_or(name);
    catalog
        .names()
        .find(|known| known.rsplit("::").next() == Some(leaf) || known.eq_ignore_ascii_case(name))
        .map(|known| format!("did you mean '{}'?", known))
}

fn accepted_parameters(schema: &DefinitionSchema) -> String {
    let names: Vec<String> = schema.params.iter().map(|p| format!("${}", p.name)).collect();
    if names.is_empty() {
        format!("'{}' takes no parameters", schema.name)
    } else {
        format!("'{}' accepts {}", schema.name, names.join(", "))
    }
}
