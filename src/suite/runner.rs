//! Executes suites against a catalog.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::compiler::{check_all, Outcome};
use crate::errors::DefcheckResult;
use crate::invocation::Invocation;
use crate::suite::{discover_suite_files, Expectation, Suite};

/// The result of one case.
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub suite: PathBuf,
    pub definition: String,
    pub case: String,
    pub expected: Expectation,
    pub outcome: Outcome,
    pub passed: bool,
}

impl CaseReport {
    /// One line describing a mismatch, or `None` when the case passed.
    pub fn mismatch(&self) -> Option<String> {
        if self.passed {
            return None;
        }
        Some(match &self.outcome {
            Outcome::Compiled => format!("expected to {}, but it compiled", self.expected),
            Outcome::Failed(failure) => format!(
                "expected to {}, but it failed with {}: {}",
                self.expected, failure.reason, failure.message
            ),
        })
    }
}

/// All case results from a run, in suite order then case order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SuiteSummary {
    pub reports: Vec<CaseReport>,
}

impl SuiteSummary {
    pub fn passed(&self) -> usize {
        self.reports.iter().filter(|r| r.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.len() - self.passed()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Runs every case of `suite`. Cases are checked in parallel.
pub fn run_suite(catalog: &Catalog, suite: &Suite) -> Vec<CaseReport> {
    let invocations: Vec<Invocation> = suite.cases.iter().map(|c| c.invocation.clone()).collect();
    let outcomes = check_all(catalog, &invocations);

    suite
        .cases
        .iter()
        .zip(outcomes)
        .map(|(case, outcome)| {
            let passed = case.expect.matches(&outcome);
            if !passed {
                warn!(suite = %suite.path.display(), case = %case.name, "case failed");
            }
            CaseReport {
                suite: suite.path.clone(),
                definition: suite.definition.clone(),
                case: case.name.clone(),
                expected: case.expect,
                outcome,
                passed,
            }
        })
        .collect()
}

/// Discovers and runs every suite under `path`.
///
/// A suite file that cannot be read or parsed aborts the run; a case that does
/// not meet its expectation is only reported.
pub fn run_path<P: AsRef<Path>>(catalog: &Catalog, path: P) -> DefcheckResult<SuiteSummary> {
    let mut summary = SuiteSummary::default();
    for file in discover_suite_files(path.as_ref())? {
        let suite = Suite::load(&file)?;
        summary.reports.extend(run_suite(catalog, &suite));
    }
    info!(
        passed = summary.passed(),
        failed = summary.failed(),
        "suite run finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::FailureReason;

    #[test]
    fn reports_pass_and_mismatch() {
        let catalog = Catalog::builtin().unwrap();
        let suite = Suite::from_yaml(
            "inline.yaml",
            r#"
definition: puppet_nonroot
title: nra.puppet
params:
  user: bob
  puppet_master_fqdn: puppet.fake
  challenge_password: top_secret
contexts:
  - name: with default values for all parameters
    expect: compile
  - name: wrongly expects failure
    expect: { fail: invalid_value_type }
"#,
        )
        .unwrap();

        let reports = run_suite(&catalog, &suite);
        assert_eq!(reports.len(), 2);
        assert!(reports[0].passed);
        assert!(reports[0].mismatch().is_none());
        assert!(!reports[1].passed);
        assert_eq!(
            reports[1].mismatch().as_deref(),
            Some("expected to fail with invalid_value_type, but it compiled")
        );
        assert_eq!(reports[1].expected, Expectation::Fail(FailureReason::InvalidValueType));
    }

    #[test]
    fn summary_counts() {
        let summary = SuiteSummary::default();
        assert!(summary.is_success());
        assert_eq!(summary.passed(), 0);
        assert_eq!(summary.failed(), 0);
    }
}
