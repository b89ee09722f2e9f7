//! Handles all user-facing output for the CLI.
//!
//! Every printer writes to a `WriteColor` so the same code serves the
//! terminal and tests (which pass a `termcolor::Buffer`).

use std::io;
use std::path::Path;

use termcolor::{Color, ColorSpec, WriteColor};

use crate::catalog::Catalog;
use crate::compiler::{CompiledResource, Outcome};
use crate::invocation::Invocation;
use crate::suite::SuiteSummary;

// ============================================================================
// CHECK AND SHOW
// ============================================================================

/// Prints the outcome of a single check.
pub fn print_outcome(
    out: &mut dyn WriteColor,
    invocation: &Invocation,
    outcome: &Outcome,
) -> io::Result<()> {
    match outcome {
        Outcome::Compiled => {
            write_colored(out, Color::Green, true, "compiled")?;
            writeln!(out, " {}", invocation.reference())
        }
        Outcome::Failed(failure) => {
            write_colored(out, Color::Red, true, "failed")?;
            writeln!(out, " {} [{}]", invocation.reference(), failure.reason)?;
            writeln!(out, "  {}", failure.message)?;
            if let Some(help) = &failure.help {
                writeln!(out, "  help: {}", help)?;
            }
            Ok(())
        }
    }
}

/// Prints a resolved declaration in manifest form, arrows aligned.
pub fn print_resource(out: &mut dyn WriteColor, resource: &CompiledResource) -> io::Result<()> {
    writeln!(out, "{} {{ '{}':", resource.definition, resource.title)?;
    let width = resource.params.keys().map(String::len).max().unwrap_or(0);
    for (name, value) in resource.params.iter() {
        writeln!(out, "  {:<width$} => {},", name, value, width = width)?;
    }
    writeln!(out, "}}")
}

// ============================================================================
// LIST
// ============================================================================

pub fn print_catalog(out: &mut dyn WriteColor, catalog: &Catalog) -> io::Result<()> {
    if catalog.is_empty() {
        return writeln!(out, "no definitions loaded");
    }
    for definition in catalog.definitions() {
        write_colored(out, Color::Cyan, true, &definition.name)?;
        writeln!(out)?;
        for param in &definition.params {
            match &param.default {
                Some(default) => {
                    writeln!(out, "  {} ${} = {}", param.ty, param.name, default)?
                }
                None => {
                    write!(out, "  {} ${} ", param.ty, param.name)?;
                    write_colored(out, Color::Yellow, false, "(required)")?;
                    writeln!(out)?;
                }
            }
        }
    }
    Ok(())
}

// ============================================================================
// TEST
// ============================================================================

/// Prints suite results grouped by file, then a summary line.
pub fn print_summary(out: &mut dyn WriteColor, summary: &SuiteSummary) -> io::Result<()> {
    let mut current: Option<&Path> = None;
    for report in &summary.reports {
        if current != Some(report.suite.as_path()) {
            current = Some(report.suite.as_path());
            write_colored(out, Color::Cyan, true, &report.definition)?;
            writeln!(out, " ({})", report.suite.display())?;
        }
        if report.passed {
            write_colored(out, Color::Green, false, "  ok   ")?;
            writeln!(out, "{} should {}", report.case, report.expected)?;
        } else {
            write_colored(out, Color::Red, true, "  FAIL ")?;
            writeln!(out, "{}", report.case)?;
            if let Some(mismatch) = report.mismatch() {
                writeln!(out, "         {}", mismatch)?;
            }
        }
    }

    writeln!(out)?;
    let color = if summary.is_success() {
        Color::Green
    } else {
        Color::Red
    };
    let line = format!("{} passed, {} failed", summary.passed(), summary.failed());
    write_colored(out, color, true, &line)?;
    writeln!(out)
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn write_colored(out: &mut dyn WriteColor, color: Color, bold: bool, text: &str) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(bold))?;
    write!(out, "{}", text)?;
    out.reset()
}
