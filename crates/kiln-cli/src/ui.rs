//! Terminal output for the pipeline.

use crossterm::style::Stylize;
use kiln_core::Reporter;

/// Prints pipeline progress to stderr, leaving stdout for command output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    /// Create a new reporter.
    pub fn new() -> Self {
        Self
    }
}

impl Reporter for ConsoleReporter {
    fn section(&self, title: &str) {
        eprintln!();
        eprintln!("{} {}", title.bold(), "─".repeat(40).dark_grey());
    }

    fn info(&self, msg: &str) {
        eprintln!("  {} {}", "ℹ".blue(), msg);
    }

    fn success(&self, msg: &str) {
        eprintln!("  {} {}", "✓".green(), msg);
    }

    fn warning(&self, msg: &str) {
        eprintln!("  {} {}", "⚠".yellow(), msg);
    }

    fn error(&self, msg: &str) {
        eprintln!("  {} {}", "✗".red(), msg);
    }

    fn done(&self, reference: &str, detail: &str, elapsed_secs: f64) {
        eprintln!();
        eprintln!(
            "{} {} {} {}",
            "✓".green().bold(),
            reference.white().bold(),
            detail,
            format!("in {elapsed_secs:.1}s").dark_grey()
        );
    }

    fn failed(&self, reference: &str, reason: &str) {
        let headline = reason.lines().next().unwrap_or_default();
        eprintln!();
        eprintln!("{} {} {}", "✗".red().bold(), reference.white().bold(), headline.red());
    }
}
