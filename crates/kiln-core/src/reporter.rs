//! Reporter trait for dependency injection
//!
//! Evaluation reports progress through this trait so the core stays free of
//! any particular terminal UI.

/// Progress sink for user-facing output.
pub trait Reporter: Send + Sync + std::fmt::Debug {
    /// Indicates a new phase has started (e.g. "Building", "Packaging").
    fn section(&self, title: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a success message.
    fn success(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Log an error message.
    fn error(&self, msg: &str);

    /// Marks the evaluation as finished.
    fn done(&self, reference: &str, detail: &str, elapsed_secs: f64);

    /// Marks the evaluation as failed with a specific reason.
    fn failed(&self, reference: &str, reason: &str);
}

/// A no-op reporter for silent operations (e.g., verification, testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn info(&self, _: &str) {}
    fn success(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn error(&self, _: &str) {}
    fn done(&self, _: &str, _: &str, _: f64) {}
    fn failed(&self, _: &str, _: &str) {}
}
