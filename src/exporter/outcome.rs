//! Classification of bulk-export tool outcomes
//!
//! The invoker reports what the external process did ([`super::invoker::ToolOutcome`]);
//! this module decides what it means. A zero exit status is Success and the
//! captured output is dropped unread, keeping successful runs quiet. Anything
//! else is a Failure carrying everything an operator needs to reproduce the
//! invocation by hand.

use std::fmt;

use super::invoker::ToolOutcome;

/// Everything needed to reproduce and inspect a failed invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureDiagnostic {
    /// The tool's exit status.
    pub exit_status: i32,
    /// The exact command line that was executed (credentials redacted).
    pub command: String,
    /// Combined stdout/stderr of the tool, in emission order.
    pub captured_output: String,
}

impl fmt::Display for FailureDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "exit status: {}", self.exit_status)?;
        writeln!(f, "command: {}", self.command)?;
        if self.captured_output.is_empty() {
            write!(f, "output: (none)")
        } else {
            write!(f, "output:\n{}", self.captured_output)
        }
    }
}

/// Verdict on a single tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// Exit status zero. Captured output is discarded.
    Success,
    /// Nonzero exit status, with reproduction material.
    Failure(FailureDiagnostic),
}

/// Classify a tool outcome.
///
/// # Arguments
/// * `outcome` - Captured exit status, output, and command line
///
/// # Returns
/// * `Evaluation` - Success for exit 0, Failure with diagnostic otherwise
pub fn evaluate(outcome: ToolOutcome) -> Evaluation {
    if outcome.exit_status == 0 {
        Evaluation::Success
    } else {
        Evaluation::Failure(FailureDiagnostic {
            exit_status: outcome.exit_status,
            command: outcome.command,
            captured_output: outcome.captured_output,
        })
    }
}
