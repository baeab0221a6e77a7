//! Error handling module for mergex.
//!
//! Provides the crate-wide error hierarchy:
//! - [`MergexError`] as the single top-level error type
//! - Specific kinds for configuration, tool invocation, and export failures
//! - A crate-wide [`Result`] alias
//!
//! Export failures deliberately carry the full reproduction material (the
//! exact command line and the tool's captured output) so an operator can
//! re-run a failing batch by hand.

pub mod kinds;

// Re-export commonly used types
pub use kinds::{ConfigError, ExportError, InvocationError, MergexError, Result};
