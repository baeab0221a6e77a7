use std::path::PathBuf;
use std::{fmt, io};

use crate::exporter::outcome::FailureDiagnostic;

/// Crate-wide `Result` type using [`MergexError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, MergexError>;

/// Top-level error type for mergex operations.
///
/// This type wraps more specific error kinds and provides a single
/// error type that can be used throughout the crate.
#[derive(Debug)]
pub enum MergexError {
    /// Configuration errors.
    Config(ConfigError),

    /// Failures launching the external bulk-export tool.
    Invocation(InvocationError),

    /// Failures of the export run itself.
    Export(ExportError),

    /// I/O errors.
    Io(io::Error),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Missing required field.
    MissingField(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },

    /// Generic configuration error.
    Generic(String),
}

/// Errors raised while launching the external bulk-export tool.
///
/// These cover failures to run the tool at all. A tool that runs but exits
/// nonzero is not an `InvocationError`; that outcome is classified by
/// [`crate::exporter::outcome::evaluate`].
#[derive(Debug)]
pub enum InvocationError {
    /// The tool binary could not be spawned (missing, not executable).
    SpawnFailed { program: String, message: String },
}

/// Errors that terminate an export run.
#[derive(Debug)]
pub enum ExportError {
    /// The output directory could not be created at init.
    DirectoryCreation { path: PathBuf, message: String },

    /// The maximum-id probe failed or returned something unparsable.
    MaxIdProbe(FailureDiagnostic),

    /// The bulk-export tool reported failure for a batch. Fatal; the run
    /// halts without retrying and earlier batch files are left in place.
    BatchFailed {
        sequence: u32,
        diagnostic: FailureDiagnostic,
    },
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for MergexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergexError::Config(e) => write!(f, "Configuration error: {e}"),
            MergexError::Invocation(e) => write!(f, "Invocation error: {e}"),
            MergexError::Export(e) => write!(f, "Export error: {e}"),
            MergexError::Io(e) => write!(f, "I/O error: {e}"),
            MergexError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::MissingField(field) => write!(f, "Missing required field: {field}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
            ConfigError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationError::SpawnFailed { program, message } => {
                write!(f, "Failed to launch '{program}': {message}")
            }
        }
    }
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::DirectoryCreation { path, message } => {
                write!(
                    f,
                    "Failed to create output directory {}: {message}",
                    path.display()
                )
            }
            ExportError::MaxIdProbe(diag) => {
                write!(f, "Failed to determine maximum entity id\n{diag}")
            }
            ExportError::BatchFailed {
                sequence,
                diagnostic,
            } => {
                write!(f, "Bulk export failed for batch {sequence}\n{diagnostic}")
            }
        }
    }
}

impl std::error::Error for MergexError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for InvocationError {}
impl std::error::Error for ExportError {}

/* ========================= Conversions to MergexError ========================= */

impl From<io::Error> for MergexError {
    fn from(err: io::Error) -> Self {
        MergexError::Io(err)
    }
}

impl From<ConfigError> for MergexError {
    fn from(err: ConfigError) -> Self {
        MergexError::Config(err)
    }
}

impl From<InvocationError> for MergexError {
    fn from(err: InvocationError) -> Self {
        MergexError::Invocation(err)
    }
}

impl From<ExportError> for MergexError {
    fn from(err: ExportError) -> Self {
        MergexError::Export(err)
    }
}

impl From<serde_json::Error> for MergexError {
    fn from(err: serde_json::Error) -> Self {
        MergexError::Generic(format!("JSON serialization error: {err}"))
    }
}

impl From<String> for MergexError {
    fn from(msg: String) -> Self {
        MergexError::Generic(msg)
    }
}

impl From<&str> for MergexError {
    fn from(msg: &str) -> Self {
        MergexError::Generic(msg.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_failed_display_carries_diagnostic() {
        let err = ExportError::BatchFailed {
            sequence: 2,
            diagnostic: FailureDiagnostic {
                exit_status: 1,
                command: "bcp \"SELECT ...\" queryout Export2.json".to_string(),
                captured_output: "SQLState = 37000".to_string(),
            },
        };

        let text = err.to_string();
        assert!(text.contains("batch 2"));
        assert!(text.contains("SQLState = 37000"));
        assert!(text.contains("queryout Export2.json"));
    }

    #[test]
    fn test_config_error_conversion() {
        let err: MergexError = ConfigError::MissingField("community_id".to_string()).into();
        assert!(err.to_string().contains("community_id"));
    }
}
