//! External bulk-export tool invocation
//!
//! This module is the only place mergex touches the database, and it does so
//! exclusively through external processes: `bcp ... queryout` writes each
//! batch document to disk, and a `sqlcmd`-style probe captures scalar values
//! such as the maximum entity id.
//!
//! Invocations are built as structured argument vectors and handed to
//! [`tokio::process::Command`]; no shell is ever involved, so query text and
//! paths need no escaping here. The invoker reports what happened
//! ([`ToolOutcome`]) and never interprets the captured output; classification
//! is [`super::outcome::evaluate`]'s job.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{InvocationError, Result};

/// How the external tools authenticate against the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// Integrated/trusted authentication (`-T` for bcp, `-E` for sqlcmd).
    Trusted,
    /// SQL login with explicit credentials (`-U`/`-P`).
    SqlLogin { username: String, password: String },
}

/// Identity of the data source the tools connect to.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Server (optionally `host\instance` or `host,port`).
    pub server: String,
    /// Database name.
    pub database: String,
    /// Authentication mode.
    pub auth: AuthMode,
}

/// Captured result of one external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    /// Process exit status; 0 is success, -1 stands in for a signal death.
    pub exit_status: i32,
    /// stdout then stderr, newline-joined, regardless of success.
    pub captured_output: String,
    /// The exact command line executed, with credentials redacted.
    pub command: String,
}

/// Seam for the external bulk-export capability.
///
/// Production uses [`BcpTool`]; tests substitute a mock so the driver's
/// control flow can be exercised without a server or the tools installed.
#[async_trait]
pub trait BulkTool: Send + Sync {
    /// Run `query` and stream its single-row, single-column result verbatim
    /// into the file at `output_path`, creating or overwriting it. Blocks
    /// until the external process completes.
    async fn export(&self, query: &str, output_path: &Path) -> Result<ToolOutcome>;

    /// Run `query` and capture its scalar textual result on stdout.
    async fn query_scalar(&self, query: &str) -> Result<ToolOutcome>;
}

/// Bulk tool implementation backed by the SQL Server command-line utilities.
#[derive(Debug, Clone)]
pub struct BcpTool {
    connection: ConnectionInfo,
    bcp_program: String,
    sqlcmd_program: String,
}

impl BcpTool {
    /// Create an invoker for one data source.
    ///
    /// # Arguments
    /// * `connection` - Server/database identity and auth mode
    /// * `bcp_program` - bcp binary name or path
    /// * `sqlcmd_program` - sqlcmd binary name or path
    pub fn new(connection: ConnectionInfo, bcp_program: &str, sqlcmd_program: &str) -> Self {
        Self {
            connection,
            bcp_program: bcp_program.to_string(),
            sqlcmd_program: sqlcmd_program.to_string(),
        }
    }

    /// Argument vector for a `bcp queryout` export.
    fn export_args(&self, query: &str, output_path: &Path) -> Vec<String> {
        let mut args = vec![
            query.to_string(),
            "queryout".to_string(),
            output_path.display().to_string(),
            "-S".to_string(),
            self.connection.server.clone(),
            "-d".to_string(),
            self.connection.database.clone(),
            // Character mode, UTF-8 code page: the query's JSON lands in the
            // file verbatim as text.
            "-c".to_string(),
            "-C".to_string(),
            "65001".to_string(),
        ];
        match &self.connection.auth {
            AuthMode::Trusted => args.push("-T".to_string()),
            AuthMode::SqlLogin { username, password } => {
                args.push("-U".to_string());
                args.push(username.clone());
                args.push("-P".to_string());
                args.push(password.clone());
            }
        }
        args
    }

    /// Argument vector for a sqlcmd scalar probe.
    ///
    /// `-h -1` drops headers, `-W` trims trailing whitespace and `-b` turns
    /// SQL errors into a nonzero exit status.
    fn scalar_args(&self, query: &str) -> Vec<String> {
        let mut args = vec![
            "-S".to_string(),
            self.connection.server.clone(),
            "-d".to_string(),
            self.connection.database.clone(),
            "-h".to_string(),
            "-1".to_string(),
            "-W".to_string(),
            "-b".to_string(),
            "-Q".to_string(),
            query.to_string(),
        ];
        match &self.connection.auth {
            AuthMode::Trusted => args.push("-E".to_string()),
            AuthMode::SqlLogin { username, password } => {
                args.push("-U".to_string());
                args.push(username.clone());
                args.push("-P".to_string());
                args.push(password.clone());
            }
        }
        args
    }

    /// Render a command line for diagnostics, redacting the value after `-P`.
    fn render_command(program: &str, args: &[String]) -> String {
        let mut rendered = vec![program.to_string()];
        let mut redact_next = false;
        for arg in args {
            if redact_next {
                rendered.push("***".to_string());
                redact_next = false;
                continue;
            }
            if arg == "-P" {
                redact_next = true;
            }
            if arg.contains(' ') || arg.contains('"') {
                // Escape embedded quotes so the rendered line stays pasteable.
                rendered.push(format!("\"{}\"", arg.replace('"', "\\\"")));
            } else {
                rendered.push(arg.clone());
            }
        }
        rendered.join(" ")
    }

    /// Spawn the tool and capture its combined output and exit status.
    async fn run_tool(&self, program: &str, args: Vec<String>) -> Result<ToolOutcome> {
        let command = Self::render_command(program, &args);
        debug!(%command, "invoking external tool");

        let output = Command::new(program)
            .args(&args)
            .output()
            .await
            .map_err(|e| InvocationError::SpawnFailed {
                program: program.to_string(),
                message: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let captured_output = match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
            (false, false) => format!("{}\n{}", stdout.trim_end(), stderr.trim_end()),
            (false, true) => stdout.trim_end().to_string(),
            (true, false) => stderr.trim_end().to_string(),
            (true, true) => String::new(),
        };

        Ok(ToolOutcome {
            // None means the process died to a signal; treat as failure.
            exit_status: output.status.code().unwrap_or(-1),
            captured_output,
            command,
        })
    }
}

#[async_trait]
impl BulkTool for BcpTool {
    async fn export(&self, query: &str, output_path: &Path) -> Result<ToolOutcome> {
        let args = self.export_args(query, output_path);
        self.run_tool(&self.bcp_program, args).await
    }

    async fn query_scalar(&self, query: &str) -> Result<ToolOutcome> {
        let args = self.scalar_args(query);
        self.run_tool(&self.sqlcmd_program, args).await
    }
}
