//! Batched JSON export library
//!
//! This library provides the core functionality for mergex, a batched JSON
//! exporter for SQL Server entity-merge tables. The export is driven entirely
//! through the external bulk-export tools (bcp/sqlcmd); the library plans the
//! entity-id batches, builds the FOR JSON queries, invokes the tools, and
//! classifies each outcome.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `error`: Error types and handling
//! - `exporter`: Batch planning, query building, tool invocation, run loop
//!
//! # Example
//!
//! ```no_run
//! use mergex::exporter::{
//!     AuthMode, BcpTool, ConnectionInfo, ExportDriver, JobConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tool = BcpTool::new(
//!         ConnectionInfo {
//!             server: "localhost".to_string(),
//!             database: "Alliance".to_string(),
//!             auth: AuthMode::Trusted,
//!         },
//!         "bcp",
//!         "sqlcmd",
//!     );
//!
//!     let job = JobConfig {
//!         table: "PostScript_AllianceMerge".to_string(),
//!         community_id: "LosAngeles".to_string(),
//!         output_directory: "export".into(),
//!         file_prefix: "Export".to_string(),
//!         batch_size: 2500,
//!         refresh_max_id: false,
//!     };
//!
//!     let driver = ExportDriver::new(Box::new(tool), job, false);
//!     let report = driver.run().await?;
//!     println!("Exported {} batches", report.batches_exported);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod exporter;

// Re-export commonly used types
pub use config::Config;
pub use error::{MergexError, Result};
pub use exporter::{ExportDriver, JobConfig, RunReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
///
/// # Returns
/// * `&str` - Version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
