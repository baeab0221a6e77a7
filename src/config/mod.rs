//! Configuration management for mergex
//!
//! This module handles loading, parsing, and validating configuration from:
//! - Configuration files (TOML format)
//! - Command-line arguments (applied on top by the CLI layer)
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Configuration file
//! 3. Default values
//!
//! The SQL login password is deliberately not part of the file format; it
//! comes from the CLI or the `MERGEX_PASSWORD` environment variable.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data source configuration
    pub source: SourceConfig,

    /// Export configuration
    pub export: ExportConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Data-source and tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Server the export tools connect to (`host`, `host\instance` or `host,port`)
    #[serde(default = "default_server")]
    pub server: String,

    /// Database name
    #[serde(default)]
    pub database: String,

    /// Source table holding the entity-merge records
    #[serde(default = "default_table")]
    pub table: String,

    /// SQL login user; integrated auth is used when absent
    #[serde(default)]
    pub username: Option<String>,

    /// bcp binary name or path
    #[serde(default = "default_bcp_program")]
    pub bcp_program: String,

    /// sqlcmd binary name or path
    #[serde(default = "default_sqlcmd_program")]
    pub sqlcmd_program: String,
}

/// Export loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory the output files are written to
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,

    /// Output file prefix; files are named `<prefix><sequence>.json`
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// Community identifier embedded once per output file
    #[serde(default)]
    pub community_id: String,

    /// Entity ids per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,

    /// Re-probe the maximum entity id before each batch instead of using
    /// the init-time snapshot
    #[serde(default)]
    pub refresh_max_id: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_server() -> String {
    "localhost".to_string()
}

fn default_table() -> String {
    "PostScript_AllianceMerge".to_string()
}

fn default_bcp_program() -> String {
    "bcp".to_string()
}

fn default_sqlcmd_program() -> String {
    "sqlcmd".to_string()
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("export")
}

fn default_file_prefix() -> String {
    "Export".to_string()
}

fn default_batch_size() -> i64 {
    2500
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            database: String::new(),
            table: default_table(),
            username: None,
            bcp_program: default_bcp_program(),
            sqlcmd_program: default_sqlcmd_program(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_directory: default_output_directory(),
            file_prefix: default_file_prefix(),
            community_id: String::new(),
            batch_size: default_batch_size(),
            refresh_max_id: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Load configuration from a file, falling back to defaults when no file
    /// exists at the default location.
    ///
    /// # Arguments
    /// * `path` - Explicit config path; `None` uses the default location
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_config_path(), false),
        };

        if !path.exists() {
            if explicit {
                return Err(
                    ConfigError::FileNotFound(path.display().to_string()).into()
                );
            }
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        Ok(config)
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mergex")
            .join("config.toml")
    }

    /// Validate the configuration.
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        if self.source.database.trim().is_empty() {
            return Err(ConfigError::MissingField("source.database".to_string()).into());
        }
        if self.source.table.trim().is_empty() {
            return Err(ConfigError::MissingField("source.table".to_string()).into());
        }
        if self.export.community_id.trim().is_empty() {
            return Err(ConfigError::MissingField("export.community_id".to_string()).into());
        }
        if self.export.file_prefix.trim().is_empty() {
            return Err(ConfigError::MissingField("export.file_prefix".to_string()).into());
        }
        if self.export.batch_size <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "export.batch_size".to_string(),
                value: self.export.batch_size.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.source.database = "Alliance".to_string();
        config.export.community_id = "LosAngeles".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.source.server, "localhost");
        assert_eq!(config.source.table, "PostScript_AllianceMerge");
        assert_eq!(config.export.file_prefix, "Export");
        assert_eq!(config.export.batch_size, 2500);
        assert!(!config.export.refresh_max_id);
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[test]
    fn test_validate_requires_database_and_community() {
        assert!(Config::default().validate().is_err());
        assert!(valid_config().validate().is_ok());

        let mut config = valid_config();
        config.export.community_id.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_nonpositive_batch_size() {
        let mut config = valid_config();
        config.export.batch_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = valid_config();
        let toml_str = config.to_toml().unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.source.database, "Alliance");
        assert_eq!(parsed.export.batch_size, 2500);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [source]
            database = "Alliance"

            [export]
            community_id = "LosAngeles"
            batch_size = 500
            "#,
        )
        .unwrap();
        assert_eq!(parsed.source.server, "localhost");
        assert_eq!(parsed.source.table, "PostScript_AllianceMerge");
        assert_eq!(parsed.export.batch_size, 500);
        assert_eq!(parsed.export.file_prefix, "Export");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err =
            Config::load_from_file(Some(Path::new("/nonexistent/mergex.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
