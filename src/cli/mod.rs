//! Command-line interface for mergex
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and validation
//! - Resolution of the export job and data-source identity
//! - Subcommands (version, completion, config)
//!
//! Configuration precedence is CLI arguments over config file over defaults.
//! The SQL login password is the exception: it is only ever taken from
//! `--password` or the `MERGEX_PASSWORD` environment variable, never from
//! the config file.

pub mod completion;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{Config, LogLevel};
use crate::error::{ConfigError, Result};
use crate::exporter::{AuthMode, ConnectionInfo, JobConfig};

/// Environment variable consulted for the SQL login password.
pub const PASSWORD_ENV_VAR: &str = "MERGEX_PASSWORD";

/// Batched JSON exporter for SQL Server entity-merge tables
#[derive(Parser, Debug)]
#[command(
    name = "mergex",
    version,
    about = "Batched JSON export of entity-merge records via bcp",
    long_about = "Exports an entity-merge table to a series of JSON documents, one file per
contiguous EntityId batch, by driving the SQL Server bulk-export tools
(bcp/sqlcmd) as external processes."
)]
pub struct CliArgs {
    /// Server to connect to (host, host\instance or host,port)
    #[arg(short = 'S', long, value_name = "HOST")]
    pub server: Option<String>,

    /// Database name
    #[arg(short = 'd', long, value_name = "NAME")]
    pub database: Option<String>,

    /// Username for SQL login authentication
    #[arg(short = 'U', long, value_name = "USERNAME")]
    pub username: Option<String>,

    /// Password for SQL login authentication
    ///
    /// Prefer the MERGEX_PASSWORD environment variable; passing the password
    /// on the command line exposes it to other processes.
    #[arg(short = 'P', long, value_name = "PASSWORD")]
    pub password: Option<String>,

    /// Force integrated/trusted authentication
    #[arg(short = 'T', long)]
    pub trusted: bool,

    /// Source table holding the entity-merge records
    #[arg(long, value_name = "NAME")]
    pub table: Option<String>,

    /// Directory the output files are written to
    #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output file prefix; files are named <PREFIX><N>.json
    #[arg(long, value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Community identifier embedded once per output file
    #[arg(long = "community-id", value_name = "ID")]
    pub community_id: Option<String>,

    /// Entity ids per batch
    #[arg(short = 'b', long = "batch-size", value_name = "N")]
    pub batch_size: Option<i64>,

    /// Re-probe the maximum entity id before each batch
    #[arg(long = "refresh-max-id")]
    pub refresh_max_id: bool,

    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Disable the progress bar
    #[arg(long = "no-progress")]
    pub no_progress: bool,

    /// Print a JSON run summary to stdout on success
    #[arg(long)]
    pub json: bool,

    /// Quiet mode (minimal output)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Very verbose mode (debug logging)
    #[arg(long = "vv")]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands for mergex
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show version information
    Version,

    /// Generate shell completion script
    Completion {
        /// Shell type (bash, zsh, fish)
        #[arg(value_name = "SHELL")]
        shell: String,
    },

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,
    },
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Create a new CLI interface
    ///
    /// # Returns
    /// * `Result<Self>` - New CLI interface or error
    pub fn new() -> Result<Self> {
        let args = CliArgs::parse();
        let config = Self::load_config(&args)?;

        Ok(Self { args, config })
    }

    /// Build an interface from pre-parsed arguments (used by tests).
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Load configuration from file and merge with arguments
    ///
    /// # Arguments
    /// * `args` - Command-line arguments
    ///
    /// # Returns
    /// * `Result<Config>` - Merged configuration or error
    fn load_config(args: &CliArgs) -> Result<Config> {
        let config_path = args.config_file.as_deref();
        let mut config = Config::load_from_file(config_path)?;

        // Apply CLI arguments to override config values
        Self::apply_args_to_config(&mut config, args);

        Ok(config)
    }

    /// Get the configuration
    ///
    /// # Returns
    /// * `&Config` - Reference to configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the CLI arguments
    ///
    /// # Returns
    /// * `&CliArgs` - Reference to arguments
    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Apply CLI arguments to configuration
    ///
    /// Overrides configuration values with CLI arguments where provided
    ///
    /// # Arguments
    /// * `config` - Configuration to modify
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        Self::apply_source_args(config, args);
        Self::apply_export_args(config, args);
        Self::apply_logging_args(config, args);
    }

    /// Apply data-source CLI arguments to configuration
    fn apply_source_args(config: &mut Config, args: &CliArgs) {
        if let Some(server) = &args.server {
            config.source.server = server.clone();
        }
        if let Some(database) = &args.database {
            config.source.database = database.clone();
        }
        if let Some(table) = &args.table {
            config.source.table = table.clone();
        }
        if let Some(username) = &args.username {
            config.source.username = Some(username.clone());
        }
        if args.trusted {
            config.source.username = None;
        }
    }

    /// Apply export-related CLI arguments to configuration
    fn apply_export_args(config: &mut Config, args: &CliArgs) {
        if let Some(output_dir) = &args.output_dir {
            config.export.output_directory = output_dir.clone();
        }
        if let Some(prefix) = &args.prefix {
            config.export.file_prefix = prefix.clone();
        }
        if let Some(community_id) = &args.community_id {
            config.export.community_id = community_id.clone();
        }
        if let Some(batch_size) = args.batch_size {
            config.export.batch_size = batch_size;
        }
        if args.refresh_max_id {
            config.export.refresh_max_id = true;
        }
    }

    /// Apply logging-related CLI arguments to configuration
    fn apply_logging_args(config: &mut Config, args: &CliArgs) {
        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };
    }

    /// Resolve the export job from the merged configuration
    ///
    /// # Returns
    /// * `Result<JobConfig>` - Export job parameters or validation error
    pub fn job_config(&self) -> Result<JobConfig> {
        self.config.validate()?;

        Ok(JobConfig {
            table: self.config.source.table.clone(),
            community_id: self.config.export.community_id.clone(),
            output_directory: self.config.export.output_directory.clone(),
            file_prefix: self.config.export.file_prefix.clone(),
            batch_size: self.config.export.batch_size,
            refresh_max_id: self.config.export.refresh_max_id,
        })
    }

    /// Resolve the data-source identity from the merged configuration
    ///
    /// A configured username selects SQL login authentication; the password
    /// then comes from `--password` or the `MERGEX_PASSWORD` environment
    /// variable. Without a username (or with `--trusted`), integrated
    /// authentication is used.
    ///
    /// # Returns
    /// * `Result<ConnectionInfo>` - Data-source identity or error
    pub fn connection_info(&self) -> Result<ConnectionInfo> {
        let auth = match &self.config.source.username {
            Some(username) => {
                let password = self
                    .args
                    .password
                    .clone()
                    .or_else(|| std::env::var(PASSWORD_ENV_VAR).ok())
                    .ok_or_else(|| {
                        ConfigError::MissingField(format!(
                            "password (use --password or {PASSWORD_ENV_VAR})"
                        ))
                    })?;
                AuthMode::SqlLogin {
                    username: username.clone(),
                    password,
                }
            }
            None => AuthMode::Trusted,
        };

        Ok(ConnectionInfo {
            server: self.config.source.server.clone(),
            database: self.config.source.database.clone(),
            auth,
        })
    }

    /// Whether the per-batch progress bar should be shown.
    pub fn show_progress(&self) -> bool {
        !self.args.no_progress && !self.args.quiet && !self.args.json
    }

    /// Handle subcommands
    ///
    /// # Returns
    /// * `Result<bool>` - True if subcommand was handled, false to continue
    pub fn handle_subcommand(&self) -> Result<bool> {
        match &self.args.command {
            Some(Commands::Version) => {
                self.show_version();
                Ok(true)
            }
            Some(Commands::Completion { shell }) => {
                completion::generate_completion(shell)?;
                Ok(true)
            }
            Some(Commands::Config { show, validate }) => {
                self.handle_config_command(*show, *validate)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Show version information
    fn show_version(&self) {
        println!("mergex version {}", env!("CARGO_PKG_VERSION"));
        println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
    }

    /// Handle config subcommand
    ///
    /// # Arguments
    /// * `show` - Whether to show configuration
    /// * `validate` - Whether to validate configuration
    ///
    /// # Returns
    /// * `Result<()>` - Success or error
    fn handle_config_command(&self, show: bool, validate: bool) -> Result<()> {
        if validate {
            self.validate_config_file()?;
        }

        if show {
            self.show_config()?;
        }

        Ok(())
    }

    /// Validate configuration file
    fn validate_config_file(&self) -> Result<()> {
        let path = self.get_config_path();
        println!("Validating configuration file: {}", path.display());

        if !path.exists() {
            println!("❌ Configuration file does not exist");
            return Ok(());
        }

        match Config::load_from_file(self.args.config_file.as_deref()) {
            Ok(config) => match config.validate() {
                Ok(_) => println!("✅ Configuration is valid"),
                Err(e) => println!("❌ Configuration validation failed: {}", e),
            },
            Err(e) => println!("❌ Failed to load configuration: {}", e),
        }

        Ok(())
    }

    /// Show effective configuration
    fn show_config(&self) -> Result<()> {
        let path = self.get_config_path();
        println!("Configuration file: {}", path.display());
        println!();
        println!("=== Effective Configuration ===");
        println!();

        match self.config.to_toml() {
            Ok(toml_str) => println!("{}", toml_str),
            Err(e) => {
                eprintln!("Error formatting configuration: {}", e);
                println!("{:#?}", self.config);
            }
        }

        Ok(())
    }

    /// Get configuration file path (from args or default)
    fn get_config_path(&self) -> PathBuf {
        self.args
            .config_file
            .as_ref()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Config::default_config_path)
    }

    /// Print banner with version and target info
    pub fn print_banner(&self) {
        if !self.args.quiet && !self.args.json {
            println!(
                "Exporting {}.{} → {}",
                self.config.source.database,
                self.config.source.table,
                self.config.export.output_directory.display()
            );
            println!("Using mergex: {}", env!("CARGO_PKG_VERSION"));
        }
    }
}
