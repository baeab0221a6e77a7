//! mergex - Batched JSON exporter for SQL Server entity-merge tables
//!
//! Exports an entity-merge table to a series of JSON documents, one file per
//! contiguous EntityId batch. Each batch is shaped into nested JSON by a
//! FOR JSON query and written to disk by an external `bcp ... queryout`
//! invocation; a failing batch halts the run with a reproducible diagnostic.
//!
//! # Usage
//!
//! ```bash
//! # Integrated auth, defaults from ~/.mergex/config.toml
//! mergex -S db01 -d Alliance --community-id LosAngeles -o ./export
//!
//! # SQL login, password from the environment
//! MERGEX_PASSWORD=... mergex -S db01 -d Alliance -U exporter \
//!     --community-id LosAngeles --batch-size 500 --json
//! ```

use tracing::Level;

mod cli;
mod config;
mod error;
mod exporter;

use cli::CliInterface;
use error::Result;
use exporter::{BcpTool, ExportDriver};

/// Application entry point
#[tokio::main]
async fn main() {
    // Initialize the application and handle any errors
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// This function orchestrates the application startup:
/// 1. Parse command-line arguments
/// 2. Load configuration
/// 3. Initialize logging
/// 4. Handle subcommands or run the export
///
/// # Returns
/// * `Result<()>` - Success or error
async fn run() -> Result<()> {
    // Parse command-line arguments and load configuration
    let cli = CliInterface::new()?;

    // Initialize logging based on verbosity
    initialize_logging(&cli);

    // Handle subcommands (version, completion, config)
    if cli.handle_subcommand()? {
        return Ok(());
    }

    // Print banner if not in quiet mode
    cli.print_banner();

    run_export(&cli).await
}

/// Run the batched export end to end
async fn run_export(cli: &CliInterface) -> Result<()> {
    let job = cli.job_config()?;
    let connection = cli.connection_info()?;

    let tool = BcpTool::new(
        connection,
        &cli.config().source.bcp_program,
        &cli.config().source.sqlcmd_program,
    );

    let driver = ExportDriver::new(Box::new(tool), job, cli.show_progress());
    let report = driver.run().await?;

    if cli.args().json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

/// Initialize logging system based on verbosity level
///
/// # Arguments
/// * `cli` - CLI interface with verbosity settings
fn initialize_logging(cli: &CliInterface) {
    let level = if cli.args().very_verbose {
        Level::TRACE
    } else if cli.args().verbose {
        Level::DEBUG
    } else {
        cli.config().logging.level.to_tracing_level()
    };

    // Build subscriber with level filter; logs go to stderr so the --json
    // summary on stdout stays machine-readable.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    // Configure timestamps
    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
