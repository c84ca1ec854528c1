//! Columba CLI
//!
//! Offline tools for Columba databases. None of the commands modify the
//! database; they work on an in-memory copy of its history.
//!
//! # Commands
//!
//! - `inspect` - Show version, tables and history size
//! - `verify` - Check every history record and replay it
//! - `dump-history` - Print committed change sets

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Columba command-line database tools.
#[derive(Parser)]
#[command(name = "columba")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format shared by the reporting commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version, tables and history size
    Inspect {
        /// Show column declarations for each table
        #[arg(short, long)]
        columns: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Check every history record and replay it
    Verify {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print committed change sets
    DumpHistory {
        /// Maximum number of records to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Skip records before this version
        #[arg(long, default_value = "0")]
        from_version: u64,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { columns, format } => {
            let path = cli.path.ok_or("Database path required for inspect")?;
            commands::inspect::run(&path, columns, format)?;
        }
        Commands::Verify { format } => {
            let path = cli.path.ok_or("Database path required for verify")?;
            commands::verify::run(&path, format)?;
        }
        Commands::DumpHistory {
            limit,
            from_version,
            format,
        } => {
            let path = cli.path.ok_or("Database path required for dump-history")?;
            commands::dump_history::run(&path, limit, from_version, format)?;
        }
        Commands::Version => {
            println!("Columba CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Columba Core v{}", columba_core::VERSION);
        }
    }

    Ok(())
}
