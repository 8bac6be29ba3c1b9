//! CLI argument definitions using clap
//!
//! Commands:
//! - rowflow run --plan <path> [--config <path>] [--count] [--verbose]
//! - rowflow validate --plan <path> [--config <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// rowflow - block-at-a-time row pipeline engine
#[derive(Parser, Debug)]
#[command(name = "rowflow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a plan and print its rows and statistics
    Run {
        /// Path to the plan file
        #[arg(long)]
        plan: PathBuf,

        /// Path to the engine configuration file (defaults apply if omitted)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Count result rows with skip_some instead of returning them
        #[arg(long)]
        count: bool,

        /// Keep engine log lines on stdout
        #[arg(long)]
        verbose: bool,
    },

    /// Check a plan and configuration without executing
    Validate {
        /// Path to the plan file
        #[arg(long)]
        plan: PathBuf,

        /// Path to the engine configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
