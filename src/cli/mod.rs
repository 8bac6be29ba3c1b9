//! CLI module for rowflow
//!
//! Provides command-line interface for:
//! - run: Execute a plan file and print rows and statistics
//! - validate: Check a plan and configuration without executing

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{execute, load_config, run, run_command, validate};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{response, write_error, write_response, write_response_to};
