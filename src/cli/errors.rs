//! CLI-specific error types

use std::fmt;
use std::io;

use crate::errors::{ErrorCode, ExecutionError};

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// Plan file error
    PlanError,
    /// I/O error (stdout)
    IoError,
    /// The query failed while executing
    ExecutionFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "ROWFLOW_CLI_CONFIG_ERROR",
            Self::PlanError => "ROWFLOW_CLI_PLAN_ERROR",
            Self::IoError => "ROWFLOW_CLI_IO_ERROR",
            Self::ExecutionFailed => "ROWFLOW_CLI_EXECUTION_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// Plan error
    pub fn plan_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::PlanError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Engine error raised while running the query
    pub fn execution_failed(err: &ExecutionError) -> Self {
        Self::new(
            CliErrorCode::ExecutionFailed,
            format!("{} ({})", err, err.code()),
        )
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ExecutionError> for CliError {
    fn from(e: ExecutionError) -> Self {
        match e.code() {
            ErrorCode::ConfigInvalid => Self::plan_error(e.to_string()),
            _ => Self::execution_failed(&e),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
