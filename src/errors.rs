//! Execution error types
//!
//! Error codes:
//! - ROWFLOW_INTERNAL (FATAL)
//! - ROWFLOW_OUT_OF_MEMORY (FATAL)
//! - ROWFLOW_RESOURCE_LIMIT (ERROR)
//! - ROWFLOW_QUERY_KILLED (ERROR)
//! - ROWFLOW_EXECUTION_FAILED (ERROR)
//! - ROWFLOW_CONFIG_INVALID (ERROR)
//!
//! Internal errors are programming-invariant violations: the query is
//! aborted, nothing is retried. Everything else is an execution error that
//! travels upward through every ancestor's next call.

use std::fmt;

use thiserror::Error;

/// Severity levels for execution errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The query failed but the process is healthy
    Error,
    /// An invariant was broken; the query must be aborted
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Stable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Programming-invariant violation
    Internal,
    /// Block allocation failed
    OutOfMemory,
    /// Configured pool memory limit exceeded
    ResourceLimit,
    /// Query was cancelled by the user
    QueryKilled,
    /// Storage, remote or operator failure
    ExecutionFailed,
    /// Invalid configuration or plan
    ConfigInvalid,
}

impl ErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::Internal => "ROWFLOW_INTERNAL",
            ErrorCode::OutOfMemory => "ROWFLOW_OUT_OF_MEMORY",
            ErrorCode::ResourceLimit => "ROWFLOW_RESOURCE_LIMIT",
            ErrorCode::QueryKilled => "ROWFLOW_QUERY_KILLED",
            ErrorCode::ExecutionFailed => "ROWFLOW_EXECUTION_FAILED",
            ErrorCode::ConfigInvalid => "ROWFLOW_CONFIG_INVALID",
        }
    }

    /// Returns the severity level for this code
    pub fn severity(&self) -> Severity {
        match self {
            ErrorCode::Internal | ErrorCode::OutOfMemory => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Error raised by the execution engine or one of its executors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("internal error: {0}")]
    Internal(String),

    #[error("out of memory while allocating a block of {rows} x {registers}")]
    OutOfMemory { rows: usize, registers: usize },

    #[error("resource limit exceeded: {requested} cells requested, {available} available")]
    ResourceLimit { requested: usize, available: usize },

    #[error("query killed")]
    QueryKilled,

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
}

impl ExecutionError {
    /// Create an internal (invariant violation) error
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }

    /// Create an execution failure
    pub fn execution_failed(reason: impl Into<String>) -> Self {
        Self::ExecutionFailed(reason.into())
    }

    /// Create a configuration error
    pub fn config_invalid(reason: impl Into<String>) -> Self {
        Self::ConfigInvalid(reason.into())
    }

    /// Returns the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Internal(_) => ErrorCode::Internal,
            Self::OutOfMemory { .. } => ErrorCode::OutOfMemory,
            Self::ResourceLimit { .. } => ErrorCode::ResourceLimit,
            Self::QueryKilled => ErrorCode::QueryKilled,
            Self::ExecutionFailed(_) => ErrorCode::ExecutionFailed,
            Self::ConfigInvalid(_) => ErrorCode::ConfigInvalid,
        }
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code().severity()
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

/// Result type for execution operations
pub type ExecResult<T> = Result<T, ExecutionError>;
