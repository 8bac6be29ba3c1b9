//! Engine configuration
//!
//! Loaded from a JSON file. Every field is optional and falls back to its
//! default; unknown profile names and zero sizes are rejected.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::block::PoolConfig;
use crate::errors::{ExecResult, ExecutionError};

/// Rows requested per pull when the caller has no preference
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// How much profiling the engine records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileLevel {
    /// Nothing recorded
    #[default]
    Off,
    /// Per-node calls, items and runtime
    Blocks,
    /// Blocks plus a log line per pull call
    Trace1,
    /// Trace1 plus the produced block contents
    Trace2,
}

impl ProfileLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileLevel::Off => "off",
            ProfileLevel::Blocks => "blocks",
            ProfileLevel::Trace1 => "trace1",
            ProfileLevel::Trace2 => "trace2",
        }
    }
}

impl fmt::Display for ProfileLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Rows per pull issued by the query driver (default 1000)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Profiling level (default off)
    #[serde(default)]
    pub profile: ProfileLevel,

    /// Block pool sizing
    #[serde(default)]
    pub pool: PoolConfig,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            profile: ProfileLevel::default(),
            pool: PoolConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> ExecResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ExecutionError::config_invalid(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate configuration text
    pub fn from_json(content: &str) -> ExecResult<Self> {
        let config: EngineConfig = serde_json::from_str(content)
            .map_err(|e| ExecutionError::config_invalid(format!("invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> ExecResult<()> {
        if self.batch_size == 0 {
            return Err(ExecutionError::config_invalid("batch_size must be > 0"));
        }

        if let Some(max_cells) = self.pool.max_cells {
            if max_cells == 0 {
                return Err(ExecutionError::config_invalid("pool.max_cells must be > 0"));
            }
        }

        Ok(())
    }
}
