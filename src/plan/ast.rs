//! Plan file structures
//!
//! A plan is a list of values bound to a source variable followed by a
//! linear chain of stages:
//!
//! ```json
//! {
//!   "source": {"var": "doc", "values": [{"n": 1}, {"n": 2}]},
//!   "stages": [
//!     {"calculation": {"out": "big", "expr": {"gt": [{"attribute": [{"var": "doc"}, "n"]}, {"const": 1}]}}},
//!     {"filter": {"var": "big"}},
//!     {"limit": {"offset": 0, "limit": 10}}
//!   ],
//!   "return": "doc"
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ExecResult, ExecutionError};

/// Complete plan file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub source: Source,

    #[serde(default)]
    pub stages: Vec<Stage>,

    /// Variable whose values are printed
    #[serde(rename = "return")]
    pub return_var: String,
}

/// Documents the plan scans
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub var: String,
    #[serde(default)]
    pub values: Vec<Value>,
}

/// One step of the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Bind `expr` to a new variable
    Calculation { out: String, expr: Expr },
    /// Keep rows whose variable is truthy
    Filter { var: String },
    /// Rows `offset .. offset + limit`
    Limit {
        #[serde(default)]
        offset: usize,
        limit: usize,
        #[serde(default)]
        full_count: bool,
    },
    /// Stable sort by the listed keys
    Sort(Vec<SortKey>),
    /// One row per element of an array variable
    Enumerate { var: String, out: String },
}

impl Stage {
    /// Returns the stage name for diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Calculation { .. } => "calculation",
            Stage::Filter { .. } => "filter",
            Stage::Limit { .. } => "limit",
            Stage::Sort(_) => "sort",
            Stage::Enumerate { .. } => "enumerate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub var: String,
    #[serde(default)]
    pub descending: bool,
}

/// Expression tree evaluated per row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Const(Value),
    Var(String),
    /// Attribute `name` of an object, null for anything else
    Attribute(Box<Expr>, String),
    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Le(Box<Expr>, Box<Expr>),
    Gt(Box<Expr>, Box<Expr>),
    Ge(Box<Expr>, Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl Plan {
    /// Load a plan from file
    pub fn load(path: &Path) -> ExecResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ExecutionError::config_invalid(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> ExecResult<Self> {
        serde_json::from_str(content)
            .map_err(|e| ExecutionError::config_invalid(format!("invalid plan JSON: {}", e)))
    }
}
