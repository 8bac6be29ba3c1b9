//! JSON query plans
//!
//! A plan names a list of source values and a linear chain of stages over
//! variables. [`build`] turns it into an [`ExecutionTree`](crate::engine::ExecutionTree)
//! with one register per variable.

mod ast;
mod builder;
mod expression;

pub use ast::{Expr, Plan, SortKey, Source, Stage};
pub use builder::{build, BuiltPlan, SCAN_NODE, SINGLETON_NODE};
pub use expression::{Arithmetic, CompiledExpr, Comparison};
