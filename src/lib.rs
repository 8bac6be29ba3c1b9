//! rowflow - A pull-based row pipeline execution engine
//!
//! Queries run as trees of execution blocks exchanging fixed-width blocks
//! of rows under the WAITING/HASMORE/DONE protocol.

pub mod block;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod fetcher;
pub mod observability;
pub mod plan;
pub mod row;
pub mod stats;
pub mod value;

#[cfg(test)]
mod testing;
