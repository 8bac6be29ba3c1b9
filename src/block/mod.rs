//! Blocks and the pool that hands them out
//!
//! A block is the unit of data transfer between execution stages: a dense
//! `rows × registers` grid of JSON values. Blocks come from a [`BlockPool`]
//! and go back to it when dropped.

mod block;
mod pool;
mod shared;

use std::collections::BTreeSet;

pub use block::{Block, BlockId};
pub use pool::{BlockPool, PoolConfig, PoolStats};
pub use shared::SharedBlock;

/// Index of a register (column slot) within a block row
pub type RegisterId = usize;

/// Ordered set of registers
pub type RegisterSet = BTreeSet<RegisterId>;
