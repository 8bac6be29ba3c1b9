//! Execution engine
//!
//! A query runs as a tree of [`ExecutionBlock`]s. The consumer pulls rows
//! from the root with `get_some`/`skip_some`; each stage pulls from its
//! dependencies through a fetcher and lets its executor fill output blocks.
//!
//! Single-threaded per tree: stages are shared through `Rc<RefCell<_>>`.
//! Only the kill flag, the statistics sink and the pool may be touched from
//! other threads.

mod block_impl;
mod context;
mod driver;
mod execution_block;
mod state;
mod tree;

pub use block_impl::ExecutionBlockImpl;
pub use context::QueryContext;
pub use driver::{QueryDriver, WaitHook, DEFAULT_MAX_WAITS};
pub use execution_block::{borrow_block, ExecutionBlock, ExecutionBlockRef};
pub use state::ExecutionState;
pub use tree::ExecutionTree;
