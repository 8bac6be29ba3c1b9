//! Fetchers: how an executor sees its upstream
//!
//! A fetcher wraps a [`BlockFetcher`] and exposes rows one at a time
//! ([`RowFetcher::fetch_row`]), whole upstream blocks for passthrough, or a
//! look-ahead row count for size-restricted executors. Every call answers
//! with an [`ExecutionState`](crate::engine::ExecutionState); `Waiting`
//! carries no data and is retried verbatim.

mod block_fetcher;
mod constant;
mod multi_dependency;
mod single_row;

pub use block_fetcher::BlockFetcher;
pub use constant::ConstFetcher;
pub use multi_dependency::MultiDependencySingleRowFetcher;
pub use single_row::SingleRowFetcher;

use crate::block::SharedBlock;
use crate::engine::ExecutionState;
use crate::errors::{ExecResult, ExecutionError};
use crate::executor::ExecutorInfos;
use crate::row::InputRow;

/// Upstream access owned by an execution block and lent to its executor
pub trait Fetcher: Sized {
    fn new(block_fetcher: BlockFetcher) -> Self;

    /// Bind the row an execution pass starts from.
    ///
    /// Called after construction and on every cursor reset. Only fetchers
    /// that start a pipeline use it.
    fn bind_input(&mut self, _input: Option<&InputRow>, _infos: &ExecutorInfos) -> ExecResult<()> {
        Ok(())
    }

    /// Hand the next upstream block over unchanged
    fn fetch_block_for_passthrough(
        &mut self,
        _at_most: usize,
    ) -> ExecResult<(ExecutionState, Option<SharedBlock>)> {
        Err(ExecutionError::internal(
            "fetcher does not support block passthrough",
        ))
    }

    /// Number of rows available without consuming them
    fn pre_fetch_number_of_rows(&mut self, _at_most: usize) -> ExecResult<(ExecutionState, usize)> {
        Err(ExecutionError::internal(
            "fetcher does not support size prediction",
        ))
    }

    /// `Done` once upstream has nothing more to deliver
    fn upstream_state(&self) -> ExecutionState;

    /// Whether rows fetched from upstream are still waiting to be read
    fn has_buffered_rows(&self) -> bool;
}

/// Fetchers that hand out one row at a time from a single stream
pub trait RowFetcher: Fetcher {
    /// Next input row.
    ///
    /// `Done` may carry the last row or none; `HasMore` always carries a row;
    /// `Waiting` never does.
    fn fetch_row(&mut self, at_most: usize) -> ExecResult<(ExecutionState, Option<InputRow>)>;
}
