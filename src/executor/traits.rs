//! The executor plug-in contract

use std::sync::Arc;

use super::infos::ExecutorInfos;
use crate::engine::ExecutionState;
use crate::errors::{ErrorCode, ExecResult};
use crate::fetcher::Fetcher;
use crate::row::OutputRow;
use crate::stats::ExecutorStats;

/// Static capabilities of an executor type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorProperties {
    /// Output is written into the upstream block instead of a fresh one.
    /// Such an executor must produce exactly one output row per input row.
    pub allows_block_passthrough: bool,
    /// Output never has more rows than the input still available plus the
    /// rows the executor holds, so output blocks may be sized by look-ahead
    pub input_size_restricts_output_size: bool,
}

/// Operator-specific row production plugged into
/// [`ExecutionBlockImpl`](crate::engine::ExecutionBlockImpl).
///
/// The engine owns both the fetcher and the executor and lends the fetcher
/// to every call. A fresh executor is built on every cursor reset.
pub trait Executor: Sized {
    type Fetcher: Fetcher;
    type Infos: AsRef<ExecutorInfos>;
    type Stats: ExecutorStats;

    const PROPERTIES: ExecutorProperties;
    const NAME: &'static str;

    fn new(infos: Arc<Self::Infos>) -> Self;

    /// Produce at most one row.
    ///
    /// Either writes `output` and leaves it produced, produces nothing, or
    /// answers `Waiting` without touching anything. Answers `Done` exactly
    /// once, on the call that exhausts the input.
    fn produce_row(
        &mut self,
        fetcher: &mut Self::Fetcher,
        output: &mut OutputRow,
    ) -> ExecResult<(ExecutionState, Self::Stats)>;

    /// Rows already read from upstream but not yet produced
    fn number_of_rows_in_flight(&self) -> usize {
        0
    }

    /// Executor-specific teardown, run after the shutdown cascade reached
    /// every dependency. May answer `Waiting`.
    fn shutdown(&mut self, _error: Option<ErrorCode>) -> ExecResult<ExecutionState> {
        Ok(ExecutionState::Done)
    }
}
