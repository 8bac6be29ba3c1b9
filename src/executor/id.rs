//! Identity executor

use std::marker::PhantomData;
use std::sync::Arc;

use super::infos::ExecutorInfos;
use super::traits::{Executor, ExecutorProperties};
use crate::config::DEFAULT_BATCH_SIZE;
use crate::engine::ExecutionState;
use crate::errors::ExecResult;
use crate::fetcher::RowFetcher;
use crate::row::OutputRow;
use crate::stats::NoStats;

/// Forwards every input row unchanged, reusing the upstream block.
///
/// Over a [`ConstFetcher`](crate::fetcher::ConstFetcher) it is the start of
/// a pipeline and emits the row bound at cursor reset.
pub struct IdExecutor<F> {
    _infos: Arc<ExecutorInfos>,
    _fetcher: PhantomData<F>,
}

impl<F: RowFetcher> Executor for IdExecutor<F> {
    type Fetcher = F;
    type Infos = ExecutorInfos;
    type Stats = NoStats;

    const PROPERTIES: ExecutorProperties = ExecutorProperties {
        allows_block_passthrough: true,
        input_size_restricts_output_size: false,
    };
    const NAME: &'static str = "IdNode";

    fn new(infos: Arc<ExecutorInfos>) -> Self {
        Self {
            _infos: infos,
            _fetcher: PhantomData,
        }
    }

    fn produce_row(
        &mut self,
        fetcher: &mut F,
        output: &mut OutputRow,
    ) -> ExecResult<(ExecutionState, NoStats)> {
        let (state, input) = fetcher.fetch_row(DEFAULT_BATCH_SIZE)?;
        if let Some(row) = input {
            output.copy_row(&row)?;
        }
        Ok((state, NoStats))
    }
}
