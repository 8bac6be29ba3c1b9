//! Concatenation of several inputs

use std::sync::Arc;

use super::infos::ExecutorInfos;
use super::traits::{Executor, ExecutorProperties};
use crate::config::DEFAULT_BATCH_SIZE;
use crate::engine::ExecutionState;
use crate::errors::ExecResult;
use crate::fetcher::MultiDependencySingleRowFetcher;
use crate::row::OutputRow;
use crate::stats::NoStats;

/// Emits all rows of the first dependency, then of the second, and so on
pub struct UnionExecutor {
    _infos: Arc<ExecutorInfos>,
    current_dependency: usize,
}

impl Executor for UnionExecutor {
    type Fetcher = MultiDependencySingleRowFetcher;
    type Infos = ExecutorInfos;
    type Stats = NoStats;

    const PROPERTIES: ExecutorProperties = ExecutorProperties {
        allows_block_passthrough: false,
        input_size_restricts_output_size: false,
    };
    const NAME: &'static str = "UnionNode";

    fn new(infos: Arc<ExecutorInfos>) -> Self {
        Self {
            _infos: infos,
            current_dependency: 0,
        }
    }

    fn produce_row(
        &mut self,
        fetcher: &mut MultiDependencySingleRowFetcher,
        output: &mut OutputRow,
    ) -> ExecResult<(ExecutionState, NoStats)> {
        let dependencies = fetcher.number_dependencies();
        loop {
            if self.current_dependency >= dependencies {
                return Ok((ExecutionState::Done, NoStats));
            }

            let (state, input) =
                fetcher.fetch_row_for_dependency(self.current_dependency, DEFAULT_BATCH_SIZE)?;
            if state == ExecutionState::Waiting {
                return Ok((state, NoStats));
            }
            if state == ExecutionState::Done {
                self.current_dependency += 1;
            }
            let exhausted = self.current_dependency >= dependencies;

            if let Some(row) = input {
                output.copy_row(&row)?;
                let state = if exhausted {
                    ExecutionState::Done
                } else {
                    ExecutionState::HasMore
                };
                return Ok((state, NoStats));
            }

            if exhausted {
                return Ok((ExecutionState::Done, NoStats));
            }
        }
    }
}
