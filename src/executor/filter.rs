//! Filter executor

use std::sync::Arc;

use super::infos::ExecutorInfos;
use super::traits::{Executor, ExecutorProperties};
use crate::block::RegisterId;
use crate::config::DEFAULT_BATCH_SIZE;
use crate::engine::ExecutionState;
use crate::errors::ExecResult;
use crate::fetcher::{RowFetcher, SingleRowFetcher};
use crate::row::OutputRow;
use crate::stats::FilterStats;
use crate::value::to_boolean;

#[derive(Debug, Clone)]
pub struct FilterInfos {
    base: ExecutorInfos,
    input_register: RegisterId,
}

impl FilterInfos {
    pub fn new(base: ExecutorInfos, input_register: RegisterId) -> Self {
        Self {
            base,
            input_register,
        }
    }

    pub fn input_register(&self) -> RegisterId {
        self.input_register
    }
}

impl AsRef<ExecutorInfos> for FilterInfos {
    fn as_ref(&self) -> &ExecutorInfos {
        &self.base
    }
}

/// Passes rows whose condition register is truthy; an empty register
/// counts as false
pub struct FilterExecutor {
    infos: Arc<FilterInfos>,
}

impl Executor for FilterExecutor {
    type Fetcher = SingleRowFetcher;
    type Infos = FilterInfos;
    type Stats = FilterStats;

    const PROPERTIES: ExecutorProperties = ExecutorProperties {
        allows_block_passthrough: false,
        input_size_restricts_output_size: false,
    };
    const NAME: &'static str = "FilterNode";

    fn new(infos: Arc<FilterInfos>) -> Self {
        Self { infos }
    }

    fn produce_row(
        &mut self,
        fetcher: &mut SingleRowFetcher,
        output: &mut OutputRow,
    ) -> ExecResult<(ExecutionState, FilterStats)> {
        let mut stats = FilterStats::default();
        loop {
            let (state, input) = fetcher.fetch_row(DEFAULT_BATCH_SIZE)?;
            if state == ExecutionState::Waiting {
                return Ok((state, stats));
            }

            let row = match input {
                Some(row) => row,
                None => return Ok((state, stats)),
            };

            let passes = row
                .value(self.infos.input_register)
                .map(|v| to_boolean(&v))
                .unwrap_or(false);
            if passes {
                output.copy_row(&row)?;
                return Ok((state, stats));
            }

            stats.incr_filtered();
            if state == ExecutionState::Done {
                return Ok((state, stats));
            }
        }
    }
}
