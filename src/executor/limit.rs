//! Offset/limit executor with optional full count

use std::sync::Arc;

use super::infos::ExecutorInfos;
use super::traits::{Executor, ExecutorProperties};
use crate::config::DEFAULT_BATCH_SIZE;
use crate::engine::ExecutionState;
use crate::errors::ExecResult;
use crate::fetcher::{RowFetcher, SingleRowFetcher};
use crate::row::OutputRow;
use crate::stats::LimitStats;

#[derive(Debug, Clone)]
pub struct LimitInfos {
    base: ExecutorInfos,
    offset: usize,
    limit: usize,
    full_count: bool,
}

impl LimitInfos {
    pub fn new(base: ExecutorInfos, offset: usize, limit: usize, full_count: bool) -> Self {
        Self {
            base,
            offset,
            limit,
            full_count,
        }
    }

    fn limit_plus_offset(&self) -> usize {
        self.offset.saturating_add(self.limit)
    }
}

impl AsRef<ExecutorInfos> for LimitInfos {
    fn as_ref(&self) -> &ExecutorInfos {
        &self.base
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LimitState {
    /// Still inside the offset
    Skipping,
    /// Inside the window, more rows to return after this one
    Returning,
    /// The next row is the last one of the window and no full count follows
    ReturningLastRow,
    /// Window done; consuming the rest of the input for the full count
    Counting,
    /// Window done and nothing left to count
    LimitReached,
}

/// Returns rows `offset .. offset + limit` of its input.
///
/// Finishes as soon as the window is returned unless the full count is
/// requested, in which case the remaining input is consumed and counted.
pub struct LimitExecutor {
    infos: Arc<LimitInfos>,
    counter: usize,
}

impl LimitExecutor {
    fn current_state(&self) -> LimitState {
        let end = self.infos.limit_plus_offset();
        if self.counter < self.infos.offset {
            return LimitState::Skipping;
        }
        if self.counter < end {
            if self.counter + 1 == end && !self.infos.full_count {
                return LimitState::ReturningLastRow;
            }
            return LimitState::Returning;
        }
        if self.infos.full_count {
            LimitState::Counting
        } else {
            LimitState::LimitReached
        }
    }

    fn max_rows_left_to_fetch(&self) -> usize {
        if self.infos.full_count {
            return DEFAULT_BATCH_SIZE;
        }
        self.infos
            .limit_plus_offset()
            .saturating_sub(self.counter)
            .clamp(1, DEFAULT_BATCH_SIZE)
    }
}

impl Executor for LimitExecutor {
    type Fetcher = SingleRowFetcher;
    type Infos = LimitInfos;
    type Stats = LimitStats;

    const PROPERTIES: ExecutorProperties = ExecutorProperties {
        allows_block_passthrough: false,
        input_size_restricts_output_size: false,
    };
    const NAME: &'static str = "LimitNode";

    fn new(infos: Arc<LimitInfos>) -> Self {
        Self { infos, counter: 0 }
    }

    fn produce_row(
        &mut self,
        fetcher: &mut SingleRowFetcher,
        output: &mut OutputRow,
    ) -> ExecResult<(ExecutionState, LimitStats)> {
        let mut stats = LimitStats::default();

        loop {
            let limit_state = self.current_state();
            if limit_state == LimitState::LimitReached {
                return Ok((ExecutionState::Done, stats));
            }

            let (state, input) = fetcher.fetch_row(self.max_rows_left_to_fetch())?;
            if state == ExecutionState::Waiting {
                return Ok((state, stats));
            }

            let row = match input {
                Some(row) => row,
                None => return Ok((state, stats)),
            };

            self.counter += 1;
            if self.infos.full_count {
                stats.incr_full_count();
            }

            match limit_state {
                LimitState::Returning => {
                    output.copy_row(&row)?;
                    return Ok((state, stats));
                }
                LimitState::ReturningLastRow => {
                    output.copy_row(&row)?;
                    return Ok((ExecutionState::Done, stats));
                }
                _ => {}
            }

            if state == ExecutionState::Done {
                return Ok((state, stats));
            }
        }
    }
}
