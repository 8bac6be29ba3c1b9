//! Sort executor
//!
//! Reads its whole input before producing anything. Sorting is stable, so
//! rows with equal keys keep their input order.

use std::cmp::Ordering;
use std::sync::Arc;

use serde_json::Value;

use super::infos::ExecutorInfos;
use super::traits::{Executor, ExecutorProperties};
use crate::block::RegisterId;
use crate::config::DEFAULT_BATCH_SIZE;
use crate::engine::ExecutionState;
use crate::errors::{ErrorCode, ExecResult};
use crate::fetcher::{RowFetcher, SingleRowFetcher};
use crate::row::{InputRow, OutputRow};
use crate::stats::NoStats;
use crate::value::compare_cells;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortRegister {
    pub register: RegisterId,
    pub direction: SortDirection,
}

impl SortRegister {
    pub fn asc(register: RegisterId) -> Self {
        Self {
            register,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(register: RegisterId) -> Self {
        Self {
            register,
            direction: SortDirection::Desc,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SortInfos {
    base: ExecutorInfos,
    registers: Vec<SortRegister>,
}

impl SortInfos {
    pub fn new(base: ExecutorInfos, registers: Vec<SortRegister>) -> Self {
        Self { base, registers }
    }

    pub fn sort_registers(&self) -> &[SortRegister] {
        &self.registers
    }
}

impl AsRef<ExecutorInfos> for SortInfos {
    fn as_ref(&self) -> &ExecutorInfos {
        &self.base
    }
}

pub struct SortExecutor {
    infos: Arc<SortInfos>,
    rows: Vec<InputRow>,
    input_done: bool,
    position: usize,
}

impl SortExecutor {
    fn compare(&self, a: &[Option<Value>], b: &[Option<Value>]) -> Ordering {
        for ((key, x), y) in self.infos.registers.iter().zip(a).zip(b) {
            let ordering = compare_cells(x.as_ref(), y.as_ref());
            let ordering = match key.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    fn do_sorting(&mut self) {
        let keys: Vec<Vec<Option<Value>>> = self
            .rows
            .iter()
            .map(|row| {
                self.infos
                    .registers
                    .iter()
                    .map(|key| row.value(key.register))
                    .collect()
            })
            .collect();
        let mut order: Vec<usize> = (0..self.rows.len()).collect();
        order.sort_by(|&a, &b| self.compare(&keys[a], &keys[b]));

        let mut rows: Vec<Option<InputRow>> = std::mem::take(&mut self.rows)
            .into_iter()
            .map(Some)
            .collect();
        self.rows = order.into_iter().filter_map(|i| rows[i].take()).collect();
    }
}

impl Executor for SortExecutor {
    type Fetcher = SingleRowFetcher;
    type Infos = SortInfos;
    type Stats = NoStats;

    const PROPERTIES: ExecutorProperties = ExecutorProperties {
        allows_block_passthrough: false,
        input_size_restricts_output_size: true,
    };
    const NAME: &'static str = "SortNode";

    fn new(infos: Arc<SortInfos>) -> Self {
        Self {
            infos,
            rows: Vec::new(),
            input_done: false,
            position: 0,
        }
    }

    fn produce_row(
        &mut self,
        fetcher: &mut SingleRowFetcher,
        output: &mut OutputRow,
    ) -> ExecResult<(ExecutionState, NoStats)> {
        while !self.input_done {
            let (state, input) = fetcher.fetch_row(DEFAULT_BATCH_SIZE)?;
            if state == ExecutionState::Waiting {
                return Ok((state, NoStats));
            }
            if let Some(row) = input {
                self.rows.push(row);
            }
            if state == ExecutionState::Done {
                self.input_done = true;
                self.do_sorting();
            }
        }

        if self.position >= self.rows.len() {
            self.rows.clear();
            return Ok((ExecutionState::Done, NoStats));
        }

        output.copy_row(&self.rows[self.position])?;
        self.position += 1;

        if self.position >= self.rows.len() {
            // Last row handed out; release the upstream blocks held by the buffer
            self.rows.clear();
            self.position = 0;
            return Ok((ExecutionState::Done, NoStats));
        }
        Ok((ExecutionState::HasMore, NoStats))
    }

    fn number_of_rows_in_flight(&self) -> usize {
        self.rows.len() - self.position
    }

    fn shutdown(&mut self, _error: Option<ErrorCode>) -> ExecResult<ExecutionState> {
        self.rows.clear();
        self.position = 0;
        Ok(ExecutionState::Done)
    }
}
