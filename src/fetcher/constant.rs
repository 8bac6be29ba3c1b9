//! Fetcher over a single injected block

use super::{BlockFetcher, Fetcher, RowFetcher};
use crate::block::SharedBlock;
use crate::engine::ExecutionState;
use crate::errors::ExecResult;
use crate::executor::ExecutorInfos;
use crate::row::InputRow;

/// Fetcher that starts a pipeline.
///
/// It never talks to a dependency: its only block is cloned from the input
/// row bound at cursor reset, or is a single empty row when no input row is
/// bound.
pub struct ConstFetcher {
    block_fetcher: BlockFetcher,
    current_block: Option<SharedBlock>,
    row_index: usize,
}

impl ConstFetcher {
    /// Replace the block handed out by this fetcher
    pub fn inject_block(&mut self, block: SharedBlock) {
        self.current_block = Some(block);
        self.row_index = 0;
    }

    fn index_is_valid(&self) -> bool {
        match &self.current_block {
            Some(block) => self.row_index < block.size(),
            None => false,
        }
    }
}

impl Fetcher for ConstFetcher {
    fn new(block_fetcher: BlockFetcher) -> Self {
        Self {
            block_fetcher,
            current_block: None,
            row_index: 0,
        }
    }

    fn bind_input(&mut self, input: Option<&InputRow>, infos: &ExecutorInfos) -> ExecResult<()> {
        let pool = self.block_fetcher.pool();
        let block = match input {
            Some(row) => row.clone_to_block(
                pool,
                infos.registers_to_keep(),
                infos.number_of_output_registers(),
            )?,
            None => pool.request_block(1, infos.number_of_output_registers())?,
        };
        self.inject_block(SharedBlock::new(block));
        Ok(())
    }

    fn fetch_block_for_passthrough(
        &mut self,
        _at_most: usize,
    ) -> ExecResult<(ExecutionState, Option<SharedBlock>)> {
        if !self.index_is_valid() {
            self.current_block = None;
            return Ok((ExecutionState::Done, None));
        }
        let block = self.current_block.clone();
        Ok((ExecutionState::Done, block))
    }

    fn pre_fetch_number_of_rows(&mut self, _at_most: usize) -> ExecResult<(ExecutionState, usize)> {
        let remaining = match &self.current_block {
            Some(block) => block.size().saturating_sub(self.row_index),
            None => 0,
        };
        Ok((ExecutionState::Done, remaining))
    }

    fn upstream_state(&self) -> ExecutionState {
        ExecutionState::Done
    }

    fn has_buffered_rows(&self) -> bool {
        self.index_is_valid()
    }
}

impl RowFetcher for ConstFetcher {
    fn fetch_row(&mut self, _at_most: usize) -> ExecResult<(ExecutionState, Option<InputRow>)> {
        if !self.index_is_valid() {
            self.current_block = None;
            return Ok((ExecutionState::Done, None));
        }
        let block = match &self.current_block {
            Some(block) => block.clone(),
            None => return Ok((ExecutionState::Done, None)),
        };

        let row = InputRow::new(block.clone(), self.row_index);
        self.row_index += 1;
        if self.row_index >= block.size() {
            self.current_block = None;
            self.row_index = 0;
            return Ok((ExecutionState::Done, Some(row)));
        }
        Ok((ExecutionState::HasMore, Some(row)))
    }
}
