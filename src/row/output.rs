//! Write cursor over an output block

use std::sync::Arc;

use serde_json::Value;

use super::input::InputRow;
use crate::block::{Block, BlockId, RegisterId, RegisterSet, SharedBlock};
use crate::errors::{ExecResult, ExecutionError};

/// How the input row reaches the output row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyRowBehaviour {
    /// Copy kept registers from the input row into a fresh output block
    CopyInputRows,
    /// The output block is the input block (passthrough); nothing is copied
    DoNotCopyInputRows,
}

/// Cursor writing one logical row at a time into an output block.
///
/// A row counts as produced once the input row has been copied and every
/// output register has been written or cleared; only then may it advance.
#[derive(Debug)]
pub struct OutputRow {
    block: Option<SharedBlock>,
    base_index: usize,
    output_registers: Arc<RegisterSet>,
    registers_to_keep: Arc<RegisterSet>,
    registers_to_clear: Arc<RegisterSet>,
    behaviour: CopyRowBehaviour,
    written: Vec<RegisterId>,
    input_row_copied: bool,
}

impl OutputRow {
    pub fn new(
        block: SharedBlock,
        output_registers: Arc<RegisterSet>,
        registers_to_keep: Arc<RegisterSet>,
        registers_to_clear: Arc<RegisterSet>,
        behaviour: CopyRowBehaviour,
    ) -> Self {
        Self {
            block: Some(block),
            base_index: 0,
            output_registers,
            registers_to_keep,
            registers_to_clear,
            behaviour,
            written: Vec::new(),
            input_row_copied: false,
        }
    }

    fn block(&self) -> ExecResult<&SharedBlock> {
        self.block
            .as_ref()
            .ok_or_else(|| ExecutionError::internal("output row has no block"))
    }

    /// Write `value` into output register `reg` of the current row and copy
    /// the rest of `source` alongside it.
    pub fn set_value(&mut self, reg: RegisterId, source: &InputRow, value: Value) -> ExecResult<()> {
        self.check_output_register(reg)?;
        {
            let block = self.block()?;
            let mut block = block.borrow_mut();
            if !block.is_empty_at(self.base_index, reg) {
                return Err(ExecutionError::internal(format!(
                    "output register {} of row {} written twice",
                    reg, self.base_index
                )));
            }
            block.set(self.base_index, reg, value);
        }
        self.written.push(reg);
        if !self.input_row_copied {
            self.copy_row(source)?;
        }
        Ok(())
    }

    /// Declare output register `reg` as intentionally empty for this row
    pub fn clear_value(&mut self, reg: RegisterId, source: &InputRow) -> ExecResult<()> {
        self.check_output_register(reg)?;
        if self.written.contains(&reg) {
            return Err(ExecutionError::internal(format!(
                "output register {} of row {} written twice",
                reg, self.base_index
            )));
        }
        self.written.push(reg);
        if !self.input_row_copied {
            self.copy_row(source)?;
        }
        Ok(())
    }

    fn check_output_register(&self, reg: RegisterId) -> ExecResult<()> {
        if !self.output_registers.contains(&reg) {
            return Err(ExecutionError::internal(format!(
                "register {} is not an output register",
                reg
            )));
        }
        if self.written.contains(&reg) {
            return Err(ExecutionError::internal(format!(
                "output register {} of row {} written twice",
                reg, self.base_index
            )));
        }
        Ok(())
    }

    /// Carry `source` over into the current row
    pub fn copy_row(&mut self, source: &InputRow) -> ExecResult<()> {
        if self.input_row_copied {
            return Ok(());
        }
        let row = self.base_index;
        match self.behaviour {
            CopyRowBehaviour::CopyInputRows => {
                let block = self.block()?;
                let mut target = block.borrow_mut();
                for &reg in self.registers_to_keep.iter() {
                    if reg >= target.num_registers() {
                        continue;
                    }
                    if let Some(v) = source.value(reg) {
                        target.set(row, reg, v);
                    }
                }
            }
            CopyRowBehaviour::DoNotCopyInputRows => {
                let block = self.block()?;
                if !source.is_in(block) || source.row_index() != row {
                    return Err(ExecutionError::internal(format!(
                        "passthrough row {} of block {} does not match output row {}",
                        source.row_index(),
                        source.block_id(),
                        row
                    )));
                }
                let mut target = block.borrow_mut();
                for &reg in self.registers_to_clear.iter() {
                    if reg < target.num_registers() {
                        target.clear(row, reg);
                    }
                }
            }
        }
        self.input_row_copied = true;
        Ok(())
    }

    /// Whether the current row is complete
    pub fn produced(&self) -> bool {
        self.input_row_copied && self.all_values_written()
    }

    fn all_values_written(&self) -> bool {
        self.written.len() == self.output_registers.len()
    }

    /// Move on to the next row
    pub fn advance_row(&mut self) -> ExecResult<()> {
        if !self.produced() {
            return Err(ExecutionError::internal(format!(
                "row {} advanced before all output registers were written",
                self.base_index
            )));
        }
        self.base_index += 1;
        self.written.clear();
        self.input_row_copied = false;
        Ok(())
    }

    /// Whether every row of the block has been written
    pub fn is_full(&self) -> bool {
        match &self.block {
            Some(block) => self.base_index >= block.size(),
            None => true,
        }
    }

    pub fn num_rows_written(&self) -> usize {
        self.base_index
    }

    /// Index of the row currently being written
    pub fn row_index(&self) -> usize {
        self.base_index
    }

    pub fn block_id(&self) -> Option<BlockId> {
        self.block.as_ref().map(|b| b.id())
    }

    /// Take the block out of the cursor, trimmed to the rows written.
    ///
    /// Returns `None` when no row was written; the empty block goes back to
    /// its pool.
    pub fn steal_block(&mut self) -> ExecResult<Option<Block>> {
        let shared = match self.block.take() {
            Some(b) => b,
            None => return Ok(None),
        };
        if self.base_index == 0 {
            return Ok(None);
        }
        let mut block = shared.into_block()?;
        block.shrink(self.base_index);
        Ok(Some(block))
    }

    /// Take the block out of the cursor untrimmed, rows written or not
    pub fn into_block(mut self) -> ExecResult<Option<Block>> {
        self.block.take().map(SharedBlock::into_block).transpose()
    }
}
