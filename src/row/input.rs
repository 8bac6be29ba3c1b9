//! Read-only view of one row of a block

use serde_json::Value;

use crate::block::{Block, BlockId, BlockPool, RegisterId, RegisterSet, SharedBlock};
use crate::errors::ExecResult;

/// One row of an upstream block.
///
/// The view keeps its block alive; executors that buffer rows (sort) may
/// hold on to input rows across calls.
#[derive(Debug, Clone)]
pub struct InputRow {
    block: SharedBlock,
    row: usize,
}

impl InputRow {
    pub fn new(block: SharedBlock, row: usize) -> Self {
        debug_assert!(row < block.size());
        Self { block, row }
    }

    /// Value in `reg`, cloned out of the block
    pub fn value(&self, reg: RegisterId) -> Option<Value> {
        let block = self.block.borrow();
        if reg >= block.num_registers() {
            return None;
        }
        block.get(self.row, reg).cloned()
    }

    /// Whether `reg` holds no value in this row
    pub fn is_empty(&self, reg: RegisterId) -> bool {
        let block = self.block.borrow();
        reg >= block.num_registers() || block.is_empty_at(self.row, reg)
    }

    /// All register values of this row
    pub fn values(&self) -> Vec<Option<Value>> {
        self.block.borrow().row(self.row).to_vec()
    }

    pub fn num_registers(&self) -> usize {
        self.block.num_registers()
    }

    pub fn row_index(&self) -> usize {
        self.row
    }

    pub fn block_id(&self) -> BlockId {
        self.block.id()
    }

    /// Whether this row lives in `block`
    pub fn is_in(&self, block: &SharedBlock) -> bool {
        self.block.ptr_eq(block)
    }

    /// Copy the kept registers of this row into a fresh one-row block with
    /// `num_registers` registers
    pub fn clone_to_block(
        &self,
        pool: &BlockPool,
        keep: &RegisterSet,
        num_registers: usize,
    ) -> ExecResult<Block> {
        let mut target = pool.request_block(1, num_registers)?;
        let source = self.block.borrow();
        for &reg in keep {
            if reg < source.num_registers() && reg < num_registers {
                if let Some(v) = source.get(self.row, reg) {
                    target.set(0, reg, v.clone());
                }
            }
        }
        Ok(target)
    }
}
