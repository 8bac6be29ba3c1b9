//! Row × register value grid

use std::mem;
use std::sync::Arc;

use serde_json::{json, Value};

use super::pool::PoolShared;
use super::RegisterId;

/// Identity of a block handed out by a pool.
///
/// A fresh id is assigned on every request, so two blocks with the same id
/// are the same hand-out (passthrough reuse keeps the id).
pub type BlockId = u64;

/// A dense grid of `rows × registers` cells.
///
/// An empty cell (`None`) is a register that was never written or was
/// cleared. The block returns its buffer to the owning pool on drop, so
/// every exit path releases it exactly once.
#[derive(Debug)]
pub struct Block {
    id: BlockId,
    rows: usize,
    capacity_rows: usize,
    registers: usize,
    cells: Vec<Option<Value>>,
    pool: Option<Arc<PoolShared>>,
}

impl Block {
    pub(super) fn from_parts(
        id: BlockId,
        rows: usize,
        registers: usize,
        cells: Vec<Option<Value>>,
        pool: Arc<PoolShared>,
    ) -> Self {
        debug_assert_eq!(cells.len(), rows * registers);
        Self {
            id,
            rows,
            capacity_rows: rows,
            registers,
            cells,
            pool: Some(pool),
        }
    }

    /// Block identity
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Number of rows
    pub fn size(&self) -> usize {
        self.rows
    }

    /// Number of rows the block was allocated with
    pub fn capacity_rows(&self) -> usize {
        self.capacity_rows
    }

    /// Number of registers per row
    pub fn num_registers(&self) -> usize {
        self.registers
    }

    /// Number of cells the block occupies in its pool's accounting
    pub(super) fn reserved_cells(&self) -> usize {
        self.capacity_rows * self.registers
    }

    #[inline]
    fn index(&self, row: usize, reg: RegisterId) -> usize {
        debug_assert!(row < self.rows, "row {} out of {}", row, self.rows);
        debug_assert!(
            reg < self.registers,
            "register {} out of {}",
            reg,
            self.registers
        );
        row * self.registers + reg
    }

    /// Value stored at `(row, reg)`, `None` if the cell is empty
    pub fn get(&self, row: usize, reg: RegisterId) -> Option<&Value> {
        self.cells[self.index(row, reg)].as_ref()
    }

    /// Whether `(row, reg)` holds no value
    pub fn is_empty_at(&self, row: usize, reg: RegisterId) -> bool {
        self.get(row, reg).is_none()
    }

    /// Write a value into `(row, reg)`
    pub fn set(&mut self, row: usize, reg: RegisterId, value: Value) {
        let idx = self.index(row, reg);
        self.cells[idx] = Some(value);
    }

    /// Empty the cell at `(row, reg)`, returning its previous value
    pub fn clear(&mut self, row: usize, reg: RegisterId) -> Option<Value> {
        let idx = self.index(row, reg);
        self.cells[idx].take()
    }

    /// All cells of one row
    pub fn row(&self, row: usize) -> &[Option<Value>] {
        debug_assert!(row < self.rows, "row {} out of {}", row, self.rows);
        let start = row * self.registers;
        &self.cells[start..start + self.registers]
    }

    /// Reduce the row count, emptying every cell past the new end
    pub fn shrink(&mut self, rows: usize) {
        debug_assert!(rows <= self.rows);
        if rows >= self.rows {
            return;
        }
        for cell in &mut self.cells[rows * self.registers..self.rows * self.registers] {
            *cell = None;
        }
        self.rows = rows;
    }

    /// Empty every cell and resize to `rows` within the allocated capacity.
    ///
    /// Returns false (leaving the block untouched) if `rows` exceeds the
    /// capacity the block was allocated with.
    pub fn reset(&mut self, rows: usize) -> bool {
        if rows > self.capacity_rows {
            return false;
        }
        for cell in &mut self.cells {
            *cell = None;
        }
        self.rows = rows;
        true
    }

    /// Whether every listed register is empty in every row
    pub fn registers_empty<'a>(&self, regs: impl IntoIterator<Item = &'a RegisterId>) -> bool {
        regs.into_iter()
            .all(|&reg| reg < self.registers && (0..self.rows).all(|row| self.is_empty_at(row, reg)))
    }

    /// JSON rendering used by trace logging
    pub fn to_json(&self) -> Value {
        let rows: Vec<Value> = (0..self.rows)
            .map(|r| {
                Value::Array(
                    self.row(r)
                        .iter()
                        .map(|c| c.clone().unwrap_or(Value::Null))
                        .collect(),
                )
            })
            .collect();
        json!({
            "id": self.id,
            "registers": self.registers,
            "rows": rows,
        })
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            let reserved = self.reserved_cells();
            pool.give_back(mem::take(&mut self.cells), reserved);
        }
    }
}
