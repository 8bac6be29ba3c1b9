//! Block pool
//!
//! Hands out [`Block`]s and recycles their buffers when they are dropped.
//! Outstanding blocks and cells are tracked so callers can verify that a
//! drained or reset tree released everything it held.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::block::{Block, BlockId};
use crate::errors::{ExecResult, ExecutionError};
use crate::observability::{EngineMetrics, Event, Logger};

/// Pool sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum number of returned buffers kept for reuse
    #[serde(default = "default_max_cached_blocks")]
    pub max_cached_blocks: usize,

    /// Upper bound on cells held by outstanding blocks (None = unbounded)
    #[serde(default)]
    pub max_cells: Option<usize>,
}

fn default_max_cached_blocks() -> usize {
    64
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_cached_blocks: default_max_cached_blocks(),
            max_cells: None,
        }
    }
}

/// Point-in-time pool accounting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Total `request_block` calls served
    pub requests: u64,
    /// Requests that needed a fresh allocation
    pub fresh_allocations: u64,
    /// Requests served from the free list
    pub recycled: u64,
    /// Blocks handed out and not yet returned
    pub outstanding: usize,
    /// Cells held by outstanding blocks
    pub outstanding_cells: usize,
    /// Buffers waiting in the free list
    pub cached: usize,
}

#[derive(Debug, Default)]
struct PoolState {
    free: Vec<Vec<Option<Value>>>,
    stats: PoolStats,
}

#[derive(Debug)]
pub(crate) struct PoolShared {
    config: PoolConfig,
    state: Mutex<PoolState>,
    next_id: AtomicU64,
    metrics: Arc<EngineMetrics>,
}

impl PoolShared {
    pub(super) fn give_back(&self, mut cells: Vec<Option<Value>>, reserved: usize) {
        let mut state = self.state.lock();
        state.stats.outstanding = state.stats.outstanding.saturating_sub(1);
        state.stats.outstanding_cells = state.stats.outstanding_cells.saturating_sub(reserved);
        if cells.capacity() > 0 && state.free.len() < self.config.max_cached_blocks {
            cells.clear();
            state.free.push(cells);
        }
        state.stats.cached = state.free.len();
        drop(state);
        self.metrics.increment_blocks_returned();
    }
}

/// Shared handle to a block pool.
///
/// Cloning the handle is cheap; all clones account into the same pool.
#[derive(Debug, Clone)]
pub struct BlockPool {
    shared: Arc<PoolShared>,
}

impl Default for BlockPool {
    fn default() -> Self {
        Self::new(PoolConfig::default(), Arc::new(EngineMetrics::new()))
    }
}

impl BlockPool {
    /// Create a pool reporting into `metrics`
    pub fn new(config: PoolConfig, metrics: Arc<EngineMetrics>) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                config,
                state: Mutex::new(PoolState::default()),
                next_id: AtomicU64::new(1),
                metrics,
            }),
        }
    }

    /// Request a block able to hold exactly `rows × registers` cells.
    ///
    /// Every cell of the returned block is empty.
    pub fn request_block(&self, rows: usize, registers: usize) -> ExecResult<Block> {
        if rows == 0 {
            return Err(ExecutionError::internal("requested a block with zero rows"));
        }
        let oom = ExecutionError::OutOfMemory { rows, registers };
        let cells = rows.checked_mul(registers).ok_or_else(|| oom.clone())?;

        let mut state = self.shared.state.lock();
        if let Some(limit) = self.shared.config.max_cells {
            let available = limit.saturating_sub(state.stats.outstanding_cells);
            if cells > available {
                drop(state);
                self.shared.metrics.increment_allocation_failures();
                Logger::warn(
                    Event::PoolExhausted,
                    &[
                        ("available", &available.to_string()),
                        ("requested", &cells.to_string()),
                    ],
                );
                return Err(ExecutionError::ResourceLimit {
                    requested: cells,
                    available,
                });
            }
        }

        let reusable = state.free.iter().position(|buf| buf.capacity() >= cells);
        let buffer = match reusable {
            Some(pos) => {
                let mut buf = state.free.swap_remove(pos);
                buf.resize(cells, None);
                state.stats.recycled += 1;
                self.shared.metrics.increment_blocks_recycled();
                buf
            }
            None => {
                let mut buf: Vec<Option<Value>> = Vec::new();
                if buf.try_reserve_exact(cells).is_err() {
                    drop(state);
                    self.shared.metrics.increment_allocation_failures();
                    return Err(oom);
                }
                buf.resize(cells, None);
                state.stats.fresh_allocations += 1;
                self.shared.metrics.increment_blocks_allocated();
                buf
            }
        };

        state.stats.requests += 1;
        state.stats.outstanding += 1;
        state.stats.outstanding_cells += cells;
        state.stats.cached = state.free.len();
        drop(state);

        let id: BlockId = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(Block::from_parts(
            id,
            rows,
            registers,
            buffer,
            Arc::clone(&self.shared),
        ))
    }

    /// Hand a block back to the pool
    pub fn return_block(&self, block: Block) {
        drop(block);
    }

    /// Return the block held in `slot`, if any, and null the handle.
    ///
    /// Calling this twice on the same slot is a no-op the second time.
    pub fn release(&self, slot: &mut Option<Block>) {
        if let Some(block) = slot.take() {
            self.return_block(block);
        }
    }

    /// Build a block from row-major values
    pub fn block_from_rows(&self, rows: &[Vec<Option<Value>>], registers: usize) -> ExecResult<Block> {
        let mut block = self.request_block(rows.len(), registers)?;
        for (r, row) in rows.iter().enumerate() {
            if row.len() > registers {
                return Err(ExecutionError::internal(format!(
                    "row {} has {} values for {} registers",
                    r,
                    row.len(),
                    registers
                )));
            }
            for (reg, value) in row.iter().enumerate() {
                if let Some(v) = value {
                    block.set(r, reg, v.clone());
                }
            }
        }
        Ok(block)
    }

    /// Current pool accounting
    pub fn stats(&self) -> PoolStats {
        self.shared.state.lock().stats
    }

    /// Blocks handed out and not yet returned
    pub fn outstanding(&self) -> usize {
        self.shared.state.lock().stats.outstanding
    }

    /// Metrics registry the pool reports into
    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.shared.metrics
    }

    /// Pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }
}
