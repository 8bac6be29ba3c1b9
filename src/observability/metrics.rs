//! Engine metrics registry
//!
//! - Counters only, monotonic
//! - Relaxed atomics; metrics never steer execution

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Process-wide counters for the execution engine
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Blocks allocated fresh by a pool
    blocks_allocated: AtomicU64,
    /// Blocks served from a pool's free list
    blocks_recycled: AtomicU64,
    /// Blocks handed back to a pool
    blocks_returned: AtomicU64,
    /// Pool requests refused (memory limit or allocation failure)
    allocation_failures: AtomicU64,
    /// Rows handed out by getSome
    rows_produced: AtomicU64,
    /// Rows counted by skipSome
    rows_skipped: AtomicU64,
    /// Pull calls that answered WAITING
    waiting_returns: AtomicU64,
    /// Pull calls rejected because the query was killed
    queries_killed: AtomicU64,
}

impl EngineMetrics {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_blocks_allocated(&self) {
        self.blocks_allocated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_blocks_recycled(&self) {
        self.blocks_recycled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_blocks_returned(&self) {
        self.blocks_returned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_allocation_failures(&self) {
        self.allocation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rows_produced(&self, rows: u64) {
        self.rows_produced.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn add_rows_skipped(&self, rows: u64) {
        self.rows_skipped.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn increment_waiting(&self) {
        self.waiting_returns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_killed(&self) {
        self.queries_killed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all counters as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            blocks_allocated: self.blocks_allocated.load(Ordering::Relaxed),
            blocks_recycled: self.blocks_recycled.load(Ordering::Relaxed),
            blocks_returned: self.blocks_returned.load(Ordering::Relaxed),
            allocation_failures: self.allocation_failures.load(Ordering::Relaxed),
            rows_produced: self.rows_produced.load(Ordering::Relaxed),
            rows_skipped: self.rows_skipped.load(Ordering::Relaxed),
            waiting_returns: self.waiting_returns.load(Ordering::Relaxed),
            queries_killed: self.queries_killed.load(Ordering::Relaxed),
        }
    }

    /// Current counters as a JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A point-in-time copy of all counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub blocks_allocated: u64,
    pub blocks_recycled: u64,
    pub blocks_returned: u64,
    pub allocation_failures: u64,
    pub rows_produced: u64,
    pub rows_skipped: u64,
    pub waiting_returns: u64,
    pub queries_killed: u64,
}
