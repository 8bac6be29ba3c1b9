//! Executor-local statistics deltas

use super::execution::ExecutionStats;

/// A delta produced by one `produce_row` call.
///
/// Executors never aggregate; the engine merges each delta into the query
/// table right after the call returns.
pub trait ExecutorStats: Default {
    fn merge_into(self, stats: &mut ExecutionStats);
}

/// Executors that keep no statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoStats;

impl ExecutorStats for NoStats {
    fn merge_into(self, _stats: &mut ExecutionStats) {}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    filtered: u64,
}

impl FilterStats {
    pub fn incr_filtered(&mut self) {
        self.filtered += 1;
    }

    pub fn filtered(&self) -> u64 {
        self.filtered
    }
}

impl ExecutorStats for FilterStats {
    fn merge_into(self, stats: &mut ExecutionStats) {
        stats.filtered += self.filtered;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimitStats {
    full_count: u64,
}

impl LimitStats {
    pub fn incr_full_count(&mut self) {
        self.full_count += 1;
    }

    pub fn full_count(&self) -> u64 {
        self.full_count
    }
}

impl ExecutorStats for LimitStats {
    fn merge_into(self, stats: &mut ExecutionStats) {
        stats.full_count += self.full_count;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    scanned: u64,
}

impl ScanStats {
    pub fn incr_scanned(&mut self) {
        self.scanned += 1;
    }

    pub fn scanned(&self) -> u64 {
        self.scanned
    }
}

impl ExecutorStats for ScanStats {
    fn merge_into(self, stats: &mut ExecutionStats) {
        stats.scanned += self.scanned;
    }
}
