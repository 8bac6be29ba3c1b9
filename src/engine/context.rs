//! Per-query shared state handed to every execution block

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::block::BlockPool;
use crate::config::{EngineConfig, ProfileLevel};
use crate::observability::EngineMetrics;
use crate::stats::{ExecutionStats, ExecutorStats, NodeId, NodeStats};

/// Everything an execution block needs from its query.
///
/// Cloning is cheap; all clones share the pool, statistics sink, kill flag
/// and metrics.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pool: BlockPool,
    stats: Arc<Mutex<ExecutionStats>>,
    killed: Arc<AtomicBool>,
    profile: ProfileLevel,
    batch_size: usize,
}

impl Default for QueryContext {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default(), Arc::new(EngineMetrics::new()))
    }
}

impl QueryContext {
    pub fn new(pool: BlockPool, profile: ProfileLevel, batch_size: usize) -> Self {
        Self {
            pool,
            stats: Arc::new(Mutex::new(ExecutionStats::new())),
            killed: Arc::new(AtomicBool::new(false)),
            profile,
            batch_size,
        }
    }

    /// Build a context with a fresh pool sized by `config`
    pub fn from_config(config: &EngineConfig, metrics: Arc<EngineMetrics>) -> Self {
        Self::new(
            BlockPool::new(config.pool.clone(), metrics),
            config.profile,
            config.batch_size,
        )
    }

    /// Same context with another profiling level
    pub fn with_profile(mut self, profile: ProfileLevel) -> Self {
        self.profile = profile;
        self
    }

    /// Same context reporting into `stats`
    pub fn with_stats_sink(mut self, stats: Arc<Mutex<ExecutionStats>>) -> Self {
        self.stats = stats;
        self
    }

    pub fn pool(&self) -> &BlockPool {
        &self.pool
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        self.pool.metrics()
    }

    pub fn profile(&self) -> ProfileLevel {
        self.profile
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Request cancellation; observed at the top of the next pull call
    pub fn kill(&self) {
        self.killed.store(true, Ordering::Release);
    }

    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::Acquire)
    }

    /// Handle that can kill the query from another thread
    pub fn kill_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.killed)
    }

    /// Merge an executor delta into the query table
    pub fn merge_executor_stats<S: ExecutorStats>(&self, delta: S) {
        delta.merge_into(&mut self.stats.lock());
    }

    pub fn add_node_stats(&self, node: NodeId, stats: NodeStats) {
        self.stats.lock().add_node(node, stats);
    }

    /// Copy of the statistics gathered so far
    pub fn stats(&self) -> ExecutionStats {
        self.stats.lock().clone()
    }

    pub fn stats_sink(&self) -> &Arc<Mutex<ExecutionStats>> {
        &self.stats
    }
}
