//! Query-wide statistics table

use std::collections::BTreeMap;
use std::ops::AddAssign;

use serde::Serialize;

/// Identity of a node in an execution tree
pub type NodeId = u64;

/// Per-node profile counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NodeStats {
    /// getSome/skipSome calls, WAITING answers included
    pub calls: u64,
    /// Rows handed out or skipped
    pub items: u64,
    /// Wall time in seconds between a call's first entry and its terminal
    /// (non-WAITING) answer
    pub runtime: f64,
}

impl AddAssign for NodeStats {
    fn add_assign(&mut self, other: NodeStats) {
        self.calls += other.calls;
        self.items += other.items;
        self.runtime += other.runtime;
    }
}

/// Accumulate-only statistics for one query.
///
/// Executors contribute local deltas through [`ExecutorStats`](super::ExecutorStats);
/// the engine adds per-node profile counters when profiling is enabled.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionStats {
    /// Rows dropped by filters
    pub filtered: u64,
    /// Rows seen by limits with full count enabled
    pub full_count: u64,
    /// Documents read from row sources
    pub scanned: u64,
    /// Profile counters keyed by node id
    pub nodes: BTreeMap<NodeId, NodeStats>,
}

impl ExecutionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge profile counters for `node`
    pub fn add_node(&mut self, node: NodeId, stats: NodeStats) {
        *self.nodes.entry(node).or_default() += stats;
    }

    /// Profile counters recorded for `node`
    pub fn node(&self, node: NodeId) -> Option<&NodeStats> {
        self.nodes.get(&node)
    }
}

impl AddAssign<&ExecutionStats> for ExecutionStats {
    fn add_assign(&mut self, other: &ExecutionStats) {
        self.filtered += other.filtered;
        self.full_count += other.full_count;
        self.scanned += other.scanned;
        for (&node, &stats) in &other.nodes {
            self.add_node(node, stats);
        }
    }
}
