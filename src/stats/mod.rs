//! Execution statistics
//!
//! Two layers:
//! - executor deltas ([`ExecutorStats`]) returned from every `produce_row`
//! - the query-wide [`ExecutionStats`] table they are merged into, which
//!   also holds per-node profile counters
//!
//! Statistics are a side channel and never steer execution.

mod execution;
mod executor;

pub use execution::{ExecutionStats, NodeId, NodeStats};
pub use executor::{ExecutorStats, FilterStats, LimitStats, NoStats, ScanStats};
