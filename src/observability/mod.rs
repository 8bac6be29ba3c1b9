//! Observability for the execution engine
//!
//! - Structured logging (JSON lines)
//! - Monotonic metrics
//! - Typed engine events
//!
//! Observability is a side channel: nothing here may change control flow
//! or row contents.

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{EngineMetrics, MetricsSnapshot};
