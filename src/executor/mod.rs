//! Executors: the per-operator half of an execution block
//!
//! An executor produces at most one output row per call and declares its
//! capabilities statically through [`Executor::PROPERTIES`]. The generic
//! engine in [`crate::engine`] drives it.
//!
//! | Executor | Fetcher | Passthrough | Size-restricted |
//! |----------|---------|-------------|-----------------|
//! | Id       | any row fetcher | yes | no |
//! | Calculation | single row | yes | no |
//! | Filter   | single row | no | no |
//! | Limit    | single row | no | no |
//! | Sort     | single row | no | yes |
//! | EnumerateList | single row | no | no |
//! | Scan     | single row | no | no |
//! | Union    | multi dependency | no | no |

mod calculation;
mod enumerate;
mod filter;
mod id;
mod infos;
mod limit;
mod scan;
mod sort;
mod traits;
mod union;

pub use calculation::{CalculationExecutor, CalculationInfos, Expression};
pub use enumerate::{EnumerateListExecutor, EnumerateListInfos};
pub use filter::{FilterExecutor, FilterInfos};
pub use id::IdExecutor;
pub use infos::ExecutorInfos;
pub use limit::{LimitExecutor, LimitInfos};
pub use scan::{RowSource, RowSourceFactory, ScanExecutor, ScanInfos, SourcePoll, ValuesSource};
pub use sort::{SortDirection, SortExecutor, SortInfos, SortRegister};
pub use traits::{Executor, ExecutorProperties};
pub use union::UnionExecutor;
