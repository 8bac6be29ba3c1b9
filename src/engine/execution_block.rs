//! The pull interface every stage of an execution tree exposes

use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use super::state::ExecutionState;
use crate::block::Block;
use crate::errors::{ErrorCode, ExecResult, ExecutionError};
use crate::row::InputRow;
use crate::stats::NodeId;

/// Shared handle to a stage; a stage is referenced by its consumer and by
/// the tree that owns it.
pub type ExecutionBlockRef = Rc<RefCell<dyn ExecutionBlock>>;

/// One stage of an execution tree.
///
/// Every call answers with an [`ExecutionState`]. `Waiting` leaves all
/// internal cursors untouched; the caller must re-issue the identical call.
/// An `Err` is terminal for the query.
pub trait ExecutionBlock {
    /// Node id used as the statistics key
    fn id(&self) -> NodeId;

    /// Operator name used in traces
    fn type_name(&self) -> &'static str;

    /// Produce up to `at_most` rows.
    ///
    /// `(Done, None)` means nothing more to deliver; a returned block never
    /// has zero rows.
    fn get_some(&mut self, at_most: usize) -> ExecResult<(ExecutionState, Option<Block>)>;

    /// Count the rows `get_some(at_most)` would have produced without
    /// handing them out.
    fn skip_some(&mut self, at_most: usize) -> ExecResult<(ExecutionState, usize)>;

    /// Reset this stage and its whole subtree for a new pass over `input`.
    ///
    /// Answers `Done` once every dependency acknowledged the reset.
    fn initialize_cursor(&mut self, input: Option<&InputRow>) -> ExecResult<ExecutionState>;

    /// Tear down the subtree. Safe to call repeatedly; once finished every
    /// call returns the same outcome.
    fn shutdown(&mut self, error: Option<ErrorCode>) -> ExecResult<ExecutionState>;

    /// `Done` iff nothing more can come out of this stage
    fn has_more_state(&mut self) -> ExecutionState;

    fn dependencies(&self) -> &[ExecutionBlockRef];
}

/// Borrow a stage for one call.
///
/// Re-entering a stage that is already running (a cycle in the tree) is an
/// internal error rather than a panic.
pub fn borrow_block(
    block: &ExecutionBlockRef,
) -> ExecResult<RefMut<'_, dyn ExecutionBlock + 'static>> {
    block
        .try_borrow_mut()
        .map_err(|_| ExecutionError::internal("execution block re-entered while running"))
}
