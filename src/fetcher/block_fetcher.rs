//! Block-level access to a stage's dependencies

use crate::block::{Block, BlockPool};
use crate::engine::{borrow_block, ExecutionBlockRef, ExecutionState};
use crate::errors::{ExecResult, ExecutionError};

/// Pulls whole blocks from the dependencies of one stage.
///
/// Upstream state is tracked per dependency; a `Waiting` answer never
/// changes it.
pub struct BlockFetcher {
    dependencies: Vec<ExecutionBlockRef>,
    pool: BlockPool,
    upstream: Vec<ExecutionState>,
}

impl BlockFetcher {
    pub fn new(dependencies: Vec<ExecutionBlockRef>, pool: BlockPool) -> Self {
        let upstream = vec![ExecutionState::HasMore; dependencies.len()];
        Self {
            dependencies,
            pool,
            upstream,
        }
    }

    pub fn number_dependencies(&self) -> usize {
        self.dependencies.len()
    }

    pub fn pool(&self) -> &BlockPool {
        &self.pool
    }

    /// Pull from the single dependency of this stage
    pub fn fetch_block(&mut self, at_most: usize) -> ExecResult<(ExecutionState, Option<Block>)> {
        if self.dependencies.len() != 1 {
            return Err(ExecutionError::internal(format!(
                "single-dependency fetch on a stage with {} dependencies",
                self.dependencies.len()
            )));
        }
        self.fetch_block_for_dependency(0, at_most)
    }

    /// Pull from dependency `dependency`.
    ///
    /// A dependency that already answered `Done` is not called again.
    pub fn fetch_block_for_dependency(
        &mut self,
        dependency: usize,
        at_most: usize,
    ) -> ExecResult<(ExecutionState, Option<Block>)> {
        let upstream = self.dependencies.get(dependency).ok_or_else(|| {
            ExecutionError::internal(format!("no dependency {}", dependency))
        })?;
        if self.upstream[dependency] == ExecutionState::Done {
            return Ok((ExecutionState::Done, None));
        }

        let (state, block) = borrow_block(upstream)?.get_some(at_most)?;
        if state != ExecutionState::Waiting {
            self.upstream[dependency] = state;
        } else if block.is_some() {
            return Err(ExecutionError::internal(
                "dependency answered WAITING with a block attached",
            ));
        }
        Ok((state, block))
    }

    /// Upstream state of the single dependency, or `Done` once every
    /// dependency is done
    pub fn upstream_state(&self) -> ExecutionState {
        if self.upstream.iter().all(|s| *s == ExecutionState::Done) {
            ExecutionState::Done
        } else {
            ExecutionState::HasMore
        }
    }
}
