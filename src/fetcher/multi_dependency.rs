//! Row-at-a-time fetcher with one stream per dependency

use super::{BlockFetcher, Fetcher};
use crate::block::SharedBlock;
use crate::engine::ExecutionState;
use crate::errors::{ExecResult, ExecutionError};
use crate::row::InputRow;

#[derive(Default)]
struct DependencyInfo {
    current_block: Option<SharedBlock>,
    row_index: usize,
    upstream_state: Option<ExecutionState>,
}

impl DependencyInfo {
    fn index_is_valid(&self) -> bool {
        match &self.current_block {
            Some(block) => self.row_index < block.size(),
            None => false,
        }
    }

    fn is_done(&self) -> bool {
        self.upstream_state == Some(ExecutionState::Done)
    }
}

/// Fetcher for executors that merge several inputs (union).
///
/// Each dependency is read independently; `fetch_row_for_dependency`
/// follows the same contract as a single-row fetch on that dependency.
pub struct MultiDependencySingleRowFetcher {
    block_fetcher: BlockFetcher,
    dependencies: Vec<DependencyInfo>,
}

impl MultiDependencySingleRowFetcher {
    pub fn number_dependencies(&self) -> usize {
        self.dependencies.len()
    }

    /// Next row from dependency `dependency`
    pub fn fetch_row_for_dependency(
        &mut self,
        dependency: usize,
        at_most: usize,
    ) -> ExecResult<(ExecutionState, Option<InputRow>)> {
        let info = self.dependencies.get_mut(dependency).ok_or_else(|| {
            ExecutionError::internal(format!("no dependency {}", dependency))
        })?;

        while !info.index_is_valid() {
            info.current_block = None;
            info.row_index = 0;
            if info.is_done() {
                return Ok((ExecutionState::Done, None));
            }
            let (state, block) = self
                .block_fetcher
                .fetch_block_for_dependency(dependency, at_most)?;
            if state == ExecutionState::Waiting {
                return Ok((state, None));
            }
            info.upstream_state = Some(state);
            info.current_block = block.map(SharedBlock::new);
        }

        let block = match &info.current_block {
            Some(block) => block.clone(),
            None => return Ok((ExecutionState::Done, None)),
        };
        let row = InputRow::new(block.clone(), info.row_index);
        info.row_index += 1;
        let last_in_block = info.row_index >= block.size();
        if last_in_block {
            info.current_block = None;
            info.row_index = 0;
        }

        let state = if last_in_block && info.is_done() {
            ExecutionState::Done
        } else {
            ExecutionState::HasMore
        };
        Ok((state, Some(row)))
    }
}

impl Fetcher for MultiDependencySingleRowFetcher {
    fn new(block_fetcher: BlockFetcher) -> Self {
        let dependencies = (0..block_fetcher.number_dependencies())
            .map(|_| DependencyInfo::default())
            .collect();
        Self {
            block_fetcher,
            dependencies,
        }
    }

    fn upstream_state(&self) -> ExecutionState {
        if self.dependencies.iter().all(|d| d.is_done()) {
            ExecutionState::Done
        } else {
            ExecutionState::HasMore
        }
    }

    fn has_buffered_rows(&self) -> bool {
        self.dependencies.iter().any(|d| d.index_is_valid())
    }
}
