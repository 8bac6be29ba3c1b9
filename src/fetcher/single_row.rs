//! Row-at-a-time fetcher over a single dependency

use super::{BlockFetcher, Fetcher, RowFetcher};
use crate::block::SharedBlock;
use crate::engine::ExecutionState;
use crate::errors::ExecResult;
use crate::row::InputRow;

/// Fetcher for executors that need one row at a time.
///
/// A row handed out keeps its block alive; the fetcher drops its own handle
/// as soon as the last row of a block was handed out, so a passthrough
/// block can be reclaimed exclusively by the output row.
pub struct SingleRowFetcher {
    block_fetcher: BlockFetcher,
    current_block: Option<SharedBlock>,
    row_index: usize,
    upstream_state: ExecutionState,
}

impl SingleRowFetcher {
    fn index_is_valid(&self) -> bool {
        match &self.current_block {
            Some(block) => self.row_index < block.size(),
            None => false,
        }
    }

    fn remaining_rows(&self) -> usize {
        match &self.current_block {
            Some(block) => block.size().saturating_sub(self.row_index),
            None => 0,
        }
    }

    /// Pull the next non-empty upstream block into `current_block`
    fn fetch_block(&mut self, at_most: usize) -> ExecResult<ExecutionState> {
        self.current_block = None;
        self.row_index = 0;
        loop {
            if self.upstream_state == ExecutionState::Done {
                return Ok(ExecutionState::Done);
            }
            let (state, block) = self.block_fetcher.fetch_block(at_most)?;
            if state == ExecutionState::Waiting {
                return Ok(state);
            }
            self.upstream_state = state;
            if let Some(block) = block {
                if block.size() > 0 {
                    self.current_block = Some(SharedBlock::new(block));
                    return Ok(state);
                }
            }
        }
    }
}

impl Fetcher for SingleRowFetcher {
    fn new(block_fetcher: BlockFetcher) -> Self {
        Self {
            block_fetcher,
            current_block: None,
            row_index: 0,
            upstream_state: ExecutionState::HasMore,
        }
    }

    fn fetch_block_for_passthrough(
        &mut self,
        at_most: usize,
    ) -> ExecResult<(ExecutionState, Option<SharedBlock>)> {
        if !self.index_is_valid() {
            let state = self.fetch_block(at_most)?;
            if state == ExecutionState::Waiting {
                return Ok((state, None));
            }
        }
        match &self.current_block {
            Some(block) => Ok((self.upstream_state, Some(block.clone()))),
            None => Ok((ExecutionState::Done, None)),
        }
    }

    fn pre_fetch_number_of_rows(&mut self, at_most: usize) -> ExecResult<(ExecutionState, usize)> {
        if !self.index_is_valid() {
            let state = self.fetch_block(at_most)?;
            if state == ExecutionState::Waiting {
                return Ok((state, 0));
            }
        }
        Ok((self.upstream_state, self.remaining_rows()))
    }

    fn upstream_state(&self) -> ExecutionState {
        self.upstream_state
    }

    fn has_buffered_rows(&self) -> bool {
        self.index_is_valid()
    }
}

impl RowFetcher for SingleRowFetcher {
    fn fetch_row(&mut self, at_most: usize) -> ExecResult<(ExecutionState, Option<InputRow>)> {
        if !self.index_is_valid() {
            let state = self.fetch_block(at_most)?;
            if state == ExecutionState::Waiting {
                return Ok((state, None));
            }
        }

        let block = match &self.current_block {
            Some(block) => block.clone(),
            None => return Ok((ExecutionState::Done, None)),
        };

        let row = InputRow::new(block.clone(), self.row_index);
        self.row_index += 1;
        let last_in_block = self.row_index >= block.size();
        if last_in_block {
            self.current_block = None;
            self.row_index = 0;
        }

        let state = if last_in_block && self.upstream_state == ExecutionState::Done {
            ExecutionState::Done
        } else {
            ExecutionState::HasMore
        };
        Ok((state, Some(row)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{values_block, ScriptedBlock};
    use crate::block::BlockPool;
    use serde_json::json;

    fn fetcher(pool: &BlockPool, script: ScriptedBlock) -> SingleRowFetcher {
        SingleRowFetcher::new(BlockFetcher::new(vec![script.into_ref()], pool.clone()))
    }

    #[test]
    fn test_rows_across_blocks() {
        let pool = BlockPool::default();
        let script = ScriptedBlock::new(vec![
            (ExecutionState::HasMore, Some(values_block(&pool, &[1, 2]))),
            (ExecutionState::Done, Some(values_block(&pool, &[3]))),
        ]);
        let mut f = fetcher(&pool, script);

        let mut seen = Vec::new();
        loop {
            let (state, row) = f.fetch_row(10).unwrap();
            if let Some(row) = row {
                seen.push(row.value(0).unwrap());
            }
            if state == ExecutionState::Done {
                break;
            }
        }
        assert_eq!(seen, vec![json!(1), json!(2), json!(3)]);
        assert!(!f.has_buffered_rows());
        assert_eq!(f.fetch_row(10).unwrap().0, ExecutionState::Done);
    }

    #[test]
    fn test_waiting_carries_no_row() {
        let pool = BlockPool::default();
        let script = ScriptedBlock::new(vec![
            (ExecutionState::Waiting, None),
            (ExecutionState::Done, Some(values_block(&pool, &[9]))),
        ]);
        let mut f = fetcher(&pool, script);

        let (state, row) = f.fetch_row(10).unwrap();
        assert_eq!(state, ExecutionState::Waiting);
        assert!(row.is_none());

        let (state, row) = f.fetch_row(10).unwrap();
        assert_eq!(state, ExecutionState::Done);
        assert_eq!(row.unwrap().value(0), Some(json!(9)));
    }

    #[test]
    fn test_done_without_rows() {
        let pool = BlockPool::default();
        let mut f = fetcher(&pool, ScriptedBlock::new(vec![(ExecutionState::Done, None)]));
        let (state, row) = f.fetch_row(10).unwrap();
        assert_eq!(state, ExecutionState::Done);
        assert!(row.is_none());
        assert_eq!(f.upstream_state(), ExecutionState::Done);
    }

    #[test]
    fn test_pre_fetch_does_not_consume() {
        let pool = BlockPool::default();
        let script = ScriptedBlock::new(vec![(
            ExecutionState::Done,
            Some(values_block(&pool, &[1, 2, 3])),
        )]);
        let mut f = fetcher(&pool, script);

        assert_eq!(
            f.pre_fetch_number_of_rows(10).unwrap(),
            (ExecutionState::Done, 3)
        );
        f.fetch_row(10).unwrap();
        assert_eq!(
            f.pre_fetch_number_of_rows(10).unwrap(),
            (ExecutionState::Done, 2)
        );
    }

    #[test]
    fn test_passthrough_releases_handle_after_last_row() {
        let pool = BlockPool::default();
        let script = ScriptedBlock::new(vec![(
            ExecutionState::Done,
            Some(values_block(&pool, &[1, 2])),
        )]);
        let mut f = fetcher(&pool, script);

        let (state, block) = f.fetch_block_for_passthrough(10).unwrap();
        assert_eq!(state, ExecutionState::Done);
        let block = block.unwrap();
        f.fetch_row(10).unwrap();
        let (_, last) = f.fetch_row(10).unwrap();
        drop(last);
        assert!(block.into_block().is_ok());
    }
}
