//! Test doubles shared by the unit tests

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde_json::{json, Value};

use crate::block::{Block, BlockPool};
use crate::engine::{borrow_block, ExecutionBlock, ExecutionBlockRef, ExecutionState};
use crate::errors::{ErrorCode, ExecResult, ExecutionError};
use crate::row::InputRow;
use crate::stats::NodeId;

/// Single-register block holding `values`
pub fn values_block(pool: &BlockPool, values: &[i64]) -> Block {
    let rows: Vec<Vec<Option<Value>>> = values.iter().map(|v| vec![Some(json!(v))]).collect();
    pool.block_from_rows(&rows, 1).unwrap()
}

/// Upstream stage answering from a fixed script.
///
/// Once the script runs out every pull answers `(Done, None)`.
#[derive(Default)]
pub struct ScriptedBlock {
    script: VecDeque<(ExecutionState, Option<Block>)>,
    shutdown_script: VecDeque<ExecResult<ExecutionState>>,
    initialize_script: VecDeque<ExecResult<ExecutionState>>,
    pub get_some_calls: usize,
    pub shutdown_calls: usize,
    pub initialize_calls: usize,
    pub last_at_most: Option<usize>,
}

impl ScriptedBlock {
    pub fn new(script: Vec<(ExecutionState, Option<Block>)>) -> Self {
        Self {
            script: script.into(),
            ..Self::default()
        }
    }

    /// Answers for successive `shutdown` calls; `Done` afterwards
    pub fn with_shutdown(mut self, answers: Vec<ExecResult<ExecutionState>>) -> Self {
        self.shutdown_script = answers.into();
        self
    }

    /// Answers for successive `initialize_cursor` calls; `Done` afterwards
    pub fn with_initialize(mut self, answers: Vec<ExecResult<ExecutionState>>) -> Self {
        self.initialize_script = answers.into();
        self
    }

    pub fn into_ref(self) -> ExecutionBlockRef {
        Rc::new(RefCell::new(self))
    }

    /// Shared handle that keeps the concrete type visible to the test
    pub fn into_shared(self) -> (Rc<RefCell<ScriptedBlock>>, ExecutionBlockRef) {
        let concrete = Rc::new(RefCell::new(self));
        let erased: ExecutionBlockRef = concrete.clone();
        (concrete, erased)
    }
}

impl ExecutionBlock for ScriptedBlock {
    fn id(&self) -> NodeId {
        0
    }

    fn type_name(&self) -> &'static str {
        "ScriptedNode"
    }

    fn get_some(&mut self, at_most: usize) -> ExecResult<(ExecutionState, Option<Block>)> {
        self.get_some_calls += 1;
        self.last_at_most = Some(at_most);
        Ok(self
            .script
            .pop_front()
            .unwrap_or((ExecutionState::Done, None)))
    }

    fn skip_some(&mut self, at_most: usize) -> ExecResult<(ExecutionState, usize)> {
        let (state, block) = self.get_some(at_most)?;
        Ok((state, block.map_or(0, |b| b.size())))
    }

    fn initialize_cursor(&mut self, _input: Option<&InputRow>) -> ExecResult<ExecutionState> {
        self.initialize_calls += 1;
        self.initialize_script
            .pop_front()
            .unwrap_or(Ok(ExecutionState::Done))
    }

    fn shutdown(&mut self, _error: Option<ErrorCode>) -> ExecResult<ExecutionState> {
        self.shutdown_calls += 1;
        self.script.clear();
        self.shutdown_script
            .pop_front()
            .unwrap_or(Ok(ExecutionState::Done))
    }

    fn has_more_state(&mut self) -> ExecutionState {
        if self.script.is_empty() {
            ExecutionState::Done
        } else {
            ExecutionState::HasMore
        }
    }

    fn dependencies(&self) -> &[ExecutionBlockRef] {
        &[]
    }
}

/// Pull `block` to exhaustion and collect register `reg` of every row.
///
/// Fails the test if the stage keeps waiting.
pub fn drain(block: &ExecutionBlockRef, at_most: usize, reg: usize) -> ExecResult<Vec<Value>> {
    let mut values = Vec::new();
    let mut waits = 0;
    loop {
        let (state, out) = borrow_block(block)?.get_some(at_most)?;
        if let Some(out) = out {
            for row in 0..out.size() {
                values.push(out.get(row, reg).cloned().unwrap_or(Value::Null));
            }
        }
        match state {
            ExecutionState::Done => return Ok(values),
            ExecutionState::Waiting => {
                waits += 1;
                if waits > 100 {
                    return Err(ExecutionError::internal("stage kept waiting"));
                }
            }
            ExecutionState::HasMore => {}
        }
    }
}
