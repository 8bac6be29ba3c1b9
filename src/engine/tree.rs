//! Execution tree assembly
//!
//! Stages are added bottom-up; every dependency must already be in the
//! tree. The most recently added stage is the root.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use super::block_impl::ExecutionBlockImpl;
use super::context::QueryContext;
use super::execution_block::ExecutionBlockRef;
use crate::errors::{ExecResult, ExecutionError};
use crate::executor::Executor;
use crate::stats::NodeId;

/// A tree of execution blocks sharing one query context
pub struct ExecutionTree {
    context: QueryContext,
    nodes: BTreeMap<NodeId, ExecutionBlockRef>,
    root: Option<NodeId>,
}

impl ExecutionTree {
    pub fn new(context: QueryContext) -> Self {
        Self {
            context,
            nodes: BTreeMap::new(),
            root: None,
        }
    }

    /// Add a stage running `E` on top of the stages listed in `dependencies`
    pub fn add<E: Executor + 'static>(
        &mut self,
        id: NodeId,
        infos: E::Infos,
        dependencies: &[NodeId],
    ) -> ExecResult<ExecutionBlockRef> {
        if self.nodes.contains_key(&id) {
            return Err(ExecutionError::config_invalid(format!(
                "node id {} used twice",
                id
            )));
        }
        let deps = dependencies
            .iter()
            .map(|dep| {
                self.nodes.get(dep).cloned().ok_or_else(|| {
                    ExecutionError::config_invalid(format!(
                        "node {} depends on unknown node {}",
                        id, dep
                    ))
                })
            })
            .collect::<ExecResult<Vec<_>>>()?;

        let block = ExecutionBlockImpl::<E>::new(id, self.context.clone(), infos, deps)?;
        let block: ExecutionBlockRef = Rc::new(RefCell::new(block));
        self.nodes.insert(id, Rc::clone(&block));
        self.root = Some(id);
        Ok(block)
    }

    /// The stage added last
    pub fn root(&self) -> ExecResult<ExecutionBlockRef> {
        self.root
            .and_then(|id| self.nodes.get(&id).cloned())
            .ok_or_else(|| ExecutionError::config_invalid("execution tree is empty"))
    }

    pub fn get(&self, id: NodeId) -> Option<ExecutionBlockRef> {
        self.nodes.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn context(&self) -> &QueryContext {
        &self.context
    }
}
