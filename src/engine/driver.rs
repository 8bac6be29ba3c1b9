//! Query driver
//!
//! Pulls a root stage to `Done`, re-issuing `Waiting` calls, then shuts the
//! tree down. A failing pull still shuts the tree down, with the error code
//! propagated, and the original error is returned.

use std::time::Instant;

use super::execution_block::{borrow_block, ExecutionBlockRef};
use super::state::ExecutionState;
use crate::block::Block;
use crate::errors::{ErrorCode, ExecResult, ExecutionError};
use crate::observability::{Event, Logger};

/// Default bound on consecutive `Waiting` answers
pub const DEFAULT_MAX_WAITS: usize = 10_000;

/// Called before a `Waiting` call is re-issued; receives the number of
/// consecutive waits so far
pub type WaitHook = Box<dyn FnMut(usize) -> ExecResult<()>>;

/// Drains a tree through its root stage
pub struct QueryDriver {
    root: ExecutionBlockRef,
    batch_size: usize,
    wait_hook: Option<WaitHook>,
    max_waits: usize,
}

impl QueryDriver {
    pub fn new(root: ExecutionBlockRef, batch_size: usize) -> Self {
        Self {
            root,
            batch_size,
            wait_hook: None,
            max_waits: DEFAULT_MAX_WAITS,
        }
    }

    /// Run `hook` before every retry of a `Waiting` call, giving up after
    /// `max_waits` consecutive waits
    pub fn with_wait_hook(mut self, hook: WaitHook, max_waits: usize) -> Self {
        self.wait_hook = Some(hook);
        self.max_waits = max_waits;
        self
    }

    fn wait(&mut self, waits: usize) -> ExecResult<()> {
        if waits > self.max_waits {
            return Err(ExecutionError::execution_failed(format!(
                "query still waiting after {} retries",
                self.max_waits
            )));
        }
        match self.wait_hook.as_mut() {
            Some(hook) => hook(waits),
            None => Ok(()),
        }
    }

    /// Every block the root produces, in order
    pub fn drain(&mut self) -> ExecResult<Vec<Block>> {
        self.run(|driver, blocks: &mut Vec<Block>| {
            let (state, block) = borrow_block(&driver.root)?.get_some(driver.batch_size)?;
            if let Some(block) = block {
                blocks.push(block);
            }
            Ok(state)
        })
    }

    /// Number of rows the root would produce, counted with `skip_some`
    pub fn count(&mut self) -> ExecResult<usize> {
        self.run(|driver, total: &mut usize| {
            let (state, skipped) = borrow_block(&driver.root)?.skip_some(driver.batch_size)?;
            *total += skipped;
            Ok(state)
        })
    }

    fn run<T: Default>(
        &mut self,
        mut step: impl FnMut(&mut Self, &mut T) -> ExecResult<ExecutionState>,
    ) -> ExecResult<T> {
        let begin = Instant::now();
        let root_id = self.root.borrow().id().to_string();
        Logger::info(
            Event::QueryBegin,
            &[("root", &root_id), ("batch_size", &self.batch_size.to_string())],
        );

        let mut acc = T::default();
        let mut waits = 0;
        let outcome = loop {
            match step(self, &mut acc) {
                Ok(ExecutionState::Done) => break Ok(()),
                Ok(ExecutionState::HasMore) => waits = 0,
                Ok(ExecutionState::Waiting) => {
                    waits += 1;
                    if let Err(e) = self.wait(waits) {
                        break Err(e);
                    }
                }
                Err(e) => break Err(e),
            }
        };

        match outcome {
            Ok(()) => {
                self.shutdown(None)?;
                Logger::info(
                    Event::QueryComplete,
                    &[
                        ("root", &root_id),
                        ("elapsed_us", &begin.elapsed().as_micros().to_string()),
                    ],
                );
                Ok(acc)
            }
            Err(e) => {
                // The pull error wins over anything shutdown reports
                let _ = self.shutdown(Some(e.code()));
                Err(e)
            }
        }
    }

    /// Shut the tree down, re-issuing the call while it answers `Waiting`
    pub fn shutdown(&mut self, error: Option<ErrorCode>) -> ExecResult<()> {
        let mut waits = 0;
        loop {
            let state = borrow_block(&self.root)?.shutdown(error)?;
            if state != ExecutionState::Waiting {
                return Ok(());
            }
            waits += 1;
            self.wait(waits)?;
        }
    }
}
