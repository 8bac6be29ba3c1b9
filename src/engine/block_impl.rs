//! Generic execution block
//!
//! Drives one [`Executor`] through the tri-state pull protocol:
//!
//! 1. Open an output block: the upstream block itself for passthrough
//!    executors, a block sized by look-ahead for size-restricted ones, a
//!    fresh `at_most` block otherwise
//! 2. Call `produce_row` until the block is full, the executor answers
//!    `Waiting` (output cursor kept for the retry) or `Done`
//! 3. Hand the block out; an empty result is `None`, never a zero-row block
//!
//! Cursor reset and shutdown cascade through the dependencies with a saved
//! position so a `Waiting` dependency is resumed, not restarted.

use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use super::context::QueryContext;
use super::execution_block::{borrow_block, ExecutionBlock, ExecutionBlockRef};
use super::state::ExecutionState;
use crate::block::{Block, SharedBlock};
use crate::config::ProfileLevel;
use crate::errors::{ErrorCode, ExecResult, ExecutionError};
use crate::executor::{Executor, ExecutorInfos};
use crate::fetcher::{BlockFetcher, Fetcher};
use crate::observability::{Event, Logger};
use crate::row::{CopyRowBehaviour, InputRow, OutputRow};
use crate::stats::{NodeId, NodeStats};

/// Saved position of a dependency cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cascade {
    Idle,
    InitializeCursor(usize),
    Shutdown(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ShutdownState {
    Running,
    /// Dependencies are being shut down
    Cascading,
    /// Cascade finished; executor teardown pending
    Finalizing,
    /// Outcome returned to every later call
    Finished(Result<(), ExecutionError>),
}

/// One stage of an execution tree, generic over its executor
pub struct ExecutionBlockImpl<E: Executor> {
    id: NodeId,
    context: QueryContext,
    infos: Arc<E::Infos>,
    dependencies: Vec<ExecutionBlockRef>,
    fetcher: E::Fetcher,
    executor: E,
    output: Option<OutputRow>,
    /// Scratch block reused between skip calls
    buffer: Option<Block>,
    done: bool,
    cascade: Cascade,
    shutdown_state: ShutdownState,
    shutdown_error: Option<ExecutionError>,
    call_begin: Option<Instant>,
}

fn layout<I: AsRef<ExecutorInfos>>(infos: &I) -> &ExecutorInfos {
    AsRef::<ExecutorInfos>::as_ref(infos)
}

impl<E: Executor> ExecutionBlockImpl<E> {
    /// Build a stage pulling from `dependencies`
    pub fn new(
        id: NodeId,
        context: QueryContext,
        infos: E::Infos,
        dependencies: Vec<ExecutionBlockRef>,
    ) -> ExecResult<Self> {
        let infos = Arc::new(infos);
        let mut fetcher = E::Fetcher::new(BlockFetcher::new(
            dependencies.clone(),
            context.pool().clone(),
        ));
        fetcher.bind_input(None, layout(&*infos))?;
        let executor = E::new(Arc::clone(&infos));

        Ok(Self {
            id,
            context,
            infos,
            dependencies,
            fetcher,
            executor,
            output: None,
            buffer: None,
            done: false,
            cascade: Cascade::Idle,
            shutdown_state: ShutdownState::Running,
            shutdown_error: None,
            call_begin: None,
        })
    }

    pub fn infos(&self) -> &ExecutorInfos {
        layout(&*self.infos)
    }

    pub fn context(&self) -> &QueryContext {
        &self.context
    }

    fn fresh_fetcher(&self) -> E::Fetcher {
        E::Fetcher::new(BlockFetcher::new(
            self.dependencies.clone(),
            self.context.pool().clone(),
        ))
    }

    fn node_fields(&self) -> [(&'static str, String); 2] {
        [("node", self.id.to_string()), ("type", E::NAME.to_string())]
    }

    fn log(&self, event: Event, extra: &[(&str, String)]) {
        let node = self.node_fields();
        let fields: Vec<(&str, &str)> = node
            .iter()
            .chain(extra.iter())
            .map(|(k, v)| (*k, v.as_str()))
            .collect();
        if event.is_failure() {
            Logger::error(event, &fields);
        } else {
            Logger::info(event, &fields);
        }
    }

    /// Kill flag and lifecycle checks done at the top of every pull
    fn check_pull_allowed(&self) -> ExecResult<()> {
        if self.context.is_killed() {
            self.context.metrics().increment_queries_killed();
            self.log(Event::QueryKilled, &[]);
            return Err(ExecutionError::QueryKilled);
        }
        if self.shutdown_state != ShutdownState::Running {
            return Err(ExecutionError::internal(format!(
                "node {} pulled after shutdown",
                self.id
            )));
        }
        Ok(())
    }

    /// Rows the next non-passthrough output block should have.
    ///
    /// Size-restricted executors get an exact block once upstream is done;
    /// before that the block is `at_most` rows.
    fn planned_rows(&mut self, at_most: usize) -> ExecResult<(ExecutionState, usize)> {
        if !E::PROPERTIES.input_size_restricts_output_size {
            return Ok((ExecutionState::HasMore, at_most));
        }
        let (state, expected) = self.fetcher.pre_fetch_number_of_rows(at_most)?;
        if state == ExecutionState::Waiting {
            return Ok((state, 0));
        }
        let expected = expected + self.executor.number_of_rows_in_flight();
        if state == ExecutionState::Done {
            let rows = expected.min(at_most);
            let state = if rows == 0 {
                ExecutionState::Done
            } else {
                ExecutionState::HasMore
            };
            return Ok((state, rows));
        }
        Ok((ExecutionState::HasMore, at_most))
    }

    fn verify_passthrough_block(&self, block: &SharedBlock) -> ExecResult<()> {
        let infos = self.infos();
        if block.num_registers() != infos.number_of_output_registers() {
            return Err(ExecutionError::internal(format!(
                "passthrough block {} has {} registers, node {} writes {}",
                block.id(),
                block.num_registers(),
                self.id,
                infos.number_of_output_registers()
            )));
        }
        if cfg!(debug_assertions) && !block.borrow().registers_empty(infos.output_registers()) {
            return Err(ExecutionError::internal(format!(
                "passthrough block {} already has values in output registers of node {}",
                block.id(),
                self.id
            )));
        }
        Ok(())
    }

    fn request_wrapped_block(
        &mut self,
        at_most: usize,
    ) -> ExecResult<(ExecutionState, Option<SharedBlock>)> {
        if E::PROPERTIES.allows_block_passthrough {
            let (state, block) = self.fetcher.fetch_block_for_passthrough(at_most)?;
            if state == ExecutionState::Waiting {
                return Ok((state, None));
            }
            return match block {
                Some(block) => {
                    self.verify_passthrough_block(&block)?;
                    Ok((ExecutionState::HasMore, Some(block)))
                }
                None => Ok((ExecutionState::Done, None)),
            };
        }

        let (state, rows) = self.planned_rows(at_most)?;
        if rows == 0 {
            return Ok((state, None));
        }
        let block = self
            .context
            .pool()
            .request_block(rows, self.infos().number_of_output_registers())?;
        Ok((ExecutionState::HasMore, Some(SharedBlock::new(block))))
    }

    /// Scratch block for skipping, recycled from the previous skip call
    fn request_scratch_block(&mut self, at_most: usize) -> ExecResult<(ExecutionState, Option<Block>)> {
        let (state, rows) = self.planned_rows(at_most)?;
        if rows == 0 {
            return Ok((state, None));
        }
        let registers = self.infos().number_of_output_registers();
        if let Some(mut block) = self.buffer.take() {
            if block.num_registers() == registers && block.reset(rows) {
                return Ok((ExecutionState::HasMore, Some(block)));
            }
        }
        let block = self.context.pool().request_block(rows, registers)?;
        Ok((ExecutionState::HasMore, Some(block)))
    }

    fn create_output_row(&self, block: SharedBlock) -> OutputRow {
        let infos = self.infos();
        let behaviour = if E::PROPERTIES.allows_block_passthrough {
            CopyRowBehaviour::DoNotCopyInputRows
        } else {
            CopyRowBehaviour::CopyInputRows
        };
        OutputRow::new(
            block,
            infos.shared_output_registers(),
            infos.shared_registers_to_keep(),
            infos.shared_registers_to_clear(),
            behaviour,
        )
    }

    /// Run the executor until the open output block is full, it waits, or
    /// it is done
    fn fill_output(&mut self) -> ExecResult<ExecutionState> {
        let output = self
            .output
            .as_mut()
            .ok_or_else(|| ExecutionError::internal("no open output block"))?;

        let mut state = ExecutionState::HasMore;
        while !output.is_full() {
            let (produced_state, stats) = self.executor.produce_row(&mut self.fetcher, output)?;
            state = produced_state;
            self.context.merge_executor_stats(stats);

            if output.produced() {
                output.advance_row()?;
            }

            match state {
                ExecutionState::Waiting => {
                    self.context.metrics().increment_waiting();
                    return Ok(state);
                }
                ExecutionState::Done => return Ok(state),
                ExecutionState::HasMore => {}
            }
        }
        Ok(state)
    }

    fn get_some_without_trace(
        &mut self,
        at_most: usize,
    ) -> ExecResult<(ExecutionState, Option<Block>)> {
        self.check_pull_allowed()?;
        if at_most == 0 {
            return Err(ExecutionError::internal("get_some called with at_most = 0"));
        }

        if self.output.is_none() {
            if self.done {
                return Ok((ExecutionState::Done, None));
            }
            let (state, block) = self.request_wrapped_block(at_most)?;
            match block {
                Some(block) => self.output = Some(self.create_output_row(block)),
                None => {
                    if state == ExecutionState::Done {
                        self.done = true;
                    }
                    return Ok((state, None));
                }
            }
        }

        let state = self.fill_output()?;
        if state == ExecutionState::Waiting {
            return Ok((state, None));
        }

        let mut output = self
            .output
            .take()
            .ok_or_else(|| ExecutionError::internal("no open output block"))?;

        if state == ExecutionState::Done {
            self.done = true;
            return Ok((state, output.steal_block()?));
        }

        if !E::PROPERTIES.allows_block_passthrough && output.num_rows_written() != at_most {
            return Err(ExecutionError::internal(format!(
                "node {} filled a block with {} rows, {} requested",
                self.id,
                output.num_rows_written(),
                at_most
            )));
        }
        match output.steal_block()? {
            Some(block) => Ok((ExecutionState::HasMore, Some(block))),
            None => Err(ExecutionError::internal(format!(
                "node {} reported a full output block without rows",
                self.id
            ))),
        }
    }

    fn skip_some_without_trace(&mut self, at_most: usize) -> ExecResult<(ExecutionState, usize)> {
        if E::PROPERTIES.allows_block_passthrough {
            // Passthrough writes into the borrowed upstream block anyway;
            // dropping it hands it back to the pool.
            let (state, block) = self.get_some_without_trace(at_most)?;
            return Ok((state, block.map_or(0, |b| b.size())));
        }

        self.check_pull_allowed()?;
        if at_most == 0 {
            return Err(ExecutionError::internal("skip_some called with at_most = 0"));
        }

        if self.output.is_none() {
            if self.done {
                return Ok((ExecutionState::Done, 0));
            }
            let (state, block) = self.request_scratch_block(at_most)?;
            match block {
                Some(block) => {
                    let row = self.create_output_row(SharedBlock::new(block));
                    self.output = Some(row);
                }
                None => {
                    if state == ExecutionState::Done {
                        self.done = true;
                        self.buffer = None;
                    }
                    return Ok((state, 0));
                }
            }
        }

        let state = self.fill_output()?;
        if state == ExecutionState::Waiting {
            return Ok((state, 0));
        }

        let output = self
            .output
            .take()
            .ok_or_else(|| ExecutionError::internal("no open output block"))?;
        let skipped = output.num_rows_written();
        if state == ExecutionState::HasMore && skipped != at_most {
            return Err(ExecutionError::internal(format!(
                "node {} skipped {} rows, {} requested",
                self.id, skipped, at_most
            )));
        }

        let block = output.into_block()?;
        if state == ExecutionState::Done {
            self.done = true;
        } else {
            self.buffer = block;
        }
        Ok((state, skipped))
    }

    fn trace_begin(&mut self, event: Event, at_most: usize) {
        let profile = self.context.profile();
        if profile < ProfileLevel::Blocks {
            return;
        }
        if self.call_begin.is_none() {
            self.call_begin = Some(Instant::now());
        }
        if profile >= ProfileLevel::Trace1 {
            self.log(event, &[("at_most", at_most.to_string())]);
        }
    }

    fn trace_end(&mut self, event: Event, state: ExecutionState, items: usize, block: Option<&Block>) {
        let profile = self.context.profile();
        if profile < ProfileLevel::Blocks {
            return;
        }

        let mut stats = NodeStats {
            calls: 1,
            items: items as u64,
            runtime: 0.0,
        };
        if state != ExecutionState::Waiting {
            if let Some(begin) = self.call_begin.take() {
                stats.runtime = begin.elapsed().as_secs_f64();
            }
        }
        self.context.add_node_stats(self.id, stats);

        if profile >= ProfileLevel::Trace1 {
            self.log(
                event,
                &[
                    ("items", items.to_string()),
                    ("state", state.as_str().to_string()),
                ],
            );
            if profile >= ProfileLevel::Trace2 && event == Event::GetSomeEnd {
                let rendered = block
                    .map(|b| b.to_json().to_string())
                    .unwrap_or_else(|| "null".to_string());
                self.log(Event::GetSomeResult, &[("result", rendered)]);
            }
        }
    }

    /// A failed call still counts; it produced nothing and ends the timing
    fn trace_failed(&mut self, event: Event, error: &ExecutionError) {
        let profile = self.context.profile();
        if profile < ProfileLevel::Blocks {
            return;
        }
        let runtime = self
            .call_begin
            .take()
            .map_or(0.0, |begin| begin.elapsed().as_secs_f64());
        self.context.add_node_stats(
            self.id,
            NodeStats {
                calls: 1,
                items: 0,
                runtime,
            },
        );
        if profile >= ProfileLevel::Trace1 {
            self.log(event, &[("error", error.code().code().to_string())]);
        }
    }

    fn record_shutdown_error(&mut self, error: ExecutionError) {
        if self.shutdown_error.is_none() {
            self.shutdown_error = Some(error);
        }
    }

    /// Drop every block this stage holds
    fn release_blocks(&mut self) {
        self.output = None;
        self.buffer = None;
        self.fetcher = self.fresh_fetcher();
    }
}

impl<E: Executor> ExecutionBlock for ExecutionBlockImpl<E> {
    fn id(&self) -> NodeId {
        self.id
    }

    fn type_name(&self) -> &'static str {
        E::NAME
    }

    fn get_some(&mut self, at_most: usize) -> ExecResult<(ExecutionState, Option<Block>)> {
        self.trace_begin(Event::GetSomeBegin, at_most);
        let (state, block) = match self.get_some_without_trace(at_most) {
            Ok(answer) => answer,
            Err(e) => {
                self.trace_failed(Event::GetSomeEnd, &e);
                return Err(e);
            }
        };
        let items = block.as_ref().map_or(0, Block::size);
        self.context.metrics().add_rows_produced(items as u64);
        self.trace_end(Event::GetSomeEnd, state, items, block.as_ref());
        Ok((state, block))
    }

    fn skip_some(&mut self, at_most: usize) -> ExecResult<(ExecutionState, usize)> {
        self.trace_begin(Event::SkipSomeBegin, at_most);
        let (state, skipped) = match self.skip_some_without_trace(at_most) {
            Ok(answer) => answer,
            Err(e) => {
                self.trace_failed(Event::SkipSomeEnd, &e);
                return Err(e);
            }
        };
        self.context.metrics().add_rows_skipped(skipped as u64);
        self.trace_end(Event::SkipSomeEnd, state, skipped, None);
        Ok((state, skipped))
    }

    fn initialize_cursor(&mut self, input: Option<&InputRow>) -> ExecResult<ExecutionState> {
        if self.shutdown_state != ShutdownState::Running {
            return Err(ExecutionError::internal(format!(
                "node {} reset after shutdown",
                self.id
            )));
        }

        let mut fetcher = self.fresh_fetcher();
        fetcher.bind_input(input, self.infos())?;
        self.fetcher = fetcher;
        self.executor = E::new(Arc::clone(&self.infos));
        self.output = None;

        let start = match self.cascade {
            Cascade::InitializeCursor(pos) => pos,
            _ => 0,
        };
        for pos in start..self.dependencies.len() {
            self.cascade = Cascade::InitializeCursor(pos);
            let dependency = Rc::clone(&self.dependencies[pos]);
            let state = borrow_block(&dependency)?.initialize_cursor(input)?;
            if state == ExecutionState::Waiting {
                return Ok(state);
            }
        }
        self.cascade = Cascade::Idle;

        self.buffer = None;
        self.done = false;
        self.call_begin = None;

        if self.context.profile() >= ProfileLevel::Trace1 {
            self.log(Event::CursorInitialized, &[]);
        }
        Ok(ExecutionState::Done)
    }

    fn shutdown(&mut self, error: Option<ErrorCode>) -> ExecResult<ExecutionState> {
        if let ShutdownState::Finished(result) = &self.shutdown_state {
            return result.clone().map(|()| ExecutionState::Done);
        }

        if self.shutdown_state == ShutdownState::Running {
            self.shutdown_state = ShutdownState::Cascading;
            self.shutdown_error = None;
        }

        if self.shutdown_state == ShutdownState::Cascading {
            let start = match self.cascade {
                Cascade::Shutdown(pos) => pos,
                _ => 0,
            };
            for pos in start..self.dependencies.len() {
                self.cascade = Cascade::Shutdown(pos);
                let dependency = Rc::clone(&self.dependencies[pos]);
                let answer = borrow_block(&dependency).and_then(|mut dep| dep.shutdown(error));
                match answer {
                    Ok(ExecutionState::Waiting) => return Ok(ExecutionState::Waiting),
                    Ok(_) => {}
                    Err(e) => self.record_shutdown_error(e),
                }
            }
            self.cascade = Cascade::Idle;
            self.release_blocks();
            self.shutdown_state = ShutdownState::Finalizing;
        }

        match self.executor.shutdown(error) {
            Ok(ExecutionState::Waiting) => return Ok(ExecutionState::Waiting),
            Ok(_) => {}
            Err(e) => self.record_shutdown_error(e),
        }

        let result = match self.shutdown_error.take() {
            Some(e) => {
                self.log(
                    Event::ShutdownFailed,
                    &[("code", e.code().code().to_string()), ("error", e.to_string())],
                );
                Err(e)
            }
            None => {
                if self.context.profile() >= ProfileLevel::Trace1 {
                    self.log(Event::ShutdownComplete, &[]);
                }
                Ok(())
            }
        };
        self.shutdown_state = ShutdownState::Finished(result.clone());
        result.map(|()| ExecutionState::Done)
    }

    fn has_more_state(&mut self) -> ExecutionState {
        if self.done {
            return ExecutionState::Done;
        }
        if self.output.is_none()
            && !self.fetcher.has_buffered_rows()
            && self.fetcher.upstream_state() == ExecutionState::Done
            && self.executor.number_of_rows_in_flight() == 0
        {
            self.done = true;
            return ExecutionState::Done;
        }
        ExecutionState::HasMore
    }

    fn dependencies(&self) -> &[ExecutionBlockRef] {
        &self.dependencies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockPool;
    use crate::errors::ErrorCode;
    use crate::executor::{
        CalculationExecutor, CalculationInfos, FilterExecutor, FilterInfos, IdExecutor,
        LimitExecutor, LimitInfos, SortExecutor, SortInfos, SortRegister, UnionExecutor,
    };
    use crate::fetcher::{ConstFetcher, SingleRowFetcher};
    use crate::testing::{drain, values_block, ScriptedBlock};
    use serde_json::{json, Value};
    use std::cell::RefCell;

    // =========================================================================
    // Helpers
    // =========================================================================

    fn stage<E: Executor + 'static>(
        ctx: &QueryContext,
        id: NodeId,
        infos: E::Infos,
        deps: Vec<ExecutionBlockRef>,
    ) -> ExecutionBlockRef {
        Rc::new(RefCell::new(
            ExecutionBlockImpl::<E>::new(id, ctx.clone(), infos, deps).unwrap(),
        ))
    }

    fn filter(ctx: &QueryContext, upstream: ExecutionBlockRef) -> ExecutionBlockRef {
        stage::<FilterExecutor>(
            ctx,
            1,
            FilterInfos::new(ExecutorInfos::pipeline(1, [0], []), 0),
            vec![upstream],
        )
    }

    fn column(block: &Block, reg: usize) -> Vec<Value> {
        (0..block.size())
            .map(|r| block.get(r, reg).cloned().unwrap_or(Value::Null))
            .collect()
    }

    // =========================================================================
    // get_some
    // =========================================================================

    #[test]
    fn test_filter_then_limit_batches() {
        let ctx = QueryContext::default();
        let pool = ctx.pool().clone();
        let source = ScriptedBlock::new(vec![
            (ExecutionState::HasMore, Some(values_block(&pool, &[1, 0, 2, 0, 3]))),
            (ExecutionState::Done, Some(values_block(&pool, &[0, 4, 0, 5, 6]))),
        ])
        .into_ref();
        let limit = stage::<LimitExecutor>(
            &ctx,
            2,
            LimitInfos::new(ExecutorInfos::pipeline(1, [], []), 0, 3, false),
            vec![filter(&ctx, source)],
        );

        let (state, block) = limit.borrow_mut().get_some(2).unwrap();
        assert_eq!(state, ExecutionState::HasMore);
        assert_eq!(column(&block.unwrap(), 0), vec![json!(1), json!(2)]);

        let (state, block) = limit.borrow_mut().get_some(2).unwrap();
        assert_eq!(state, ExecutionState::Done);
        assert_eq!(column(&block.unwrap(), 0), vec![json!(3)]);

        let (state, block) = limit.borrow_mut().get_some(2).unwrap();
        assert_eq!(state, ExecutionState::Done);
        assert!(block.is_none());
        assert_eq!(ctx.stats().filtered, 2);
    }

    #[test]
    fn test_passthrough_reuses_upstream_block() {
        let ctx = QueryContext::default();
        let pool = ctx.pool().clone();
        let rows: Vec<Vec<Option<Value>>> = (1..=5).map(|v| vec![Some(json!(v)), None]).collect();
        let input = pool.block_from_rows(&rows, 2).unwrap();
        let input_id = input.id();
        let allocations = pool.stats().fresh_allocations + pool.stats().recycled;

        let source = ScriptedBlock::new(vec![(ExecutionState::Done, Some(input))]).into_ref();
        let expression: crate::executor::Expression = Arc::new(|row: &InputRow| -> ExecResult<Value> {
            let v = row.value(0).and_then(|v| v.as_i64()).unwrap_or(0);
            Ok(json!(v * 2))
        });
        let calc = stage::<CalculationExecutor>(
            &ctx,
            1,
            CalculationInfos::new(ExecutorInfos::pipeline(2, [0], [1]), 1, expression),
            vec![source],
        );

        let (state, block) = calc.borrow_mut().get_some(10).unwrap();
        let block = block.unwrap();
        assert_eq!(state, ExecutionState::Done);
        assert_eq!(block.id(), input_id);
        assert_eq!(
            column(&block, 1),
            vec![json!(2), json!(4), json!(6), json!(8), json!(10)]
        );
        assert_eq!(
            pool.stats().fresh_allocations + pool.stats().recycled,
            allocations
        );
    }

    #[test]
    fn test_passthrough_rejects_filled_output_register() {
        if !cfg!(debug_assertions) {
            return;
        }
        let ctx = QueryContext::default();
        let input = ctx
            .pool()
            .block_from_rows(&[vec![Some(json!(1)), Some(json!("taken"))]], 2)
            .unwrap();
        let source = ScriptedBlock::new(vec![(ExecutionState::Done, Some(input))]).into_ref();
        let calc = stage::<CalculationExecutor>(
            &ctx,
            1,
            CalculationInfos::new(
                ExecutorInfos::pipeline(2, [0], [1]),
                1,
                Arc::new(|_: &InputRow| -> ExecResult<Value> { Ok(Value::Null) }),
            ),
            vec![source],
        );
        let err = calc.borrow_mut().get_some(10).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Internal);
    }

    #[test]
    fn test_waiting_keeps_partial_output() {
        let ctx = QueryContext::default();
        let pool = ctx.pool().clone();
        let source = ScriptedBlock::new(vec![
            (ExecutionState::HasMore, Some(values_block(&pool, &[1, 2]))),
            (ExecutionState::Waiting, None),
            (ExecutionState::Done, Some(values_block(&pool, &[3]))),
        ])
        .into_ref();
        let f = filter(&ctx, source);

        let (state, block) = f.borrow_mut().get_some(3).unwrap();
        assert_eq!(state, ExecutionState::Waiting);
        assert!(block.is_none());

        let (state, block) = f.borrow_mut().get_some(3).unwrap();
        assert_eq!(state, ExecutionState::Done);
        assert_eq!(column(&block.unwrap(), 0), vec![json!(1), json!(2), json!(3)]);
        assert_eq!(ctx.metrics().snapshot().waiting_returns, 1);
    }

    #[test]
    fn test_zero_at_most_is_internal() {
        let ctx = QueryContext::default();
        let f = filter(&ctx, ScriptedBlock::new(Vec::new()).into_ref());
        assert!(f.borrow_mut().get_some(0).unwrap_err().is_fatal());
        assert!(f.borrow_mut().skip_some(0).unwrap_err().is_fatal());
    }

    #[test]
    fn test_size_restricted_blocks_are_exact() {
        let ctx = QueryContext::default();
        let pool = ctx.pool().clone();
        let source = ScriptedBlock::new(vec![
            (ExecutionState::HasMore, Some(values_block(&pool, &[3, 1, 2]))),
            (ExecutionState::Done, Some(values_block(&pool, &[5, 4]))),
        ])
        .into_ref();
        let sort = stage::<SortExecutor>(
            &ctx,
            1,
            SortInfos::new(ExecutorInfos::pipeline(1, [0], []), vec![SortRegister::asc(0)]),
            vec![source],
        );

        let mut sizes = Vec::new();
        let mut values = Vec::new();
        loop {
            let (state, block) = sort.borrow_mut().get_some(2).unwrap();
            let block = block.unwrap();
            sizes.push(block.size());
            values.extend(column(&block, 0));
            if state == ExecutionState::Done {
                break;
            }
            assert_eq!(sort.borrow_mut().has_more_state(), ExecutionState::HasMore);
        }
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(values, vec![json!(1), json!(2), json!(3), json!(4), json!(5)]);
        assert_eq!(sort.borrow_mut().has_more_state(), ExecutionState::Done);
    }

    #[test]
    fn test_union_concatenates() {
        let ctx = QueryContext::default();
        let pool = ctx.pool().clone();
        let left = ScriptedBlock::new(vec![(ExecutionState::Done, Some(values_block(&pool, &[1, 2])))]);
        let right = ScriptedBlock::new(vec![
            (ExecutionState::Waiting, None),
            (ExecutionState::Done, Some(values_block(&pool, &[3]))),
        ]);
        let union = stage::<UnionExecutor>(
            &ctx,
            3,
            ExecutorInfos::pipeline(1, [], []),
            vec![left.into_ref(), right.into_ref()],
        );
        assert_eq!(
            drain(&union, 2, 0).unwrap(),
            vec![json!(1), json!(2), json!(3)]
        );
    }

    // =========================================================================
    // skip_some
    // =========================================================================

    #[test]
    fn test_skip_reuses_scratch_block() {
        let ctx = QueryContext::default();
        let pool = ctx.pool().clone();
        let source = ScriptedBlock::new(vec![(
            ExecutionState::Done,
            Some(values_block(&pool, &[1, 0, 2, 0, 3, 0, 4, 0, 5, 6])),
        )])
        .into_ref();
        let f = filter(&ctx, source);

        assert_eq!(f.borrow_mut().skip_some(4).unwrap(), (ExecutionState::HasMore, 4));
        assert_eq!(f.borrow_mut().skip_some(4).unwrap(), (ExecutionState::Done, 2));
        assert_eq!(f.borrow_mut().skip_some(4).unwrap(), (ExecutionState::Done, 0));

        assert_eq!(pool.stats().requests, 2);
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(ctx.metrics().snapshot().rows_skipped, 6);
        assert_eq!(ctx.metrics().snapshot().rows_produced, 0);
    }

    #[test]
    fn test_skip_passthrough_counts_upstream_rows() {
        let ctx = QueryContext::default();
        let pool = ctx.pool().clone();
        let source = ScriptedBlock::new(vec![
            (ExecutionState::HasMore, Some(values_block(&pool, &[1, 2, 3]))),
            (ExecutionState::Done, Some(values_block(&pool, &[4, 5]))),
        ])
        .into_ref();
        let id = stage::<IdExecutor<SingleRowFetcher>>(
            &ctx,
            1,
            ExecutorInfos::pipeline(1, [], []),
            vec![source],
        );
        assert_eq!(id.borrow_mut().skip_some(3).unwrap(), (ExecutionState::HasMore, 3));
        assert_eq!(id.borrow_mut().skip_some(3).unwrap(), (ExecutionState::Done, 2));
        assert_eq!(pool.outstanding(), 0);
    }

    // =========================================================================
    // Kill flag and lifecycle
    // =========================================================================

    #[test]
    fn test_killed_query_fails_next_pull() {
        let ctx = QueryContext::default();
        let f = filter(&ctx, ScriptedBlock::new(Vec::new()).into_ref());
        ctx.kill();
        let err = f.borrow_mut().get_some(10).unwrap_err();
        assert_eq!(err, ExecutionError::QueryKilled);
        assert!(f.borrow_mut().skip_some(10).is_err());
        assert_eq!(ctx.metrics().snapshot().queries_killed, 2);
    }

    #[test]
    fn test_pull_after_shutdown_is_internal() {
        let ctx = QueryContext::default();
        let f = filter(&ctx, ScriptedBlock::new(Vec::new()).into_ref());
        assert_eq!(f.borrow_mut().shutdown(None).unwrap(), ExecutionState::Done);
        assert_eq!(f.borrow_mut().get_some(1).unwrap_err().code(), ErrorCode::Internal);
        assert!(f.borrow_mut().initialize_cursor(None).is_err());
    }

    #[test]
    fn test_shutdown_first_error_wins_and_is_memoised() {
        let ctx = QueryContext::default();
        let (left, left_ref) = ScriptedBlock::new(Vec::new())
            .with_shutdown(vec![Err(ExecutionError::execution_failed("left"))])
            .into_shared();
        let (right, right_ref) = ScriptedBlock::new(Vec::new())
            .with_shutdown(vec![Err(ExecutionError::internal("right"))])
            .into_shared();
        let union = stage::<UnionExecutor>(
            &ctx,
            3,
            ExecutorInfos::pipeline(1, [], []),
            vec![left_ref, right_ref],
        );

        let first = union.borrow_mut().shutdown(Some(ErrorCode::ExecutionFailed));
        assert_eq!(first, Err(ExecutionError::execution_failed("left")));
        assert_eq!(right.borrow().shutdown_calls, 1);

        let second = union.borrow_mut().shutdown(None);
        assert_eq!(second, first);
        assert_eq!(left.borrow().shutdown_calls, 1);
        assert_eq!(right.borrow().shutdown_calls, 1);
    }

    #[test]
    fn test_shutdown_resumes_waiting_dependency() {
        let ctx = QueryContext::default();
        let (left, left_ref) = ScriptedBlock::new(Vec::new()).into_shared();
        let (right, right_ref) = ScriptedBlock::new(Vec::new())
            .with_shutdown(vec![Ok(ExecutionState::Waiting)])
            .into_shared();
        let union = stage::<UnionExecutor>(
            &ctx,
            3,
            ExecutorInfos::pipeline(1, [], []),
            vec![left_ref, right_ref],
        );

        assert_eq!(union.borrow_mut().shutdown(None).unwrap(), ExecutionState::Waiting);
        assert_eq!(union.borrow_mut().shutdown(None).unwrap(), ExecutionState::Done);
        assert_eq!(left.borrow().shutdown_calls, 1);
        assert_eq!(right.borrow().shutdown_calls, 2);
    }

    #[test]
    fn test_shutdown_releases_buffered_blocks() {
        let ctx = QueryContext::default();
        let pool = ctx.pool().clone();
        let source = ScriptedBlock::new(vec![
            (ExecutionState::HasMore, Some(values_block(&pool, &[1, 2, 3]))),
            (ExecutionState::Done, Some(values_block(&pool, &[4]))),
        ])
        .into_ref();
        let f = filter(&ctx, source);
        f.borrow_mut().get_some(1).unwrap();
        assert!(pool.outstanding() > 0);

        f.borrow_mut().shutdown(None).unwrap();
        assert_eq!(pool.outstanding(), 0);
    }

    // =========================================================================
    // initialize_cursor
    // =========================================================================

    #[test]
    fn test_initialize_binds_input_row() {
        let ctx = QueryContext::default();
        let pool = ctx.pool().clone();
        let singleton = stage::<IdExecutor<ConstFetcher>>(
            &ctx,
            1,
            ExecutorInfos::pipeline(2, [], []),
            Vec::new(),
        );

        let outer = crate::block::SharedBlock::new(
            pool.block_from_rows(&[vec![Some(json!("a")), Some(json!("b"))]], 2)
                .unwrap(),
        );
        let row = InputRow::new(outer, 0);
        assert_eq!(
            singleton.borrow_mut().initialize_cursor(Some(&row)).unwrap(),
            ExecutionState::Done
        );
        let (state, block) = singleton.borrow_mut().get_some(10).unwrap();
        assert_eq!(state, ExecutionState::Done);
        let block = block.unwrap();
        assert_eq!(block.row(0), &[Some(json!("a")), Some(json!("b"))]);
        drop(block);
        drop(row);

        singleton.borrow_mut().initialize_cursor(None).unwrap();
        let (_, block) = singleton.borrow_mut().get_some(10).unwrap();
        assert_eq!(block.unwrap().row(0), &[None, None]);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_initialize_resumes_and_short_circuits() {
        let ctx = QueryContext::default();
        let (left, left_ref) = ScriptedBlock::new(Vec::new()).into_shared();
        let (right, right_ref) = ScriptedBlock::new(Vec::new())
            .with_initialize(vec![Ok(ExecutionState::Waiting)])
            .into_shared();
        let union = stage::<UnionExecutor>(
            &ctx,
            3,
            ExecutorInfos::pipeline(1, [], []),
            vec![left_ref, right_ref],
        );

        assert_eq!(
            union.borrow_mut().initialize_cursor(None).unwrap(),
            ExecutionState::Waiting
        );
        assert_eq!(
            union.borrow_mut().initialize_cursor(None).unwrap(),
            ExecutionState::Done
        );
        assert_eq!(left.borrow().initialize_calls, 1);
        assert_eq!(right.borrow().initialize_calls, 2);

        let (failing, failing_ref) = ScriptedBlock::new(Vec::new())
            .with_initialize(vec![Err(ExecutionError::execution_failed("boom"))])
            .into_shared();
        let (skipped, skipped_ref) = ScriptedBlock::new(Vec::new()).into_shared();
        let union = stage::<UnionExecutor>(
            &ctx,
            4,
            ExecutorInfos::pipeline(1, [], []),
            vec![failing_ref, skipped_ref],
        );
        assert!(union.borrow_mut().initialize_cursor(None).is_err());
        assert_eq!(failing.borrow().initialize_calls, 1);
        assert_eq!(skipped.borrow().initialize_calls, 0);
    }

    // =========================================================================
    // Profiling
    // =========================================================================

    #[test]
    fn test_profile_blocks_records_node_stats() {
        let ctx = QueryContext::default().with_profile(ProfileLevel::Blocks);
        let pool = ctx.pool().clone();
        let source = ScriptedBlock::new(vec![(
            ExecutionState::Done,
            Some(values_block(&pool, &[1, 2, 0])),
        )])
        .into_ref();
        let f = filter(&ctx, source);
        drain(&f, 10, 0).unwrap();

        let stats = ctx.stats();
        let node = stats.node(1).unwrap();
        assert_eq!(node.calls, 1);
        assert_eq!(node.items, 2);
    }

    #[test]
    fn test_profile_off_records_nothing() {
        let ctx = QueryContext::default();
        let pool = ctx.pool().clone();
        let source = ScriptedBlock::new(vec![(
            ExecutionState::Done,
            Some(values_block(&pool, &[1])),
        )])
        .into_ref();
        drain(&filter(&ctx, source), 10, 0).unwrap();
        assert!(ctx.stats().node(1).is_none());
        assert_eq!(ctx.metrics().snapshot().rows_produced, 1);
    }

    #[test]
    fn test_profile_counts_failed_calls() {
        let ctx = QueryContext::default().with_profile(ProfileLevel::Blocks);
        let f = filter(&ctx, ScriptedBlock::new(Vec::new()).into_ref());
        ctx.kill();

        assert!(f.borrow_mut().get_some(10).is_err());
        assert!(f.borrow_mut().skip_some(10).is_err());

        let stats = ctx.stats();
        let node = stats.node(1).unwrap();
        assert_eq!(node.calls, 2);
        assert_eq!(node.items, 0);
    }
}
