//! Pull Protocol Invariant Tests
//!
//! Tests for the WAITING/HASMORE/DONE contract across whole trees:
//! - Waiting answers carry no rows and are safe to re-issue
//! - skip_some counts exactly what get_some would return
//! - initialize_cursor replays a pipeline
//! - shutdown is idempotent and returns every block to the pool
//! - a killed query fails at its next pull

use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use rowflow::engine::{
    borrow_block, ExecutionBlockRef, ExecutionState, ExecutionTree, QueryContext, QueryDriver,
};
use rowflow::errors::{ErrorCode, ExecResult};
use rowflow::executor::{
    ExecutorInfos, FilterExecutor, FilterInfos, IdExecutor, RowSource, RowSourceFactory,
    ScanExecutor, ScanInfos, SourcePoll,
};
use rowflow::fetcher::ConstFetcher;
use rowflow::plan::{build, Plan};

// =============================================================================
// Helper Functions
// =============================================================================

/// Source that answers `Waiting` before each real answer and counts closes
struct StallingSource {
    values: Vec<Value>,
    position: usize,
    stalled: bool,
    closes: Arc<AtomicUsize>,
}

impl RowSource for StallingSource {
    fn poll(&mut self, _at_most: usize) -> ExecResult<SourcePoll> {
        if !self.stalled {
            self.stalled = true;
            return Ok(SourcePoll::Waiting);
        }
        self.stalled = false;
        match self.values.get(self.position) {
            Some(v) => {
                self.position += 1;
                Ok(SourcePoll::Rows(vec![v.clone()]))
            }
            None => Ok(SourcePoll::Exhausted),
        }
    }

    fn rewind(&mut self) -> ExecResult<()> {
        self.position = 0;
        Ok(())
    }

    fn close(&mut self) -> ExecResult<ExecutionState> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(ExecutionState::Done)
    }
}

fn stalling_factory(values: Vec<Value>, closes: Arc<AtomicUsize>) -> RowSourceFactory {
    Arc::new(move || {
        Box::new(StallingSource {
            values: values.clone(),
            position: 0,
            stalled: false,
            closes: Arc::clone(&closes),
        }) as Box<dyn RowSource>
    })
}

/// Singleton, scan over `factory`, then a filter on register 0
fn filtered_scan(context: QueryContext, factory: RowSourceFactory) -> ExecutionTree {
    let mut tree = ExecutionTree::new(context);
    tree.add::<IdExecutor<ConstFetcher>>(1, ExecutorInfos::pipeline(1, [], []), &[])
        .unwrap();
    tree.add::<ScanExecutor>(
        2,
        ScanInfos::new(ExecutorInfos::pipeline(1, [], [0]), 0, factory),
        &[1],
    )
    .unwrap();
    tree.add::<FilterExecutor>(3, FilterInfos::new(ExecutorInfos::pipeline(1, [0], []), 0), &[2])
        .unwrap();
    tree
}

fn sample_plan() -> Plan {
    serde_json::from_value(json!({
        "source": {"var": "d", "values": [3, 0, 8, 1, 0, 4, 9, 2]},
        "stages": [
            {"filter": {"var": "d"}},
            {"sort": [{"var": "d", "descending": true}]},
            {"limit": {"offset": 1, "limit": 4}}
        ],
        "return": "d"
    }))
    .unwrap()
}

/// Pull `root` with `get_some` until `Done`, retrying `Waiting`
fn pull_all(root: &ExecutionBlockRef, at_most: usize) -> (Vec<Value>, usize) {
    let mut rows = Vec::new();
    let mut waits = 0;
    loop {
        let (state, block) = borrow_block(root).unwrap().get_some(at_most).unwrap();
        match &block {
            Some(b) => {
                assert!(b.size() <= at_most);
                rows.extend((0..b.size()).map(|r| b.get(r, 0).cloned().unwrap_or(Value::Null)));
            }
            None => assert_ne!(state, ExecutionState::HasMore),
        }
        match state {
            ExecutionState::Waiting => {
                assert!(block.is_none(), "waiting answer carried rows");
                waits += 1;
                assert!(waits < 1000);
            }
            ExecutionState::Done => return (rows, waits),
            ExecutionState::HasMore => {}
        }
    }
}

// =============================================================================
// Waiting
// =============================================================================

/// Waiting from deep in the tree surfaces at the root without losing rows.
#[test]
fn test_waiting_is_retried_without_losing_rows() {
    let closes = Arc::new(AtomicUsize::new(0));
    let tree = filtered_scan(
        QueryContext::default(),
        stalling_factory(vec![json!(1), json!(0), json!(2), json!(3)], Arc::clone(&closes)),
    );
    let root = tree.root().unwrap();

    let (rows, waits) = pull_all(&root, 2);
    assert_eq!(rows, vec![json!(1), json!(2), json!(3)]);
    assert!(waits >= 4);
    assert_eq!(tree.context().stats().filtered, 1);
    assert_eq!(tree.context().stats().scanned, 4);

    assert_eq!(borrow_block(&root).unwrap().shutdown(None).unwrap(), ExecutionState::Done);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

/// The driver re-issues waiting calls through its hook.
#[test]
fn test_driver_wait_hook_sees_every_wait() {
    let closes = Arc::new(AtomicUsize::new(0));
    let tree = filtered_scan(
        QueryContext::default(),
        stalling_factory(vec![json!(true), json!(false)], Arc::clone(&closes)),
    );

    let waits = Rc::new(Cell::new(0));
    let seen = Rc::clone(&waits);
    let blocks = QueryDriver::new(tree.root().unwrap(), 10)
        .with_wait_hook(
            Box::new(move |_| {
                seen.set(seen.get() + 1);
                Ok(())
            }),
            5,
        )
        .drain()
        .unwrap();

    assert_eq!(blocks.iter().map(|b| b.size()).sum::<usize>(), 1);
    assert_eq!(waits.get(), 3);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Skip
// =============================================================================

/// Counting with skip_some agrees with get_some for every batch size.
#[test]
fn test_skip_count_matches_get_some() {
    let plan = sample_plan();
    for batch in [1, 2, 3, 7, 100] {
        let fetched = build(&plan, QueryContext::default()).unwrap();
        let (rows, _) = pull_all(&fetched.tree.root().unwrap(), batch);

        let counted = build(&plan, QueryContext::default()).unwrap();
        let count = QueryDriver::new(counted.tree.root().unwrap(), batch)
            .count()
            .unwrap();
        assert_eq!(count, rows.len(), "batch {}", batch);
        assert_eq!(rows, vec![json!(8), json!(4), json!(3), json!(2)]);
    }
}

// =============================================================================
// Cursor Reset
// =============================================================================

/// A reset pipeline produces the same rows again and leaks no blocks.
#[test]
fn test_initialize_cursor_replays_pipeline() {
    let context = QueryContext::default();
    let built = build(&sample_plan(), context.clone()).unwrap();
    let root = built.tree.root().unwrap();

    let (first, _) = pull_all(&root, 3);
    assert_eq!(
        borrow_block(&root).unwrap().initialize_cursor(None).unwrap(),
        ExecutionState::Done
    );
    let (second, _) = pull_all(&root, 2);
    assert_eq!(first, second);

    assert_eq!(borrow_block(&root).unwrap().shutdown(None).unwrap(), ExecutionState::Done);
    assert_eq!(context.pool().outstanding(), 0);
}

// =============================================================================
// Shutdown
// =============================================================================

/// Shutdown answers the same way however often it is called.
#[test]
fn test_shutdown_is_idempotent() {
    let context = QueryContext::default();
    let built = build(&sample_plan(), context.clone()).unwrap();
    let root = built.tree.root().unwrap();

    // Partially consumed: blocks are still held upstream
    let (state, block) = borrow_block(&root).unwrap().get_some(1).unwrap();
    assert_eq!(state, ExecutionState::HasMore);
    drop(block);

    for _ in 0..3 {
        let state = borrow_block(&root)
            .unwrap()
            .shutdown(Some(ErrorCode::QueryKilled))
            .unwrap();
        assert_eq!(state, ExecutionState::Done);
    }
    assert_eq!(context.pool().outstanding(), 0);

    let err = borrow_block(&root).unwrap().get_some(1).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Internal);
}

// =============================================================================
// Kill
// =============================================================================

/// Killing a query fails the next pull; shutdown still succeeds.
#[test]
fn test_killed_query_fails_next_pull() {
    let context = QueryContext::default();
    let built = build(&sample_plan(), context.clone()).unwrap();
    let root = built.tree.root().unwrap();

    context.kill_switch().store(true, std::sync::atomic::Ordering::Release);

    let mut driver = QueryDriver::new(root, 10);
    let err = driver.drain().unwrap_err();
    assert_eq!(err.code(), ErrorCode::QueryKilled);
    assert_eq!(context.metrics().snapshot().queries_killed, 1);
    assert_eq!(context.pool().outstanding(), 0);
}
