//! Scan over an external row source
//!
//! The source stands in for storage or a remote shard: it may answer
//! `Waiting`, and its cursor is released by the executor's teardown.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::infos::ExecutorInfos;
use super::traits::{Executor, ExecutorProperties};
use crate::block::RegisterId;
use crate::config::DEFAULT_BATCH_SIZE;
use crate::engine::ExecutionState;
use crate::errors::{ErrorCode, ExecResult};
use crate::fetcher::{RowFetcher, SingleRowFetcher};
use crate::row::{InputRow, OutputRow};
use crate::stats::ScanStats;

/// Answer of one [`RowSource::poll`]
#[derive(Debug, Clone, PartialEq)]
pub enum SourcePoll {
    /// Nothing available yet; poll again later
    Waiting,
    /// Next documents, in order
    Rows(Vec<Value>),
    /// No documents left for the current pass
    Exhausted,
}

/// Opaque producer of documents
pub trait RowSource {
    /// Fetch up to `at_most` documents
    fn poll(&mut self, at_most: usize) -> ExecResult<SourcePoll>;

    /// Start over for the next input row
    fn rewind(&mut self) -> ExecResult<()>;

    /// Release the source. May answer `Waiting`.
    fn close(&mut self) -> ExecResult<ExecutionState> {
        Ok(ExecutionState::Done)
    }
}

/// Builds a fresh source for every executor instance
pub type RowSourceFactory = Arc<dyn Fn() -> Box<dyn RowSource> + Send + Sync>;

/// In-memory source over a fixed list of documents
#[derive(Debug, Clone)]
pub struct ValuesSource {
    values: Arc<Vec<Value>>,
    position: usize,
}

impl ValuesSource {
    pub fn new(values: Arc<Vec<Value>>) -> Self {
        Self {
            values,
            position: 0,
        }
    }

    /// Factory handing out sources over the same documents
    pub fn factory(values: Vec<Value>) -> RowSourceFactory {
        let values = Arc::new(values);
        Arc::new(move || Box::new(ValuesSource::new(Arc::clone(&values))) as Box<dyn RowSource>)
    }
}

impl RowSource for ValuesSource {
    fn poll(&mut self, at_most: usize) -> ExecResult<SourcePoll> {
        if self.position >= self.values.len() {
            return Ok(SourcePoll::Exhausted);
        }
        let end = (self.position + at_most.max(1)).min(self.values.len());
        let rows = self.values[self.position..end].to_vec();
        self.position = end;
        Ok(SourcePoll::Rows(rows))
    }

    fn rewind(&mut self) -> ExecResult<()> {
        self.position = 0;
        Ok(())
    }
}

pub struct ScanInfos {
    base: ExecutorInfos,
    output_register: RegisterId,
    source: RowSourceFactory,
}

impl ScanInfos {
    pub fn new(base: ExecutorInfos, output_register: RegisterId, source: RowSourceFactory) -> Self {
        Self {
            base,
            output_register,
            source,
        }
    }
}

impl fmt::Debug for ScanInfos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanInfos")
            .field("base", &self.base)
            .field("output_register", &self.output_register)
            .finish_non_exhaustive()
    }
}

impl AsRef<ExecutorInfos> for ScanInfos {
    fn as_ref(&self) -> &ExecutorInfos {
        &self.base
    }
}

/// For every input row, emits one row per document of the source, with the
/// document in the output register.
pub struct ScanExecutor {
    infos: Arc<ScanInfos>,
    source: Option<Box<dyn RowSource>>,
    current: Option<InputRow>,
    upstream: ExecutionState,
    buffered: VecDeque<Value>,
    exhausted: bool,
}

impl ScanExecutor {
    fn start_row(&mut self, row: InputRow, upstream: ExecutionState) -> ExecResult<()> {
        let infos = &self.infos;
        let source = self.source.get_or_insert_with(|| (infos.source)());
        source.rewind()?;
        self.current = Some(row);
        self.upstream = upstream;
        self.buffered.clear();
        self.exhausted = false;
        Ok(())
    }
}

impl Executor for ScanExecutor {
    type Fetcher = SingleRowFetcher;
    type Infos = ScanInfos;
    type Stats = ScanStats;

    const PROPERTIES: ExecutorProperties = ExecutorProperties {
        allows_block_passthrough: false,
        input_size_restricts_output_size: false,
    };
    const NAME: &'static str = "ScanNode";

    fn new(infos: Arc<ScanInfos>) -> Self {
        Self {
            infos,
            source: None,
            current: None,
            upstream: ExecutionState::HasMore,
            buffered: VecDeque::new(),
            exhausted: false,
        }
    }

    fn produce_row(
        &mut self,
        fetcher: &mut SingleRowFetcher,
        output: &mut OutputRow,
    ) -> ExecResult<(ExecutionState, ScanStats)> {
        let mut stats = ScanStats::default();
        loop {
            let row = match &self.current {
                Some(row) => row.clone(),
                None => {
                    let (state, input) = fetcher.fetch_row(DEFAULT_BATCH_SIZE)?;
                    if state == ExecutionState::Waiting {
                        return Ok((state, stats));
                    }
                    match input {
                        Some(row) => {
                            self.start_row(row, state)?;
                            continue;
                        }
                        None => return Ok((state, stats)),
                    }
                }
            };

            if let Some(doc) = self.buffered.pop_front() {
                output.set_value(self.infos.output_register, &row, doc)?;
                stats.incr_scanned();
                if self.buffered.is_empty() && self.exhausted {
                    self.current = None;
                    if self.upstream == ExecutionState::Done {
                        return Ok((ExecutionState::Done, stats));
                    }
                }
                return Ok((ExecutionState::HasMore, stats));
            }

            if self.exhausted {
                self.current = None;
                if self.upstream == ExecutionState::Done {
                    return Ok((ExecutionState::Done, stats));
                }
                continue;
            }

            let source = match self.source.as_mut() {
                Some(source) => source,
                None => {
                    self.current = None;
                    continue;
                }
            };
            match source.poll(DEFAULT_BATCH_SIZE)? {
                SourcePoll::Waiting => return Ok((ExecutionState::Waiting, stats)),
                SourcePoll::Rows(docs) => self.buffered.extend(docs),
                SourcePoll::Exhausted => self.exhausted = true,
            }
        }
    }

    /// Buffered documents, or at least one while the source may still
    /// deliver for the current row
    fn number_of_rows_in_flight(&self) -> usize {
        match &self.current {
            Some(_) => self.buffered.len().max(1),
            None => 0,
        }
    }

    fn shutdown(&mut self, _error: Option<ErrorCode>) -> ExecResult<ExecutionState> {
        self.current = None;
        self.buffered.clear();
        let state = match self.source.as_mut() {
            Some(source) => source.close()?,
            None => ExecutionState::Done,
        };
        if state == ExecutionState::Done {
            self.source = None;
        }
        Ok(state)
    }
}
