//! One output row per array element

use std::sync::Arc;

use serde_json::Value;

use super::infos::ExecutorInfos;
use super::traits::{Executor, ExecutorProperties};
use crate::block::RegisterId;
use crate::config::DEFAULT_BATCH_SIZE;
use crate::engine::ExecutionState;
use crate::errors::{ExecResult, ExecutionError};
use crate::fetcher::{RowFetcher, SingleRowFetcher};
use crate::row::{InputRow, OutputRow};
use crate::stats::NoStats;

#[derive(Debug, Clone)]
pub struct EnumerateListInfos {
    base: ExecutorInfos,
    input_register: RegisterId,
    output_register: RegisterId,
}

impl EnumerateListInfos {
    pub fn new(base: ExecutorInfos, input_register: RegisterId, output_register: RegisterId) -> Self {
        Self {
            base,
            input_register,
            output_register,
        }
    }
}

impl AsRef<ExecutorInfos> for EnumerateListInfos {
    fn as_ref(&self) -> &ExecutorInfos {
        &self.base
    }
}

struct CurrentRow {
    row: InputRow,
    items: Vec<Value>,
    position: usize,
    upstream: ExecutionState,
}

/// Emits every element of the array in the input register as its own row.
///
/// Anything but an array in the input register fails the query.
pub struct EnumerateListExecutor {
    infos: Arc<EnumerateListInfos>,
    current: Option<CurrentRow>,
}

impl Executor for EnumerateListExecutor {
    type Fetcher = SingleRowFetcher;
    type Infos = EnumerateListInfos;
    type Stats = NoStats;

    const PROPERTIES: ExecutorProperties = ExecutorProperties {
        allows_block_passthrough: false,
        input_size_restricts_output_size: false,
    };
    const NAME: &'static str = "EnumerateListNode";

    fn new(infos: Arc<EnumerateListInfos>) -> Self {
        Self {
            infos,
            current: None,
        }
    }

    fn produce_row(
        &mut self,
        fetcher: &mut SingleRowFetcher,
        output: &mut OutputRow,
    ) -> ExecResult<(ExecutionState, NoStats)> {
        loop {
            if self.current.is_none() {
                let (state, input) = fetcher.fetch_row(DEFAULT_BATCH_SIZE)?;
                if state == ExecutionState::Waiting {
                    return Ok((state, NoStats));
                }
                let row = match input {
                    Some(row) => row,
                    None => return Ok((state, NoStats)),
                };
                let items = match row.value(self.infos.input_register) {
                    Some(Value::Array(items)) => items,
                    other => {
                        return Err(ExecutionError::execution_failed(format!(
                            "array expected in register {}, found {}",
                            self.infos.input_register,
                            other.map(|v| type_name(&v)).unwrap_or("nothing")
                        )))
                    }
                };
                self.current = Some(CurrentRow {
                    row,
                    items,
                    position: 0,
                    upstream: state,
                });
            }

            let current = match self.current.as_mut() {
                Some(current) => current,
                None => continue,
            };

            if current.position < current.items.len() {
                let value = std::mem::take(&mut current.items[current.position]);
                output.set_value(self.infos.output_register, &current.row, value)?;
                current.position += 1;
            }

            if current.position >= current.items.len() {
                let upstream = current.upstream;
                let produced = output.produced();
                self.current = None;
                if upstream == ExecutionState::Done {
                    return Ok((ExecutionState::Done, NoStats));
                }
                if !produced {
                    continue;
                }
            }
            return Ok((ExecutionState::HasMore, NoStats));
        }
    }

    fn number_of_rows_in_flight(&self) -> usize {
        self.current
            .as_ref()
            .map_or(0, |c| c.items.len().saturating_sub(c.position))
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
