//! Projection of a computed value into one register

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::infos::ExecutorInfos;
use super::traits::{Executor, ExecutorProperties};
use crate::block::RegisterId;
use crate::config::DEFAULT_BATCH_SIZE;
use crate::engine::ExecutionState;
use crate::errors::ExecResult;
use crate::fetcher::{RowFetcher, SingleRowFetcher};
use crate::row::{InputRow, OutputRow};
use crate::stats::NoStats;

/// Expression evaluated once per input row
pub type Expression = Arc<dyn Fn(&InputRow) -> ExecResult<Value> + Send + Sync>;

pub struct CalculationInfos {
    base: ExecutorInfos,
    output_register: RegisterId,
    expression: Expression,
}

impl CalculationInfos {
    pub fn new(base: ExecutorInfos, output_register: RegisterId, expression: Expression) -> Self {
        Self {
            base,
            output_register,
            expression,
        }
    }

    pub fn output_register(&self) -> RegisterId {
        self.output_register
    }
}

impl fmt::Debug for CalculationInfos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalculationInfos")
            .field("base", &self.base)
            .field("output_register", &self.output_register)
            .finish_non_exhaustive()
    }
}

impl AsRef<ExecutorInfos> for CalculationInfos {
    fn as_ref(&self) -> &ExecutorInfos {
        &self.base
    }
}

/// Writes `expression(row)` into the output register of every row, in place
pub struct CalculationExecutor {
    infos: Arc<CalculationInfos>,
}

impl Executor for CalculationExecutor {
    type Fetcher = SingleRowFetcher;
    type Infos = CalculationInfos;
    type Stats = NoStats;

    const PROPERTIES: ExecutorProperties = ExecutorProperties {
        allows_block_passthrough: true,
        input_size_restricts_output_size: false,
    };
    const NAME: &'static str = "CalculationNode";

    fn new(infos: Arc<CalculationInfos>) -> Self {
        Self { infos }
    }

    fn produce_row(
        &mut self,
        fetcher: &mut SingleRowFetcher,
        output: &mut OutputRow,
    ) -> ExecResult<(ExecutionState, NoStats)> {
        let (state, input) = fetcher.fetch_row(DEFAULT_BATCH_SIZE)?;
        if let Some(row) = input {
            let value = (self.infos.expression)(&row)?;
            output.set_value(self.infos.output_register, &row, value)?;
        }
        Ok((state, NoStats))
    }
}
