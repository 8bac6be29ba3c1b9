//! Register layout of one stage

use std::sync::Arc;

use crate::block::{RegisterId, RegisterSet};

/// Register layout the planner assigns to a stage.
///
/// - `input_registers`: registers the executor reads
/// - `output_registers`: registers it writes; every produced row writes or
///   clears each of them exactly once
/// - `registers_to_keep`: registers copied from the input row in copy mode
/// - `registers_to_clear`: registers emptied in passthrough mode
///
/// Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorInfos {
    input_registers: Arc<RegisterSet>,
    output_registers: Arc<RegisterSet>,
    number_of_input_registers: usize,
    number_of_output_registers: usize,
    registers_to_keep: Arc<RegisterSet>,
    registers_to_clear: Arc<RegisterSet>,
}

impl ExecutorInfos {
    pub fn new(
        input_registers: impl IntoIterator<Item = RegisterId>,
        output_registers: impl IntoIterator<Item = RegisterId>,
        number_of_input_registers: usize,
        number_of_output_registers: usize,
        registers_to_keep: impl IntoIterator<Item = RegisterId>,
        registers_to_clear: impl IntoIterator<Item = RegisterId>,
    ) -> Self {
        Self {
            input_registers: Arc::new(input_registers.into_iter().collect()),
            output_registers: Arc::new(output_registers.into_iter().collect()),
            number_of_input_registers,
            number_of_output_registers,
            registers_to_keep: Arc::new(registers_to_keep.into_iter().collect()),
            registers_to_clear: Arc::new(registers_to_clear.into_iter().collect()),
        }
    }

    /// Layout of a stage over `width` registers that reads `inputs`, writes
    /// `outputs` and keeps everything else it saw
    pub fn pipeline(
        width: usize,
        inputs: impl IntoIterator<Item = RegisterId>,
        outputs: impl IntoIterator<Item = RegisterId>,
    ) -> Self {
        let outputs: RegisterSet = outputs.into_iter().collect();
        let keep: RegisterSet = (0..width).filter(|r| !outputs.contains(r)).collect();
        Self::new(inputs, outputs, width, width, keep, [])
    }

    pub fn input_registers(&self) -> &RegisterSet {
        &self.input_registers
    }

    pub fn output_registers(&self) -> &RegisterSet {
        &self.output_registers
    }

    pub fn number_of_input_registers(&self) -> usize {
        self.number_of_input_registers
    }

    pub fn number_of_output_registers(&self) -> usize {
        self.number_of_output_registers
    }

    pub fn registers_to_keep(&self) -> &RegisterSet {
        &self.registers_to_keep
    }

    pub fn registers_to_clear(&self) -> &RegisterSet {
        &self.registers_to_clear
    }

    pub(crate) fn shared_output_registers(&self) -> Arc<RegisterSet> {
        Arc::clone(&self.output_registers)
    }

    pub(crate) fn shared_registers_to_keep(&self) -> Arc<RegisterSet> {
        Arc::clone(&self.registers_to_keep)
    }

    pub(crate) fn shared_registers_to_clear(&self) -> Arc<RegisterSet> {
        Arc::clone(&self.registers_to_clear)
    }
}

impl AsRef<ExecutorInfos> for ExecutorInfos {
    fn as_ref(&self) -> &ExecutorInfos {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_layout() {
        let infos = ExecutorInfos::pipeline(4, [0], [2]);
        assert_eq!(infos.number_of_output_registers(), 4);
        assert!(infos.output_registers().contains(&2));
        assert_eq!(
            infos.registers_to_keep().iter().copied().collect::<Vec<_>>(),
            vec![0, 1, 3]
        );
        assert!(infos.registers_to_clear().is_empty());
    }
}
