//! Plan to execution tree
//!
//! Every variable gets its own register, in order of introduction, and all
//! stages share the same register width. The tree always starts with a
//! singleton (identity over a constant fetcher) feeding a scan of the
//! source values.

use std::collections::HashMap;

use super::ast::{Plan, Stage};
use super::expression::CompiledExpr;
use crate::block::RegisterId;
use crate::engine::{ExecutionTree, QueryContext};
use crate::errors::{ExecResult, ExecutionError};
use crate::executor::{
    CalculationExecutor, CalculationInfos, EnumerateListExecutor, EnumerateListInfos,
    ExecutorInfos, FilterExecutor, FilterInfos, IdExecutor, LimitExecutor, LimitInfos,
    ScanExecutor, ScanInfos, SortExecutor, SortInfos, SortRegister, ValuesSource,
};
use crate::fetcher::ConstFetcher;
use crate::stats::NodeId;

/// Node id of the singleton that starts every plan
pub const SINGLETON_NODE: NodeId = 1;
/// Node id of the source scan
pub const SCAN_NODE: NodeId = 2;

/// A tree ready to be drained plus the register holding the result
pub struct BuiltPlan {
    pub tree: ExecutionTree,
    pub return_register: RegisterId,
    /// Variable name for every register
    pub variables: Vec<String>,
}

#[derive(Default)]
struct Registers {
    by_name: HashMap<String, RegisterId>,
    names: Vec<String>,
}

impl Registers {
    fn introduce(&mut self, name: &str) -> ExecResult<RegisterId> {
        if self.by_name.contains_key(name) {
            return Err(ExecutionError::config_invalid(format!(
                "variable '{}' assigned twice",
                name
            )));
        }
        let reg = self.names.len();
        self.by_name.insert(name.to_string(), reg);
        self.names.push(name.to_string());
        Ok(reg)
    }

    fn lookup(&self, name: &str) -> ExecResult<RegisterId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| ExecutionError::config_invalid(format!("unknown variable '{}'", name)))
    }
}

/// Register layout of a plan, checked before any stage is built
fn assign_registers(plan: &Plan) -> ExecResult<Registers> {
    let mut registers = Registers::default();
    registers.introduce(&plan.source.var)?;
    for stage in &plan.stages {
        match stage {
            Stage::Calculation { out, .. } | Stage::Enumerate { out, .. } => {
                registers.introduce(out)?;
            }
            Stage::Filter { .. } | Stage::Limit { .. } | Stage::Sort(_) => {}
        }
    }
    Ok(registers)
}

/// Build the execution tree for `plan`
pub fn build(plan: &Plan, context: QueryContext) -> ExecResult<BuiltPlan> {
    let registers = assign_registers(plan)?;
    let width = registers.names.len();
    let mut tree = ExecutionTree::new(context);

    tree.add::<IdExecutor<ConstFetcher>>(
        SINGLETON_NODE,
        ExecutorInfos::pipeline(width, [], []),
        &[],
    )?;

    let source_reg = registers.lookup(&plan.source.var)?;
    tree.add::<ScanExecutor>(
        SCAN_NODE,
        ScanInfos::new(
            ExecutorInfos::pipeline(width, [], [source_reg]),
            source_reg,
            ValuesSource::factory(plan.source.values.clone()),
        ),
        &[SINGLETON_NODE],
    )?;

    let mut previous = SCAN_NODE;
    // Variables become visible in plan order
    let mut visible: HashMap<String, RegisterId> = HashMap::new();
    visible.insert(plan.source.var.clone(), source_reg);

    for (index, stage) in plan.stages.iter().enumerate() {
        let id = SCAN_NODE + 1 + index as NodeId;
        let lookup = |name: &str| {
            visible.get(name).copied().ok_or_else(|| {
                ExecutionError::config_invalid(format!(
                    "{} stage {} uses unknown variable '{}'",
                    stage.name(),
                    index,
                    name
                ))
            })
        };

        match stage {
            Stage::Calculation { out, expr } => {
                let out_reg = registers.lookup(out)?;
                let compiled = CompiledExpr::compile(expr, &visible)?;
                let inputs: Vec<RegisterId> = visible.values().copied().collect();
                tree.add::<CalculationExecutor>(
                    id,
                    CalculationInfos::new(
                        ExecutorInfos::pipeline(width, inputs, [out_reg]),
                        out_reg,
                        compiled.into_expression(),
                    ),
                    &[previous],
                )?;
                visible.insert(out.clone(), out_reg);
            }
            Stage::Filter { var } => {
                let reg = lookup(var)?;
                tree.add::<FilterExecutor>(
                    id,
                    FilterInfos::new(ExecutorInfos::pipeline(width, [reg], []), reg),
                    &[previous],
                )?;
            }
            Stage::Limit {
                offset,
                limit,
                full_count,
            } => {
                tree.add::<LimitExecutor>(
                    id,
                    LimitInfos::new(
                        ExecutorInfos::pipeline(width, [], []),
                        *offset,
                        *limit,
                        *full_count,
                    ),
                    &[previous],
                )?;
            }
            Stage::Sort(keys) => {
                if keys.is_empty() {
                    return Err(ExecutionError::config_invalid(format!(
                        "sort stage {} has no keys",
                        index
                    )));
                }
                let sort_registers = keys
                    .iter()
                    .map(|key| -> ExecResult<SortRegister> {
                        let reg = lookup(&key.var)?;
                        Ok(if key.descending {
                            SortRegister::desc(reg)
                        } else {
                            SortRegister::asc(reg)
                        })
                    })
                    .collect::<ExecResult<Vec<_>>>()?;
                let inputs: Vec<RegisterId> = sort_registers.iter().map(|s| s.register).collect();
                tree.add::<SortExecutor>(
                    id,
                    SortInfos::new(ExecutorInfos::pipeline(width, inputs, []), sort_registers),
                    &[previous],
                )?;
            }
            Stage::Enumerate { var, out } => {
                let in_reg = lookup(var)?;
                let out_reg = registers.lookup(out)?;
                tree.add::<EnumerateListExecutor>(
                    id,
                    EnumerateListInfos::new(
                        ExecutorInfos::pipeline(width, [in_reg], [out_reg]),
                        in_reg,
                        out_reg,
                    ),
                    &[previous],
                )?;
                visible.insert(out.clone(), out_reg);
            }
        }
        previous = id;
    }

    let return_register = visible.get(&plan.return_var).copied().ok_or_else(|| {
        ExecutionError::config_invalid(format!(
            "return variable '{}' is not defined",
            plan.return_var
        ))
    })?;

    Ok(BuiltPlan {
        tree,
        return_register,
        variables: registers.names,
    })
}
