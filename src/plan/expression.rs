//! Expression compilation and evaluation
//!
//! Variables are resolved to registers once, at plan build time. Evaluation
//! never fails on type mismatches: arithmetic on non-numbers and division by
//! zero yield null.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Number, Value};

use super::ast::Expr;
use crate::block::RegisterId;
use crate::errors::{ExecResult, ExecutionError};
use crate::executor::Expression;
use crate::row::InputRow;
use crate::value::{compare_values, to_boolean};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Comparison::Eq => ordering == Ordering::Equal,
            Comparison::Ne => ordering != Ordering::Equal,
            Comparison::Lt => ordering == Ordering::Less,
            Comparison::Le => ordering != Ordering::Greater,
            Comparison::Gt => ordering == Ordering::Greater,
            Comparison::Ge => ordering != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arithmetic {
    Add,
    Sub,
    Mul,
    Div,
}

/// Expression with variables bound to registers
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledExpr {
    Const(Value),
    Register(RegisterId),
    Attribute(Box<CompiledExpr>, String),
    Compare(Comparison, Box<CompiledExpr>, Box<CompiledExpr>),
    Arithmetic(Arithmetic, Box<CompiledExpr>, Box<CompiledExpr>),
    And(Box<CompiledExpr>, Box<CompiledExpr>),
    Or(Box<CompiledExpr>, Box<CompiledExpr>),
    Not(Box<CompiledExpr>),
}

impl CompiledExpr {
    /// Resolve every variable of `expr` through `registers`
    pub fn compile(expr: &Expr, registers: &HashMap<String, RegisterId>) -> ExecResult<Self> {
        let binary = |a: &Expr, b: &Expr| -> ExecResult<(Box<Self>, Box<Self>)> {
            Ok((
                Box::new(Self::compile(a, registers)?),
                Box::new(Self::compile(b, registers)?),
            ))
        };
        let compare = |op, a: &Expr, b: &Expr| -> ExecResult<Self> {
            let (a, b) = binary(a, b)?;
            Ok(Self::Compare(op, a, b))
        };
        let arith = |op, a: &Expr, b: &Expr| -> ExecResult<Self> {
            let (a, b) = binary(a, b)?;
            Ok(Self::Arithmetic(op, a, b))
        };

        match expr {
            Expr::Const(v) => Ok(Self::Const(v.clone())),
            Expr::Var(name) => registers.get(name).map(|&r| Self::Register(r)).ok_or_else(|| {
                ExecutionError::config_invalid(format!("unknown variable '{}'", name))
            }),
            Expr::Attribute(of, name) => Ok(Self::Attribute(
                Box::new(Self::compile(of, registers)?),
                name.clone(),
            )),
            Expr::Eq(a, b) => compare(Comparison::Eq, a, b),
            Expr::Ne(a, b) => compare(Comparison::Ne, a, b),
            Expr::Lt(a, b) => compare(Comparison::Lt, a, b),
            Expr::Le(a, b) => compare(Comparison::Le, a, b),
            Expr::Gt(a, b) => compare(Comparison::Gt, a, b),
            Expr::Ge(a, b) => compare(Comparison::Ge, a, b),
            Expr::Add(a, b) => arith(Arithmetic::Add, a, b),
            Expr::Sub(a, b) => arith(Arithmetic::Sub, a, b),
            Expr::Mul(a, b) => arith(Arithmetic::Mul, a, b),
            Expr::Div(a, b) => arith(Arithmetic::Div, a, b),
            Expr::And(a, b) => {
                let (a, b) = binary(a, b)?;
                Ok(Self::And(a, b))
            }
            Expr::Or(a, b) => {
                let (a, b) = binary(a, b)?;
                Ok(Self::Or(a, b))
            }
            Expr::Not(a) => Ok(Self::Not(Box::new(Self::compile(a, registers)?))),
        }
    }

    /// Evaluate against one row; an empty register reads as null
    pub fn eval(&self, row: &InputRow) -> Value {
        match self {
            Self::Const(v) => v.clone(),
            Self::Register(reg) => row.value(*reg).unwrap_or(Value::Null),
            Self::Attribute(of, name) => match of.eval(row) {
                Value::Object(mut map) => map.remove(name).unwrap_or(Value::Null),
                _ => Value::Null,
            },
            Self::Compare(op, a, b) => {
                Value::Bool(op.holds(compare_values(&a.eval(row), &b.eval(row))))
            }
            Self::Arithmetic(op, a, b) => arithmetic(*op, &a.eval(row), &b.eval(row)),
            Self::And(a, b) => Value::Bool(to_boolean(&a.eval(row)) && to_boolean(&b.eval(row))),
            Self::Or(a, b) => Value::Bool(to_boolean(&a.eval(row)) || to_boolean(&b.eval(row))),
            Self::Not(a) => Value::Bool(!to_boolean(&a.eval(row))),
        }
    }

    /// Wrap into the closure form a calculation stage runs
    pub fn into_expression(self) -> Expression {
        Arc::new(move |row: &InputRow| -> ExecResult<Value> { Ok(self.eval(row)) })
    }
}

fn arithmetic(op: Arithmetic, a: &Value, b: &Value) -> Value {
    let (Value::Number(a), Value::Number(b)) = (a, b) else {
        return Value::Null;
    };

    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        let exact = match op {
            Arithmetic::Add => x.checked_add(y),
            Arithmetic::Sub => x.checked_sub(y),
            Arithmetic::Mul => x.checked_mul(y),
            Arithmetic::Div if y != 0 && x.checked_rem(y) == Some(0) => x.checked_div(y),
            Arithmetic::Div => None,
        };
        if let Some(v) = exact {
            return Value::from(v);
        }
    }

    let (x, y) = match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => (x, y),
        _ => return Value::Null,
    };
    let result = match op {
        Arithmetic::Add => x + y,
        Arithmetic::Sub => x - y,
        Arithmetic::Mul => x * y,
        Arithmetic::Div if y == 0.0 => return Value::Null,
        Arithmetic::Div => x / y,
    };
    Number::from_f64(result).map_or(Value::Null, Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockPool, SharedBlock};
    use serde_json::json;

    fn row(values: Vec<Value>) -> InputRow {
        let pool = BlockPool::default();
        let width = values.len();
        let cells: Vec<Option<Value>> = values.into_iter().map(Some).collect();
        let block = pool.block_from_rows(&[cells], width).unwrap();
        InputRow::new(SharedBlock::new(block), 0)
    }

    fn registers() -> HashMap<String, RegisterId> {
        HashMap::from([("doc".to_string(), 0), ("n".to_string(), 1)])
    }

    fn eval(expr: Value, input: &InputRow) -> Value {
        let expr: Expr = serde_json::from_value(expr).unwrap();
        CompiledExpr::compile(&expr, &registers()).unwrap().eval(input)
    }

    #[test]
    fn test_attribute_and_comparison() {
        let input = row(vec![json!({"age": 30}), json!(5)]);
        assert_eq!(
            eval(json!({"ge": [{"attribute": [{"var": "doc"}, "age"]}, {"const": 18}]}), &input),
            json!(true)
        );
        assert_eq!(eval(json!({"attribute": [{"var": "n"}, "age"]}), &input), Value::Null);
        assert_eq!(eval(json!({"lt": [{"const": null}, {"const": false}]}), &input), json!(true));
    }

    #[test]
    fn test_arithmetic() {
        let input = row(vec![json!(null), json!(7)]);
        assert_eq!(eval(json!({"add": [{"var": "n"}, {"const": 3}]}), &input), json!(10));
        assert_eq!(eval(json!({"div": [{"var": "n"}, {"const": 2}]}), &input), json!(3.5));
        assert_eq!(eval(json!({"div": [{"var": "n"}, {"const": 0}]}), &input), Value::Null);
        assert_eq!(eval(json!({"mul": [{"var": "n"}, {"const": "x"}]}), &input), Value::Null);
        assert_eq!(
            eval(json!({"add": [{"const": i64::MAX}, {"const": 1}]}), &input),
            json!(i64::MAX as f64 + 1.0)
        );
    }

    #[test]
    fn test_logic() {
        let input = row(vec![json!(""), json!(1)]);
        assert_eq!(eval(json!({"and": [{"var": "n"}, {"var": "doc"}]}), &input), json!(false));
        assert_eq!(eval(json!({"or": [{"var": "n"}, {"var": "doc"}]}), &input), json!(true));
        assert_eq!(eval(json!({"not": {"var": "doc"}}), &input), json!(true));
    }

    #[test]
    fn test_unknown_variable() {
        let expr = Expr::Var("missing".to_string());
        let err = CompiledExpr::compile(&expr, &registers()).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
