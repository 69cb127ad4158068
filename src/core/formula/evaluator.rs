//! Formula evaluator
//!
//! Evaluates an expression tree against one dataset row. Numeric anomalies
//! are values, not errors: a null or non-numeric operand, or a zero divisor,
//! makes the result `None`. Only structural problems (a column that does not
//! exist, an aggregate that was never computed) are `EvalError`s.

use super::numeric::parse_numeric_value;
use super::parser::{BinaryOp, Expr, UnaryOp};
use crate::core::resolver::find_matching_column;
use crate::types::DataRow;
use std::collections::HashMap;

/// Precomputed aggregate results keyed by call alias (e.g. `"SUM(Revenue)"`).
/// A `None` entry is an aggregate over a column with no numeric values.
pub type AggregateValues = HashMap<String, Option<f64>>;

/// Evaluation context for a single row
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    /// The row being evaluated
    pub row: &'a DataRow,
    /// Dataset column names that formula references resolve against
    pub columns: &'a [String],
}

impl<'a> RowContext<'a> {
    pub fn new(row: &'a DataRow, columns: &'a [String]) -> Self {
        Self { row, columns }
    }
}

/// Error during evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    pub message: String,
}

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for EvalError {}

/// Evaluate an expression for one row
pub fn evaluate(expr: &Expr, ctx: &RowContext<'_>) -> Result<Option<f64>, EvalError> {
    match expr {
        Expr::Number(n) => Ok(Some(*n)),

        Expr::Null => Ok(None),

        Expr::Column(name) => {
            let actual = find_matching_column(name, ctx.columns)
                .ok_or_else(|| EvalError::new(format!("Column '{}' not found", name)))?;
            Ok(ctx.row.get(actual).and_then(parse_numeric_value))
        }

        Expr::Aggregate(call) => Err(EvalError::new(format!(
            "Aggregate {} must be computed over the whole dataset before row evaluation",
            call.alias
        ))),

        Expr::Unary { op, operand } => {
            let value = evaluate(operand, ctx)?;
            Ok(match op {
                UnaryOp::Neg => value.map(|v| -v),
                UnaryOp::Plus => value,
            })
        }

        Expr::Binary { op, left, right } => {
            // Evaluate both sides so structural errors surface even when
            // one side is already null
            let l = evaluate(left, ctx)?;
            let r = evaluate(right, ctx)?;
            Ok(match (l, r) {
                (Some(l), Some(r)) => apply_binary(*op, l, r),
                _ => None,
            })
        }
    }
}

/// Apply an arithmetic operator; a zero divisor gives `None`
fn apply_binary(op: BinaryOp, l: f64, r: f64) -> Option<f64> {
    match op {
        BinaryOp::Add => Some(l + r),
        BinaryOp::Sub => Some(l - r),
        BinaryOp::Mul => Some(l * r),
        BinaryOp::Div | BinaryOp::Mod if r == 0.0 => None,
        BinaryOp::Div => Some(l / r),
        BinaryOp::Mod => Some(l % r),
    }
}

/// Replace every aggregate call with its precomputed value.
///
/// This is the first of the two evaluation passes; the result contains no
/// `Expr::Aggregate` nodes and can be evaluated row by row.
pub fn substitute_aggregates(expr: &Expr, values: &AggregateValues) -> Result<Expr, EvalError> {
    Ok(match expr {
        Expr::Aggregate(call) => match values.get(&call.alias) {
            Some(Some(v)) => Expr::Number(*v),
            Some(None) => Expr::Null,
            None => {
                return Err(EvalError::new(format!(
                    "Aggregate {} has not been computed",
                    call.alias
                )));
            }
        },
        Expr::Unary { op, operand } => Expr::Unary {
            op: *op,
            operand: Box::new(substitute_aggregates(operand, values)?),
        },
        Expr::Binary { op, left, right } => Expr::Binary {
            op: *op,
            left: Box::new(substitute_aggregates(left, values)?),
            right: Box::new(substitute_aggregates(right, values)?),
        },
        Expr::Number(_) | Expr::Null | Expr::Column(_) => expr.clone(),
    })
}
