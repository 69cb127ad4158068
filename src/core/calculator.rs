//! Dataset calculator
//!
//! Adds a computed column to a dataset. Plain formulas are evaluated row by
//! row; formulas with aggregates are evaluated in two passes: every
//! `FUNC(column)` is computed once over the whole dataset and substituted as
//! a literal, then the remaining expression is evaluated.

use crate::core::formula::{
    evaluate, parse_formula, parse_numeric_value, substitute_aggregates, AggregateCall,
    AggregateFunction, AggregateValues, EvalError, Expr, ParsedFormula, RowContext,
};
use crate::core::resolver::find_matching_column;
use crate::error::CalcResult;
use crate::types::{column_names, CellValue, DataRow};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Options for [`calculate_formula`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculateOptions {
    /// Force the aggregate-first path even without aggregate calls
    pub aggregate_first: bool,
    /// Round results to this many decimal places
    pub round: Option<u32>,
}

/// Result of calculating a formula over a dataset
#[derive(Debug, Clone, PartialEq)]
pub struct Calculation {
    /// Copy of the input rows with the output column added
    pub data: Vec<DataRow>,
    /// Aggregates computed in the first pass (empty for row-wise formulas)
    pub aggregates: AggregateValues,
    /// Rows whose output is null
    pub null_rows: usize,
    /// True when a single dataset-wide value was broadcast to every row
    pub broadcast: bool,
}

/// Compute one aggregate over a column's cells.
///
/// SUM of no numeric values is 0; AVG, MIN and MAX of no numeric values are
/// `None`. COUNT counts non-null cells, numeric or not.
pub fn compute_aggregate<'a>(
    function: AggregateFunction,
    cells: impl IntoIterator<Item = &'a CellValue>,
) -> Option<f64> {
    let cells: Vec<&CellValue> = cells.into_iter().collect();
    let numbers = || cells.iter().filter_map(|c| parse_numeric_value(c));

    match function {
        AggregateFunction::Count => Some(cells.iter().filter(|c| !c.is_null()).count() as f64),
        AggregateFunction::Sum => Some(numbers().sum()),
        AggregateFunction::Avg => {
            let values: Vec<f64> = numbers().collect();
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        }
        AggregateFunction::Min => numbers().reduce(f64::min),
        AggregateFunction::Max => numbers().reduce(f64::max),
    }
}

/// First pass: compute every aggregate call of a formula over `data`
pub fn compute_aggregates(
    parsed: &ParsedFormula,
    data: &[DataRow],
) -> Result<AggregateValues, EvalError> {
    let columns = column_names(data);
    let mut values = AggregateValues::new();

    for call in parsed.aggregate_calls() {
        let value = aggregate_call(call, data, &columns)?;
        debug!(aggregate = %call.alias, ?value, "computed aggregate");
        values.insert(call.alias.clone(), value);
    }

    Ok(values)
}

fn aggregate_call(
    call: &AggregateCall,
    data: &[DataRow],
    columns: &[String],
) -> Result<Option<f64>, EvalError> {
    let actual = find_matching_column(&call.column, columns)
        .ok_or_else(|| EvalError::new(format!("Column '{}' not found", call.column)))?;

    let cells = data.iter().filter_map(|row| row.get(actual));
    Ok(compute_aggregate(call.function, cells))
}

/// Evaluate a formula for a single row.
///
/// `Ok(None)` is a null result (null operand, division by zero). `Err` means
/// the formula cannot be evaluated at all: a syntax error, an unknown
/// column, or aggregate calls without `aggregates` supplied.
pub fn calculate_formula_for_row(
    formula: &str,
    row: &DataRow,
    available_columns: &[String],
    aggregates: Option<&AggregateValues>,
) -> CalcResult<Option<f64>> {
    let parsed = parse_formula(formula)?;
    let ctx = RowContext::new(row, available_columns);

    let value = match aggregates {
        Some(values) => evaluate(&substitute_aggregates(parsed.expr(), values)?, &ctx)?,
        None => evaluate(parsed.expr(), &ctx)?,
    };
    Ok(value)
}

/// Calculate `formula` over `data`, storing results in `output_column`.
///
/// The input is left untouched and the output always has exactly as many
/// rows as the input. Rows that fail to evaluate get a null output.
pub fn calculate_formula(
    data: &[DataRow],
    formula: &str,
    output_column: &str,
    options: &CalculateOptions,
) -> CalcResult<Calculation> {
    let parsed = parse_formula(formula)?;
    let columns = column_names(data);
    let aggregate_mode = options.aggregate_first || parsed.has_aggregations();

    let mut aggregates = AggregateValues::new();
    let expr: Expr = if aggregate_mode {
        match compute_aggregates(&parsed, data) {
            Ok(values) => {
                aggregates = values;
                substitute_aggregates(parsed.expr(), &aggregates)?
            }
            Err(e) => {
                warn!(formula, error = %e, "aggregate pass failed; output column is null");
                Expr::Null
            }
        }
    } else {
        parsed.expr().clone()
    };

    // Aggregate-only formulas produce one dataset-wide value
    let broadcast = aggregate_mode && parsed.row_column_references().is_empty();

    let results: Vec<Option<f64>> = if broadcast {
        let empty = DataRow::new();
        let value = evaluate_logged(&expr, &RowContext::new(&empty, &columns), 0);
        vec![value; data.len()]
    } else {
        data.iter()
            .enumerate()
            .map(|(i, row)| evaluate_logged(&expr, &RowContext::new(row, &columns), i))
            .collect()
    };

    let mut null_rows = 0;
    let rows: Vec<DataRow> = data
        .iter()
        .zip(results)
        .map(|(row, value)| {
            let value = finalize(value, options.round);
            if value.is_none() {
                null_rows += 1;
            }
            let mut out = row.clone();
            out.insert(output_column.to_string(), CellValue::from(value));
            out
        })
        .collect();

    debug!(
        formula,
        output_column,
        rows = rows.len(),
        null_rows,
        broadcast,
        "formula calculated"
    );

    Ok(Calculation {
        data: rows,
        aggregates,
        null_rows,
        broadcast,
    })
}

/// Evaluate one row, turning structural failures into a null
fn evaluate_logged(expr: &Expr, ctx: &RowContext<'_>, row_index: usize) -> Option<f64> {
    match evaluate(expr, ctx) {
        Ok(value) => value,
        Err(e) => {
            debug!(row = row_index, error = %e, "row evaluation failed");
            None
        }
    }
}

/// Apply rounding, then drop non-finite values
fn finalize(value: Option<f64>, round: Option<u32>) -> Option<f64> {
    let value = match round {
        Some(places) => value.map(|v| round_to(v, places)),
        None => value,
    };
    value.filter(|v| v.is_finite())
}

/// Round to a number of decimal places.
///
/// Values too large to scale have no fractional part left and come back as is.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places.min(15) as i32);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::data_row;

    fn sales() -> Vec<DataRow> {
        vec![
            data_row([("Revenue", 1000.0), ("Orders", 10.0)]),
            data_row([("Revenue", 1500.0), ("Orders", 15.0)]),
            data_row([("Revenue", 2000.0), ("Orders", 20.0)]),
        ]
    }

    fn output(calc: &Calculation, column: &str) -> Vec<CellValue> {
        calc.data.iter().map(|r| r[column].clone()).collect()
    }

    #[test]
    fn test_compute_aggregate_functions() {
        let cells = vec![
            CellValue::Number(4.0),
            CellValue::Text("$6".to_string()),
            CellValue::Null,
            CellValue::Text("n/a".to_string()),
        ];
        assert_eq!(compute_aggregate(AggregateFunction::Sum, &cells), Some(10.0));
        assert_eq!(compute_aggregate(AggregateFunction::Avg, &cells), Some(5.0));
        assert_eq!(compute_aggregate(AggregateFunction::Count, &cells), Some(3.0));
        assert_eq!(compute_aggregate(AggregateFunction::Min, &cells), Some(4.0));
        assert_eq!(compute_aggregate(AggregateFunction::Max, &cells), Some(6.0));
    }

    #[test]
    fn test_compute_aggregate_without_numbers() {
        let cells = vec![CellValue::Null, CellValue::Text("x".to_string())];
        assert_eq!(compute_aggregate(AggregateFunction::Sum, &cells), Some(0.0));
        assert_eq!(compute_aggregate(AggregateFunction::Avg, &cells), None);
        assert_eq!(compute_aggregate(AggregateFunction::Min, &cells), None);
        assert_eq!(compute_aggregate(AggregateFunction::Max, &cells), None);
        assert_eq!(compute_aggregate(AggregateFunction::Count, &cells), Some(1.0));
    }

    #[test]
    fn test_row_wise_calculation() {
        let calc =
            calculate_formula(&sales(), "Revenue / Orders", "AOV", &CalculateOptions::default())
                .unwrap();
        assert_eq!(
            output(&calc, "AOV"),
            vec![CellValue::Number(100.0); 3]
        );
        assert!(!calc.broadcast);
        assert!(calc.aggregates.is_empty());
        assert_eq!(calc.null_rows, 0);
    }

    #[test]
    fn test_aggregate_first_broadcasts_single_value() {
        let options = CalculateOptions {
            aggregate_first: true,
            round: None,
        };
        let calc =
            calculate_formula(&sales(), "SUM(Revenue)/SUM(Orders)", "AOV", &options).unwrap();
        assert!(calc.broadcast);
        assert_eq!(output(&calc, "AOV"), vec![CellValue::Number(100.0); 3]);
        assert_eq!(calc.aggregates["SUM(Revenue)"], Some(4500.0));
        assert_eq!(calc.aggregates["SUM(Orders)"], Some(45.0));
    }

    #[test]
    fn test_aggregates_detected_without_flag() {
        let calc =
            calculate_formula(&sales(), "AVG(Revenue)", "avg", &CalculateOptions::default())
                .unwrap();
        assert_eq!(output(&calc, "avg"), vec![CellValue::Number(1500.0); 3]);
    }

    #[test]
    fn test_mixed_aggregate_and_row_reference() {
        let options = CalculateOptions {
            aggregate_first: false,
            round: Some(4),
        };
        let calc =
            calculate_formula(&sales(), "Revenue / SUM(Revenue)", "share", &options).unwrap();
        assert!(!calc.broadcast);
        assert_eq!(
            output(&calc, "share"),
            vec![
                CellValue::Number(0.2222),
                CellValue::Number(0.3333),
                CellValue::Number(0.4444),
            ]
        );
    }

    #[test]
    fn test_failed_rows_become_null_and_count_is_preserved() {
        let data = vec![
            data_row([("Revenue", 100.0), ("Orders", 0.0)]),
            data_row([
                ("Revenue", CellValue::Null),
                ("Orders", CellValue::Number(2.0)),
            ]),
            data_row([("Revenue", 50.0), ("Orders", 5.0)]),
        ];
        let calc =
            calculate_formula(&data, "Revenue / Orders", "aov", &CalculateOptions::default())
                .unwrap();
        assert_eq!(calc.data.len(), 3);
        assert_eq!(
            output(&calc, "aov"),
            vec![CellValue::Null, CellValue::Null, CellValue::Number(10.0)]
        );
        assert_eq!(calc.null_rows, 2);
    }

    #[test]
    fn test_unknown_column_yields_null_rows() {
        let calc =
            calculate_formula(&sales(), "Profit * 2", "x", &CalculateOptions::default()).unwrap();
        assert_eq!(calc.data.len(), 3);
        assert_eq!(calc.null_rows, 3);
    }

    #[test]
    fn test_unknown_aggregate_column_yields_null_rows() {
        let calc =
            calculate_formula(&sales(), "SUM(Profit)", "x", &CalculateOptions::default()).unwrap();
        assert_eq!(output(&calc, "x"), vec![CellValue::Null; 3]);
    }

    #[test]
    fn test_syntax_error_is_err() {
        let result = calculate_formula(&sales(), "(Revenue", "x", &CalculateOptions::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_input_is_not_mutated() {
        let data = sales();
        let before = data.clone();
        let _ = calculate_formula(&data, "Revenue * 2", "double", &CalculateOptions::default())
            .unwrap();
        assert_eq!(data, before);
        assert!(!data[0].contains_key("double"));
    }

    #[test]
    fn test_rounding() {
        let data = vec![data_row([("a", 10.0), ("b", 3.0)])];
        let options = CalculateOptions {
            aggregate_first: false,
            round: Some(2),
        };
        let calc = calculate_formula(&data, "a / b", "r", &options).unwrap();
        assert_eq!(calc.data[0]["r"], CellValue::Number(3.33));
    }

    #[test]
    fn test_empty_dataset() {
        let calc =
            calculate_formula(&[], "SUM(Revenue)", "x", &CalculateOptions::default()).unwrap();
        assert!(calc.data.is_empty());
    }

    #[test]
    fn test_calculate_formula_for_row() {
        let row = data_row([("Revenue", 1000.0), ("Cost", 600.0)]);
        let columns = vec!["Revenue".to_string(), "Cost".to_string()];
        let value =
            calculate_formula_for_row("(Revenue - Cost) / Revenue * 100", &row, &columns, None)
                .unwrap();
        assert_eq!(value, Some(40.0));
    }

    #[test]
    fn test_calculate_formula_for_row_requires_aggregates() {
        let row = data_row([("Revenue", 1000.0)]);
        let columns = vec!["Revenue".to_string()];
        assert!(calculate_formula_for_row("SUM(Revenue)", &row, &columns, None).is_err());

        let mut values = AggregateValues::new();
        values.insert("SUM(Revenue)".to_string(), Some(4000.0));
        let value =
            calculate_formula_for_row("Revenue / SUM(Revenue)", &row, &columns, Some(&values))
                .unwrap();
        assert_eq!(value, Some(0.25));
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(2.345, 0), 2.0);
        assert_eq!(round_to(1.005, 1), 1.0);
        assert_eq!(round_to(-1.25, 1), -1.3);
        assert_eq!(round_to(1e300, 15), 1e300);
        assert!(round_to(f64::INFINITY, 2).is_infinite());
    }

    #[test]
    fn test_rounding_large_value_stays_finite() {
        let data = vec![data_row([("a", 1e300)]), data_row([("a", 2.5)])];
        let options = CalculateOptions {
            aggregate_first: false,
            round: Some(15),
        };
        let calc = calculate_formula(&data, "a", "r", &options).unwrap();
        assert_eq!(calc.data[0]["r"], CellValue::Number(1e300));
        assert_eq!(calc.data[1]["r"], CellValue::Number(2.5));
        assert_eq!(calc.null_rows, 0);
    }

    #[test]
    fn test_rounding_overflowed_result_is_null() {
        let data = vec![data_row([("a", 1e300)])];
        let options = CalculateOptions {
            aggregate_first: false,
            round: Some(2),
        };
        let calc = calculate_formula(&data, "a * a", "r", &options).unwrap();
        assert_eq!(calc.data[0]["r"], CellValue::Null);
        assert_eq!(calc.null_rows, 1);
    }
}
