//! Dataset-aware formula validation
//!
//! Goes beyond syntax: checks that referenced columns exist and hold
//! numbers, that divisors are not zero, that the formula is not absurdly
//! complex, and that it actually evaluates on a few sample rows. Every
//! check appends to `errors` (blocking) or `warnings` (advisory) so a single
//! call reports all problems at once.

use crate::core::calculator::{compute_aggregate, compute_aggregates};
use crate::core::formula::numeric::is_zero_or_empty;
use crate::core::formula::{
    evaluate, parse_formula, parse_numeric_value, substitute_aggregates, AggregateFunction,
    EvalError, Expr, ParsedFormula, RowContext, Token, TokenKind,
};
use crate::core::resolver::find_matching_column;
use crate::types::{column_names, DataRow};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Rows sampled when checking that a column is numeric
const TYPE_SAMPLE_ROWS: usize = 100;
/// Rows sampled when checking divisors for zeros
const ZERO_SAMPLE_ROWS: usize = 1000;
/// Rows test-evaluated for row-wise formulas
const TEST_EVAL_ROWS: usize = 5;
/// Results above this magnitude are flagged
const LARGE_RESULT: f64 = 1e15;
const COMPLEXITY_WARNING_RATIO: f64 = 0.7;

/// Options for [`validate_formula_comprehensive`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    /// Treat a NaN/Infinity test result as an error rather than a warning
    pub require_numeric_result: bool,
    /// Check divisor columns for zero values
    pub check_division_by_zero: bool,
    /// Complexity score above which a formula is rejected
    pub max_complexity: u32,
    /// Parenthesis nesting above which a warning is issued
    pub max_nesting_depth: usize,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            require_numeric_result: true,
            check_division_by_zero: true,
            max_complexity: 50,
            max_nesting_depth: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationMetadata {
    pub used_columns: Vec<String>,
    pub has_aggregations: bool,
    pub aggregation_functions: Vec<String>,
    pub complexity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Present whenever the formula parsed
    pub metadata: Option<ValidationMetadata>,
}

impl ValidationResult {
    fn syntax_error(message: String) -> Self {
        Self {
            valid: false,
            errors: vec![message],
            warnings: Vec::new(),
            metadata: None,
        }
    }
}

/// Syntax-only check, cheap enough to run on every keystroke
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuickValidation {
    pub valid: bool,
    pub error: Option<String>,
}

pub fn quick_validate_formula(formula: &str) -> QuickValidation {
    match parse_formula(formula) {
        Ok(_) => QuickValidation {
            valid: true,
            error: None,
        },
        Err(e) => QuickValidation {
            valid: false,
            error: Some(e.message),
        },
    }
}

/// Weighted token count: number 0.1, column 0.5, operator 1, function 2,
/// paren 0.2, rounded to the nearest integer.
pub fn complexity_score(tokens: &[Token]) -> u32 {
    // Tenths, so the sum is exact
    let tenths: u32 = tokens
        .iter()
        .map(|t| match t.kind {
            TokenKind::Number => 1,
            TokenKind::Column => 5,
            TokenKind::Operator => 10,
            TokenKind::Function => 20,
            TokenKind::Paren => 2,
        })
        .sum();
    (tenths + 5) / 10
}

/// Validate a formula against a dataset.
///
/// Never panics and never returns `Err`: every problem, including failures
/// while test-evaluating, is reported in the result.
pub fn validate_formula_comprehensive(
    formula: &str,
    data: &[DataRow],
    options: &ValidationOptions,
) -> ValidationResult {
    let parsed = match parse_formula(formula) {
        Ok(parsed) => parsed,
        Err(e) => return ValidationResult::syntax_error(e.message),
    };

    let result = FormulaValidator::new(&parsed, data, options).validate();
    debug!(
        formula,
        valid = result.valid,
        errors = result.errors.len(),
        warnings = result.warnings.len(),
        "formula validated"
    );
    result
}

/// Chart families with formula-specific advice
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartType {
    Bar,
    Line,
    Area,
    Scatter,
    Pie,
    Donut,
    Scorecard,
    Table,
    Other(String),
}

impl ChartType {
    /// Parse a chart type name as the chart configuration names it
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "bar" | "column" | "horizontal_bar" => ChartType::Bar,
            "line" => ChartType::Line,
            "area" => ChartType::Area,
            "scatter" => ChartType::Scatter,
            "pie" => ChartType::Pie,
            "donut" | "doughnut" => ChartType::Donut,
            "scorecard" | "kpi" | "metric" => ChartType::Scorecard,
            "table" => ChartType::Table,
            other => ChartType::Other(other.to_string()),
        }
    }

    fn display(&self) -> &str {
        match self {
            ChartType::Bar => "bar",
            ChartType::Line => "line",
            ChartType::Area => "area",
            ChartType::Scatter => "scatter",
            ChartType::Pie => "pie",
            ChartType::Donut => "donut",
            ChartType::Scorecard => "scorecard",
            ChartType::Table => "table",
            ChartType::Other(name) => name,
        }
    }
}

/// Comprehensive validation plus advice specific to the target chart
pub fn validate_formula_for_chart_type(
    formula: &str,
    data: &[DataRow],
    chart_type: &str,
    options: &ValidationOptions,
) -> ValidationResult {
    let parsed = match parse_formula(formula) {
        Ok(parsed) => parsed,
        Err(e) => return ValidationResult::syntax_error(e.message),
    };

    let validator = FormulaValidator::new(&parsed, data, options);
    let chart = ChartType::parse(chart_type);
    let advice = validator.chart_advice(&chart);
    let mut result = validator.validate();
    result.warnings.extend(advice);
    result
}

/// One validation pass over a parsed formula and a dataset
struct FormulaValidator<'a> {
    parsed: &'a ParsedFormula,
    data: &'a [DataRow],
    columns: Vec<String>,
    options: &'a ValidationOptions,
}

impl<'a> FormulaValidator<'a> {
    fn new(parsed: &'a ParsedFormula, data: &'a [DataRow], options: &'a ValidationOptions) -> Self {
        Self {
            parsed,
            data,
            columns: column_names(data),
            options,
        }
    }

    fn validate(&self) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let complexity = complexity_score(self.parsed.tokens());
        let metadata = ValidationMetadata {
            used_columns: self
                .parsed
                .column_references()
                .into_iter()
                .map(String::from)
                .collect(),
            has_aggregations: self.parsed.has_aggregations(),
            aggregation_functions: self
                .parsed
                .aggregation_functions()
                .into_iter()
                .map(String::from)
                .collect(),
            complexity,
        };

        if self.data.is_empty() {
            errors.push("No data available for validation".to_string());
        } else {
            let resolved = self.resolve_columns(&mut errors);
            let all_resolved = resolved.len() == self.parsed.column_references().len();

            self.check_numeric_columns(&resolved, &mut errors, &mut warnings);
            if self.options.check_division_by_zero && self.parsed.has_division() {
                self.check_division_by_zero(&resolved, &mut errors, &mut warnings);
            }
            // Evaluation cannot succeed with missing columns; those are
            // already reported
            if all_resolved {
                self.test_evaluate(&mut errors, &mut warnings);
            }
        }

        self.check_complexity(complexity, &mut errors, &mut warnings);

        ValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
            metadata: Some(metadata),
        }
    }

    /// Map each formula column reference to its dataset column
    fn resolve_columns(&self, errors: &mut Vec<String>) -> IndexMap<&'a str, &str> {
        let mut resolved = IndexMap::new();
        for reference in self.parsed.column_references() {
            match find_matching_column(reference, &self.columns) {
                Some(actual) => {
                    resolved.insert(reference, actual);
                }
                None => errors.push(format!(
                    "Column '{}' not found in data. Available columns: {}",
                    reference,
                    self.columns.join(", ")
                )),
            }
        }
        resolved
    }

    /// Columns read as numbers: everything except pure COUNT arguments
    fn numeric_references(&self) -> Vec<&'a str> {
        let mut refs = self.parsed.row_column_references();
        for call in self.parsed.aggregate_calls() {
            if call.function != AggregateFunction::Count && !refs.contains(&call.column.as_str())
            {
                refs.push(&call.column);
            }
        }
        refs
    }

    fn check_numeric_columns(
        &self,
        resolved: &IndexMap<&'a str, &str>,
        errors: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) {
        let mut checked: Vec<&str> = Vec::new();
        for reference in self.numeric_references() {
            let Some(&actual) = resolved.get(reference) else {
                continue;
            };
            if checked.contains(&actual) {
                continue;
            }
            checked.push(actual);

            let sample: Vec<_> = self
                .data
                .iter()
                .take(TYPE_SAMPLE_ROWS)
                .map(|row| row.get(actual))
                .collect();
            let numeric = sample
                .iter()
                .filter(|cell| cell.and_then(parse_numeric_value).is_some())
                .count();

            if numeric == 0 {
                errors.push(format!(
                    "Column '{}' does not contain numeric values",
                    actual
                ));
            } else if numeric * 2 < sample.len() {
                warnings.push(format!(
                    "Column '{}' has only {} of {} sampled values numeric ({:.0}%)",
                    actual,
                    numeric,
                    sample.len(),
                    numeric as f64 / sample.len() as f64 * 100.0
                ));
            }
        }
    }

    fn check_division_by_zero(
        &self,
        resolved: &IndexMap<&'a str, &str>,
        errors: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) {
        for divisor in self.parsed.divisor_columns() {
            let Some(&actual) = resolved.get(divisor.column.as_str()) else {
                continue;
            };

            if let Some(function) = divisor.aggregate {
                // One dataset-wide value; only a zero or missing aggregate divides by zero
                let cells = self.data.iter().filter_map(|row| row.get(actual));
                let outcome = match compute_aggregate(function, cells) {
                    None => "has no numeric values",
                    Some(v) if v == 0.0 => "is zero",
                    Some(_) => continue,
                };
                errors.push(format!(
                    "{}({}) {} over the dataset; division by zero is guaranteed",
                    function, actual, outcome
                ));
                continue;
            }

            let sample = &self.data[..self.data.len().min(ZERO_SAMPLE_ROWS)];
            let zeros = sample
                .iter()
                .filter(|row| row.get(actual).map_or(true, is_zero_or_empty))
                .count();

            if zeros == sample.len() {
                errors.push(format!(
                    "Column '{}' contains only zero or empty values; division by zero is guaranteed",
                    actual
                ));
            } else if zeros > 0 {
                warnings.push(format!(
                    "Column '{}' has {} zero or empty values in {} sampled rows; division by zero will produce empty results for those rows",
                    actual,
                    zeros,
                    sample.len()
                ));
            }
        }
    }

    fn check_complexity(
        &self,
        complexity: u32,
        errors: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) {
        let max = self.options.max_complexity;
        if complexity > max {
            errors.push(format!(
                "Formula is too complex (complexity score {} exceeds maximum of {})",
                complexity, max
            ));
        } else if f64::from(complexity) > f64::from(max) * COMPLEXITY_WARNING_RATIO {
            warnings.push(format!(
                "Formula is fairly complex (complexity score {} of maximum {})",
                complexity, max
            ));
        }

        let depth = self.parsed.nesting_depth();
        if depth > self.options.max_nesting_depth {
            warnings.push(format!(
                "Formula nests parentheses {} levels deep; consider simplifying",
                depth
            ));
        }
    }

    /// Expression ready for row evaluation, aggregates already substituted
    fn evaluable_expr(&self) -> Result<Expr, EvalError> {
        if self.parsed.has_aggregations() {
            let aggregates = compute_aggregates(self.parsed, self.data)?;
            substitute_aggregates(self.parsed.expr(), &aggregates)
        } else {
            Ok(self.parsed.expr().clone())
        }
    }

    /// Evaluate the formula on up to `limit` leading rows
    fn sample_results(
        &self,
        limit: usize,
    ) -> Result<Vec<Result<Option<f64>, EvalError>>, EvalError> {
        let expr = self.evaluable_expr()?;
        Ok(self
            .data
            .iter()
            .take(limit)
            .map(|row| evaluate(&expr, &RowContext::new(row, &self.columns)))
            .collect())
    }

    fn test_evaluate(&self, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
        // Aggregate formulas yield one dataset-wide value; a single row is enough
        let limit = if self.parsed.has_aggregations() {
            1
        } else {
            TEST_EVAL_ROWS
        };

        let results = match self.sample_results(limit) {
            Ok(results) => results,
            Err(e) => {
                errors.push(format!("Formula evaluation failed: {}", e));
                return;
            }
        };

        match results.first() {
            None => {}
            Some(Err(e)) => errors.push(format!("Formula evaluation failed: {}", e)),
            Some(Ok(None)) => warnings.push(
                "Formula returns an empty result for the first row (missing values or division by zero)"
                    .to_string(),
            ),
            Some(Ok(Some(v))) if !v.is_finite() => {
                let message = "Formula produces an invalid number (NaN or Infinity)".to_string();
                if self.options.require_numeric_result {
                    errors.push(message);
                } else {
                    warnings.push(message);
                }
            }
            Some(Ok(Some(v))) if v.abs() > LARGE_RESULT => warnings.push(format!(
                "Formula result is very large ({:e}); check units and scaling",
                v
            )),
            Some(Ok(Some(_))) => {}
        }

        if results.len() > 1 {
            let failures = results
                .iter()
                .filter(|r| !matches!(r, Ok(Some(v)) if v.is_finite()))
                .count();
            if failures > 0 {
                warnings.push(format!(
                    "Formula could not be evaluated for {} of {} sample rows",
                    failures,
                    results.len()
                ));
            }
        }
    }

    /// Advisory warnings for a target chart type
    fn chart_advice(&self, chart: &ChartType) -> Vec<String> {
        let mut advice = Vec::new();
        let aggregate_only =
            self.parsed.has_aggregations() && self.parsed.row_column_references().is_empty();

        match chart {
            ChartType::Scorecard if !self.parsed.has_aggregations() => advice.push(
                "Scorecard charts show a single value; wrap columns in an aggregate such as SUM(...) or AVG(...)"
                    .to_string(),
            ),
            ChartType::Pie | ChartType::Donut => {
                let negatives = self
                    .sample_results(TYPE_SAMPLE_ROWS)
                    .map(|results| {
                        results
                            .iter()
                            .filter(|r| matches!(r, Ok(Some(v)) if *v < 0.0))
                            .count()
                    })
                    .unwrap_or(0);
                if negatives > 0 {
                    advice.push(format!(
                        "{} charts cannot show negative values; {} sample rows produce negative results",
                        capitalize(chart.display()),
                        negatives
                    ));
                }
            }
            ChartType::Bar | ChartType::Line | ChartType::Area | ChartType::Scatter
                if aggregate_only =>
            {
                advice.push(format!(
                    "Aggregate formulas produce the same value for every row; a {} chart will show a flat series",
                    chart.display()
                ))
            }
            _ => {}
        }

        advice
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::formula::tokenize;
    use crate::types::{data_row, CellValue};

    fn opts() -> ValidationOptions {
        ValidationOptions::default()
    }

    fn sales() -> Vec<DataRow> {
        vec![
            data_row([("Revenue", 1000.0), ("Cost", 600.0), ("Orders", 10.0)]),
            data_row([("Revenue", 1500.0), ("Cost", 700.0), ("Orders", 15.0)]),
            data_row([("Revenue", 2000.0), ("Cost", 900.0), ("Orders", 20.0)]),
        ]
    }

    #[test]
    fn test_quick_validate() {
        assert_eq!(
            quick_validate_formula("Revenue - Cost"),
            QuickValidation {
                valid: true,
                error: None
            }
        );
        let bad = quick_validate_formula("(Revenue - Cost");
        assert!(!bad.valid);
        assert!(bad.error.unwrap().contains("Mismatched parentheses"));
    }

    #[test]
    fn test_complexity_score_weights() {
        // 2 columns (1.0) + 1 operator (1.0) = 2
        assert_eq!(complexity_score(&tokenize("a + b").unwrap()), 2);
        // function 2 + parens 0.4 + column 0.5 = 2.9 -> 3
        assert_eq!(complexity_score(&tokenize("SUM(a)").unwrap()), 3);
        // number 0.1 -> 0
        assert_eq!(complexity_score(&tokenize("1").unwrap()), 0);
        // 4 operators + 5 numbers = 4.5, rounds half up
        assert_eq!(complexity_score(&tokenize("1+1+1+1+1").unwrap()), 5);
    }

    #[test]
    fn test_valid_formula_with_metadata() {
        let result =
            validate_formula_comprehensive("(Revenue - Cost) / Revenue * 100", &sales(), &opts());
        assert!(result.valid, "errors: {:?}", result.errors);
        assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
        let metadata = result.metadata.unwrap();
        assert_eq!(metadata.used_columns, vec!["Revenue", "Cost"]);
        assert!(!metadata.has_aggregations);
        assert!(metadata.aggregation_functions.is_empty());
        // 3 columns 1.5 + 3 operators 3 + number 0.1 + parens 0.4 = 5
        assert_eq!(metadata.complexity, 5);
    }

    #[test]
    fn test_syntax_error_has_no_metadata() {
        let result = validate_formula_comprehensive("EVAL(Revenue)", &sales(), &opts());
        assert!(!result.valid);
        assert_eq!(result.errors, vec!["Unknown function: EVAL"]);
        assert!(result.metadata.is_none());
    }

    #[test]
    fn test_no_data() {
        let result = validate_formula_comprehensive("Revenue", &[], &opts());
        assert!(!result.valid);
        assert_eq!(result.errors, vec!["No data available for validation"]);
        assert!(result.metadata.is_some());
    }

    #[test]
    fn test_missing_columns_accumulate() {
        let result = validate_formula_comprehensive("Profit / Units + Revenue", &sales(), &opts());
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].starts_with("Column 'Profit' not found"));
        assert!(result.errors[1].starts_with("Column 'Units' not found"));
    }

    #[test]
    fn test_fuzzy_column_resolution() {
        let data = vec![data_row([("Total_Sales", 10.0)])];
        let result = validate_formula_comprehensive("[total sales] * 2", &data, &opts());
        assert!(result.valid, "errors: {:?}", result.errors);
    }

    #[test]
    fn test_non_numeric_column_is_error() {
        let data = vec![
            data_row([("Name", "Alice"), ("Score", "5")]),
            data_row([("Name", "Bob"), ("Score", "7")]),
        ];
        let result = validate_formula_comprehensive("Name + Score", &data, &opts());
        assert!(!result.valid);
        assert!(result
            .errors
            .contains(&"Column 'Name' does not contain numeric values".to_string()));
    }

    #[test]
    fn test_count_of_text_column_is_fine() {
        let data = vec![data_row([("Name", "Alice")]), data_row([("Name", "Bob")])];
        let result = validate_formula_comprehensive("COUNT(Name)", &data, &opts());
        assert!(result.valid, "errors: {:?}", result.errors);
    }

    #[test]
    fn test_low_numeric_coverage_is_warning() {
        let data = vec![
            data_row([("x", "1")]),
            data_row([("x", "n/a")]),
            data_row([("x", "n/a")]),
            data_row([("x", "n/a")]),
        ];
        let result = validate_formula_comprehensive("x * 2", &data, &opts());
        assert!(result.valid);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("only 1 of 4 sampled values numeric (25%)")));
    }

    #[test]
    fn test_all_zero_divisor_is_error() {
        let data = vec![data_row([("Revenue", 100.0), ("Orders", 0.0)])];
        let result = validate_formula_comprehensive("Revenue / Orders", &data, &opts());
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("division by zero is guaranteed")));
    }

    #[test]
    fn test_partial_zero_divisor_is_warning() {
        let data = vec![
            data_row([("Revenue", 100.0), ("Orders", 0.0)]),
            data_row([("Revenue", 100.0), ("Orders", 4.0)]),
        ];
        let result = validate_formula_comprehensive("Revenue / Orders", &data, &opts());
        assert!(result.valid, "errors: {:?}", result.errors);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("Column 'Orders' has 1 zero or empty values in 2 sampled rows")));
    }

    #[test]
    fn test_count_divisor_over_text_is_valid() {
        let data = vec![
            data_row([("Revenue", CellValue::from(100.0)), ("Name", CellValue::from("Alice"))]),
            data_row([("Revenue", CellValue::from(300.0)), ("Name", CellValue::from("Bob"))]),
        ];
        let result = validate_formula_comprehensive("SUM(Revenue) / COUNT(Name)", &data, &opts());
        assert!(result.valid, "errors: {:?}", result.errors);
        assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
    }

    #[test]
    fn test_count_divisor_over_zeros_is_valid() {
        let data = vec![
            data_row([("Revenue", 100.0), ("Flag", 0.0)]),
            data_row([("Revenue", 300.0), ("Flag", 0.0)]),
        ];
        let result = validate_formula_comprehensive("SUM(Revenue) / COUNT(Flag)", &data, &opts());
        assert!(result.valid, "errors: {:?}", result.errors);
    }

    #[test]
    fn test_zero_sum_divisor_is_error() {
        let data = vec![
            data_row([("Revenue", 100.0), ("Orders", 0.0)]),
            data_row([("Revenue", 300.0), ("Orders", 0.0)]),
        ];
        let result = validate_formula_comprehensive("SUM(Revenue) / SUM(Orders)", &data, &opts());
        assert!(!result.valid);
        assert_eq!(
            result.errors,
            vec!["SUM(Orders) is zero over the dataset; division by zero is guaranteed"]
        );
    }

    #[test]
    fn test_partial_zero_sum_divisor_is_not_flagged() {
        let data = vec![
            data_row([("Revenue", 100.0), ("Orders", 0.0)]),
            data_row([("Revenue", 300.0), ("Orders", 4.0)]),
        ];
        let result = validate_formula_comprehensive("SUM(Revenue) / SUM(Orders)", &data, &opts());
        assert!(result.valid, "errors: {:?}", result.errors);
        assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
    }

    #[test]
    fn test_text_divisor_is_not_counted_as_zero() {
        let data = vec![
            data_row([("Revenue", CellValue::from(100.0)), ("Orders", CellValue::from("n/a"))]),
            data_row([("Revenue", CellValue::from(100.0)), ("Orders", CellValue::from(4.0))]),
        ];
        let result = validate_formula_comprehensive("Revenue / Orders", &data, &opts());
        assert!(result.valid, "errors: {:?}", result.errors);
        assert!(
            !result.warnings.iter().any(|w| w.contains("zero or empty")),
            "warnings: {:?}",
            result.warnings
        );
    }

    #[test]
    fn test_zero_numerator_is_not_flagged() {
        let data = vec![
            data_row([("Returns", 0.0), ("Orders", 5.0)]),
            data_row([("Returns", 0.0), ("Orders", 4.0)]),
        ];
        let result = validate_formula_comprehensive("Returns / Orders", &data, &opts());
        assert!(result.valid, "errors: {:?}", result.errors);
        assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
    }

    #[test]
    fn test_division_check_can_be_disabled() {
        let data = vec![data_row([("Revenue", 100.0), ("Orders", 0.0)])];
        let options = ValidationOptions {
            check_division_by_zero: false,
            ..ValidationOptions::default()
        };
        let result = validate_formula_comprehensive("Revenue / Orders", &data, &options);
        assert!(result.valid);
        // The test evaluation still notices the empty result
        assert!(result.warnings.iter().any(|w| w.contains("empty result")));
    }

    #[test]
    fn test_complexity_rejection() {
        let formula = (0..30).map(|i| format!("c{}", i % 3)).collect::<Vec<_>>().join(" + ");
        let data = vec![data_row([("c0", 1.0), ("c1", 2.0), ("c2", 3.0)])];
        // 30 columns (15) + 29 operators (29) = 44
        let options = ValidationOptions {
            max_complexity: 40,
            ..ValidationOptions::default()
        };
        let result = validate_formula_comprehensive(&formula, &data, &options);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("too complex")));
        assert_eq!(result.metadata.unwrap().complexity, 44);
        assert!(quick_validate_formula(&formula).valid);
    }

    #[test]
    fn test_complexity_warning() {
        let formula = (0..30).map(|i| format!("c{}", i % 3)).collect::<Vec<_>>().join(" + ");
        let data = vec![data_row([("c0", 1.0), ("c1", 2.0), ("c2", 3.0)])];
        let result = validate_formula_comprehensive(&formula, &data, &opts());
        assert!(result.valid);
        assert!(result.warnings.iter().any(|w| w.contains("fairly complex")));
    }

    #[test]
    fn test_deep_nesting_warning() {
        let data = vec![data_row([("a", 1.0)])];
        let result = validate_formula_comprehensive("(((((a)))))", &data, &opts());
        assert!(result.valid);
        assert!(result.warnings.iter().any(|w| w.contains("5 levels deep")));
    }

    #[test]
    fn test_large_result_warning() {
        let data = vec![data_row([("a", 1e10)])];
        let result = validate_formula_comprehensive("a * a", &data, &opts());
        assert!(result.valid);
        assert!(result.warnings.iter().any(|w| w.contains("very large")));
    }

    #[test]
    fn test_infinite_result_is_error() {
        let data = vec![data_row([("a", 1e200)])];
        let result = validate_formula_comprehensive("a * a", &data, &opts());
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("invalid number")));

        let lenient = ValidationOptions {
            require_numeric_result: false,
            ..ValidationOptions::default()
        };
        let result = validate_formula_comprehensive("a * a", &data, &lenient);
        assert!(result.valid);
    }

    #[test]
    fn test_sample_row_failures_are_counted() {
        let data = vec![
            data_row([("a", CellValue::Number(1.0))]),
            data_row([("a", CellValue::Null)]),
            data_row([("a", CellValue::Number(3.0))]),
        ];
        let result = validate_formula_comprehensive("a * 2", &data, &opts());
        assert!(result.valid);
        assert!(result
            .warnings
            .contains(&"Formula could not be evaluated for 1 of 3 sample rows".to_string()));
    }

    #[test]
    fn test_aggregate_formula_metadata() {
        let result =
            validate_formula_comprehensive("SUM(Revenue) / SUM(Orders)", &sales(), &opts());
        assert!(result.valid, "errors: {:?}", result.errors);
        let metadata = result.metadata.unwrap();
        assert!(metadata.has_aggregations);
        assert_eq!(metadata.aggregation_functions, vec!["SUM"]);
    }

    #[test]
    fn test_chart_scorecard_without_aggregate() {
        let result =
            validate_formula_for_chart_type("Revenue - Cost", &sales(), "scorecard", &opts());
        assert!(result.valid);
        assert!(result.warnings.iter().any(|w| w.contains("Scorecard")));

        let result = validate_formula_for_chart_type("SUM(Revenue)", &sales(), "KPI", &opts());
        assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
    }

    #[test]
    fn test_chart_pie_negative_values() {
        let result = validate_formula_for_chart_type("Cost - Revenue", &sales(), "pie", &opts());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("Pie charts cannot show negative values; 3 sample rows")));
    }

    #[test]
    fn test_chart_line_with_aggregate_only() {
        let result = validate_formula_for_chart_type("AVG(Revenue)", &sales(), "line", &opts());
        assert!(result.warnings.iter().any(|w| w.contains("flat series")));

        let result =
            validate_formula_for_chart_type("Revenue / SUM(Revenue)", &sales(), "line", &opts());
        assert!(!result.warnings.iter().any(|w| w.contains("flat series")));
    }

    #[test]
    fn test_chart_type_parse() {
        assert_eq!(ChartType::parse("Doughnut"), ChartType::Donut);
        assert_eq!(ChartType::parse(" metric "), ChartType::Scorecard);
        assert_eq!(ChartType::parse("sankey"), ChartType::Other("sankey".to_string()));
    }
}
