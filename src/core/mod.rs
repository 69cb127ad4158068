//! Formula engine: language, column resolution, calculation and validation

pub mod calculator;
pub mod formula;
pub mod resolver;
pub mod validator;

pub use calculator::{calculate_formula, calculate_formula_for_row, CalculateOptions, Calculation};
pub use formula::{parse_formula, ParsedFormula};
pub use resolver::find_matching_column;
pub use validator::{
    quick_validate_formula, validate_formula_comprehensive, validate_formula_for_chart_type,
    ValidationOptions, ValidationResult,
};
