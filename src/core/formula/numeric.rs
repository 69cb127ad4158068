//! Numeric coercion for dataset cells
//!
//! Spreadsheet exports are full of numbers stored as display strings
//! ("$1,234.56", "12%", "€ 0"). This is the one place they are turned into
//! numbers.

use crate::types::CellValue;

const STRIPPED_CHARS: [char; 6] = ['$', '€', '£', '¥', ',', '%'];

/// Coerce a cell to a finite number, or `None` when it is not numeric.
///
/// Percent signs are stripped, not applied: `"12%"` is `12.0`.
pub fn parse_numeric_value(value: &CellValue) -> Option<f64> {
    match value {
        CellValue::Number(n) if n.is_finite() => Some(*n),
        CellValue::Text(s) => parse_numeric_str(s),
        _ => None,
    }
}

/// String half of [`parse_numeric_value`]
pub fn parse_numeric_str(s: &str) -> Option<f64> {
    let cleaned: String = s
        .chars()
        .filter(|c| !STRIPPED_CHARS.contains(c))
        .collect();
    let cleaned = cleaned.trim();

    // Rust's float parser also accepts "inf"/"NaN"; only digits count here
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// True when a cell is null, blank, or numerically zero. Other text is not.
pub fn is_zero_or_empty(value: &CellValue) -> bool {
    match value {
        CellValue::Null => true,
        CellValue::Text(s) if s.trim().is_empty() => true,
        _ => parse_numeric_value(value) == Some(0.0),
    }
}
