//! dashcalc - formula engine for dashboard datasets
//!
//! Formulas are small arithmetic expressions over dataset columns:
//! `(Revenue - Cost) / Revenue * 100`, `[Ad Spend] / Clicks`, or
//! `SUM(Revenue) / SUM(Orders)`. This library tokenizes and parses them,
//! validates them against a live dataset, and evaluates them row by row or
//! aggregate-first.
//!
//! # Features
//!
//! - Fuzzy column resolution (`total sales` finds `Total_Sales`)
//! - Currency and percentage strings read as numbers (`"$1,234.56"`)
//! - Null-propagating evaluation: a bad row yields null, never a panic
//! - Dataset-aware validation with blocking errors and advisory warnings
//! - A catalog of common business formulas with column-mapping suggestions
//!
//! # Example
//!
//! ```
//! use dashcalc::core::calculator::{calculate_formula, CalculateOptions};
//! use dashcalc::types::{data_row, CellValue};
//!
//! let data = vec![data_row([("Revenue", 1000.0), ("Cost", 600.0)])];
//! let calc = calculate_formula(
//!     &data,
//!     "(Revenue - Cost) / Revenue * 100",
//!     "Margin",
//!     &CalculateOptions::default(),
//! )?;
//! assert_eq!(calc.data[0]["Margin"], CellValue::Number(40.0));
//! # Ok::<(), dashcalc::error::CalcError>(())
//! ```

pub mod catalog;
pub mod cli;
pub mod config;
pub mod core;
pub mod dataset;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use error::{CalcError, CalcResult};
pub use types::{CellValue, DataRow};
