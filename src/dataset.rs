//! Dataset files
//!
//! A dataset is a JSON array of flat objects, one per row. Column order is
//! taken from the first row and preserved on write.

use crate::error::{CalcError, CalcResult};
use crate::types::DataRow;
use std::fs;
use std::path::Path;

/// Parse a dataset from JSON text
pub fn parse_dataset(content: &str) -> CalcResult<Vec<DataRow>> {
    // Deserialize rows directly so object key order survives
    match serde_json::from_str::<Vec<DataRow>>(content) {
        Ok(rows) => Ok(rows),
        Err(e) => match serde_json::from_str::<serde_json::Value>(content) {
            Ok(value) if !value.is_array() => Err(CalcError::Validation(format!(
                "Dataset must be a JSON array of row objects, found {}",
                json_kind(&value)
            ))),
            _ => Err(e.into()),
        },
    }
}

pub fn load_dataset(path: &Path) -> CalcResult<Vec<DataRow>> {
    let content = fs::read_to_string(path)?;
    parse_dataset(&content)
}

/// Write rows as pretty-printed JSON
pub fn save_dataset(path: &Path, rows: &[DataRow]) -> CalcResult<()> {
    let content = serde_json::to_string_pretty(rows)?;
    fs::write(path, content + "\n")?;
    Ok(())
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
