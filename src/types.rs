use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

//==============================================================================
// Dataset Values
//==============================================================================

/// A single cell of a dataset row.
///
/// Datasets arrive from upstream parsers as loosely typed JSON. Everything is
/// funnelled into this closed set of variants at the boundary so the
/// evaluator never sees an open "any" type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// A plain number
    Number(f64),
    /// A string, possibly numeric-looking ("$1,234.56", "12%")
    Text(String),
    /// Missing value
    Null,
    /// Anything else (booleans, nested arrays/objects)
    Other(serde_json::Value),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<Option<f64>> for CellValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(CellValue::Null, CellValue::Number)
    }
}

/// One dataset row: column name -> value, in the column order of the source.
pub type DataRow = IndexMap<String, CellValue>;

/// Build a row from `(column, value)` pairs.
pub fn data_row<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> DataRow
where
    K: Into<String>,
    V: Into<CellValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Column names of a dataset, taken from its first row.
pub fn column_names(data: &[DataRow]) -> Vec<String> {
    data.first()
        .map(|row| row.keys().cloned().collect())
        .unwrap_or_default()
}
