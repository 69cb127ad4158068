//! Column name resolution
//!
//! Maps a column reference written in a formula onto an actual dataset
//! column. Users type `Total Sales`, `total_sales` or `TOTAL SALES` for the
//! same column; all of them should land on the one the dataset has.

use serde::Serialize;

/// Which rule produced a column match, strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    CaseInsensitive,
    /// Spaces and underscores treated as the same separator
    Separator,
}

/// A resolved column and how it was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMatch<'a> {
    pub column: &'a str,
    pub kind: MatchKind,
}

/// Resolve `requested` against `available`, reporting the rule that matched.
///
/// Rules are tried in priority order; within a rule the first column in
/// `available` order wins.
pub fn match_column<'a, S: AsRef<str>>(
    requested: &str,
    available: &'a [S],
) -> Option<ColumnMatch<'a>> {
    let requested = requested.trim();

    // Try exact match first
    if let Some(col) = available.iter().find(|c| c.as_ref() == requested) {
        return Some(ColumnMatch {
            column: col.as_ref(),
            kind: MatchKind::Exact,
        });
    }

    let lower = requested.to_lowercase();
    if let Some(col) = available
        .iter()
        .find(|c| c.as_ref().to_lowercase() == lower)
    {
        return Some(ColumnMatch {
            column: col.as_ref(),
            kind: MatchKind::CaseInsensitive,
        });
    }

    // "Total Sales" <-> "Total_Sales", either direction
    let normalized = normalize_separators(requested);
    available
        .iter()
        .find(|c| normalize_separators(c.as_ref()) == normalized)
        .map(|col| ColumnMatch {
            column: col.as_ref(),
            kind: MatchKind::Separator,
        })
}

/// Resolve a column reference to the actual dataset column name
pub fn find_matching_column<'a, S: AsRef<str>>(
    requested: &str,
    available: &'a [S],
) -> Option<&'a str> {
    match_column(requested, available).map(|m| m.column)
}

fn normalize_separators(name: &str) -> String {
    name.trim().replace(' ', "_").to_lowercase()
}
