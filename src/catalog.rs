//! Catalog of common business formulas
//!
//! Each entry is written against abstract column names (`Revenue`, `Cost`,
//! `Ad_Spend`, ...). Given the columns of a real dataset, the catalog works
//! out which formulas apply, maps abstract names onto actual columns and
//! generates a concrete formula string.

use crate::core::resolver::{match_column, MatchKind};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormulaCategory {
    Financial,
    Marketing,
    Sales,
    Customer,
    Operations,
}

impl FormulaCategory {
    pub const ALL: [FormulaCategory; 5] = [
        FormulaCategory::Financial,
        FormulaCategory::Marketing,
        FormulaCategory::Sales,
        FormulaCategory::Customer,
        FormulaCategory::Operations,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FormulaCategory::Financial => "financial",
            FormulaCategory::Marketing => "marketing",
            FormulaCategory::Sales => "sales",
            FormulaCategory::Customer => "customer",
            FormulaCategory::Operations => "operations",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl fmt::Display for FormulaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a formula's result should be displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    /// Already scaled by 100
    Percentage,
    Ratio,
    Currency,
    Number,
}

impl OutputType {
    /// Render a value: `40.00%`, `2.50x`, `$1,234.56`, `1,234.5`
    pub fn format(&self, value: f64) -> String {
        if !value.is_finite() {
            return "N/A".to_string();
        }
        match self {
            OutputType::Percentage => format!("{:.2}%", value),
            OutputType::Ratio => format!("{:.2}x", value),
            OutputType::Currency => {
                let sign = if value < 0.0 { "-" } else { "" };
                format!("{}${}", sign, group_thousands(value.abs(), 2))
            }
            OutputType::Number => {
                let sign = if value < 0.0 { "-" } else { "" };
                let grouped = group_thousands(value.abs(), 2);
                let trimmed = if grouped.contains('.') {
                    grouped.trim_end_matches('0').trim_end_matches('.')
                } else {
                    &grouped
                };
                format!("{}{}", sign, trimmed)
            }
        }
    }
}

/// Fixed-point rendering of a non-negative value with comma thousands separators
fn group_thousands(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value);
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(frac) => format!("{}.{}", grouped, frac),
        None => grouped,
    }
}

/// A catalog entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormulaDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub category: FormulaCategory,
    pub description: &'static str,
    /// Template over the abstract names in `required_columns`
    pub formula: &'static str,
    pub required_columns: &'static [&'static str],
    pub output_type: OutputType,
    pub interpretation: &'static str,
}

static DEFINITIONS: [FormulaDefinition; 15] = [
    FormulaDefinition {
        id: "profit_margin",
        name: "Profit Margin",
        category: FormulaCategory::Financial,
        description: "Share of revenue left after costs",
        formula: "(Revenue - Cost) / Revenue * 100",
        required_columns: &["Revenue", "Cost"],
        output_type: OutputType::Percentage,
        interpretation: "Higher is better; a negative margin means costs exceed revenue",
    },
    FormulaDefinition {
        id: "gross_profit",
        name: "Gross Profit",
        category: FormulaCategory::Financial,
        description: "Revenue minus cost",
        formula: "Revenue - Cost",
        required_columns: &["Revenue", "Cost"],
        output_type: OutputType::Currency,
        interpretation: "Absolute profit before overheads",
    },
    FormulaDefinition {
        id: "roi",
        name: "Return on Investment",
        category: FormulaCategory::Financial,
        description: "Gain relative to the amount invested",
        formula: "(Revenue - Investment) / Investment * 100",
        required_columns: &["Revenue", "Investment"],
        output_type: OutputType::Percentage,
        interpretation: "Above 0% the investment paid for itself",
    },
    FormulaDefinition {
        id: "markup",
        name: "Markup",
        category: FormulaCategory::Financial,
        description: "Price increase over cost",
        formula: "(Price - Cost) / Cost * 100",
        required_columns: &["Price", "Cost"],
        output_type: OutputType::Percentage,
        interpretation: "How far the selling price sits above cost",
    },
    FormulaDefinition {
        id: "roas",
        name: "Return on Ad Spend",
        category: FormulaCategory::Marketing,
        description: "Revenue earned per unit of advertising spend",
        formula: "Revenue / Ad_Spend",
        required_columns: &["Revenue", "Ad_Spend"],
        output_type: OutputType::Ratio,
        interpretation: "Above 1x the campaign returns more than it costs",
    },
    FormulaDefinition {
        id: "ctr",
        name: "Click-Through Rate",
        category: FormulaCategory::Marketing,
        description: "Share of impressions that led to a click",
        formula: "Clicks / Impressions * 100",
        required_columns: &["Clicks", "Impressions"],
        output_type: OutputType::Percentage,
        interpretation: "Measures how compelling an ad is",
    },
    FormulaDefinition {
        id: "conversion_rate",
        name: "Conversion Rate",
        category: FormulaCategory::Marketing,
        description: "Share of clicks that converted",
        formula: "Conversions / Clicks * 100",
        required_columns: &["Conversions", "Clicks"],
        output_type: OutputType::Percentage,
        interpretation: "Measures how well traffic turns into results",
    },
    FormulaDefinition {
        id: "cpc",
        name: "Cost per Click",
        category: FormulaCategory::Marketing,
        description: "Advertising spend per click",
        formula: "Ad_Spend / Clicks",
        required_columns: &["Ad_Spend", "Clicks"],
        output_type: OutputType::Currency,
        interpretation: "Lower is cheaper traffic",
    },
    FormulaDefinition {
        id: "cpm",
        name: "Cost per Mille",
        category: FormulaCategory::Marketing,
        description: "Advertising spend per thousand impressions",
        formula: "Ad_Spend / Impressions * 1000",
        required_columns: &["Ad_Spend", "Impressions"],
        output_type: OutputType::Currency,
        interpretation: "Lower is cheaper reach",
    },
    FormulaDefinition {
        id: "aov",
        name: "Average Order Value",
        category: FormulaCategory::Sales,
        description: "Revenue per order",
        formula: "Revenue / Orders",
        required_columns: &["Revenue", "Orders"],
        output_type: OutputType::Currency,
        interpretation: "Typical basket size",
    },
    FormulaDefinition {
        id: "revenue_per_customer",
        name: "Revenue per Customer",
        category: FormulaCategory::Sales,
        description: "Revenue divided by customer count",
        formula: "Revenue / Customers",
        required_columns: &["Revenue", "Customers"],
        output_type: OutputType::Currency,
        interpretation: "Average value of each customer in the period",
    },
    FormulaDefinition {
        id: "cac",
        name: "Customer Acquisition Cost",
        category: FormulaCategory::Customer,
        description: "Marketing spend per new customer",
        formula: "Marketing_Spend / New_Customers",
        required_columns: &["Marketing_Spend", "New_Customers"],
        output_type: OutputType::Currency,
        interpretation: "Lower means customers are cheaper to win",
    },
    FormulaDefinition {
        id: "churn_rate",
        name: "Churn Rate",
        category: FormulaCategory::Customer,
        description: "Share of customers lost",
        formula: "Churned_Customers / Customers * 100",
        required_columns: &["Churned_Customers", "Customers"],
        output_type: OutputType::Percentage,
        interpretation: "Lower is better retention",
    },
    FormulaDefinition {
        id: "ltv",
        name: "Customer Lifetime Value",
        category: FormulaCategory::Customer,
        description: "Expected revenue from one customer over the relationship",
        formula: "Average_Order_Value * Purchase_Frequency * Customer_Lifespan",
        required_columns: &["Average_Order_Value", "Purchase_Frequency", "Customer_Lifespan"],
        output_type: OutputType::Currency,
        interpretation: "Compare with acquisition cost; LTV should exceed CAC",
    },
    FormulaDefinition {
        id: "inventory_turnover",
        name: "Inventory Turnover",
        category: FormulaCategory::Operations,
        description: "How many times inventory is sold through",
        formula: "Cost / Inventory",
        required_columns: &["Cost", "Inventory"],
        output_type: OutputType::Ratio,
        interpretation: "Higher means stock moves faster",
    },
];

/// Catalog keyed by formula id, in display order
pub static COMMON_FORMULAS: Lazy<IndexMap<&'static str, &'static FormulaDefinition>> =
    Lazy::new(|| DEFINITIONS.iter().map(|def| (def.id, def)).collect());

static BARE_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

pub fn common_formulas() -> &'static [FormulaDefinition] {
    &DEFINITIONS
}

pub fn get_formula(id: &str) -> Option<&'static FormulaDefinition> {
    COMMON_FORMULAS.get(id).copied()
}

pub fn formulas_by_category(category: FormulaCategory) -> Vec<&'static FormulaDefinition> {
    DEFINITIONS
        .iter()
        .filter(|def| def.category == category)
        .collect()
}

/// How a required column was matched to a dataset column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strength {
    /// Exact or case-insensitive
    Direct,
    Fuzzy,
}

/// `Ad_Spend`, `ad spend` and `Ad-Spend` all normalize to `adspend`
fn fuzzy_normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | ' ' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

fn resolve_required<'a, S: AsRef<str>>(
    required: &str,
    available: &'a [S],
) -> Option<(&'a str, Strength)> {
    if let Some(m) = match_column(required, available) {
        let strength = match m.kind {
            MatchKind::Exact | MatchKind::CaseInsensitive => Strength::Direct,
            MatchKind::Separator => Strength::Fuzzy,
        };
        return Some((m.column, strength));
    }

    let normalized = fuzzy_normalize(required);
    available
        .iter()
        .map(|c| c.as_ref())
        .find(|c| fuzzy_normalize(c) == normalized)
        .map(|c| (c, Strength::Fuzzy))
}

fn resolve_all<'a, S: AsRef<str>>(
    def: &FormulaDefinition,
    available: &'a [S],
) -> Option<Vec<(&'static str, &'a str, Strength)>> {
    def.required_columns
        .iter()
        .map(|&required| {
            resolve_required(required, available)
                .map(|(actual, strength)| (required, actual, strength))
        })
        .collect()
}

/// Map each required column of `def` onto an available column.
///
/// Returns `None` when any required column has no match.
pub fn map_formula_columns<S: AsRef<str>>(
    def: &FormulaDefinition,
    available: &[S],
) -> Option<IndexMap<String, String>> {
    resolve_all(def, available).map(|resolved| {
        resolved
            .into_iter()
            .map(|(required, actual, _)| (required.to_string(), actual.to_string()))
            .collect()
    })
}

/// Every catalog formula whose required columns all resolve
pub fn find_applicable_formulas<S: AsRef<str>>(available: &[S]) -> Vec<&'static FormulaDefinition> {
    DEFINITIONS
        .iter()
        .filter(|def| resolve_all(def, available).is_some())
        .collect()
}

/// Instantiate a formula template with actual column names.
///
/// Substitution is a single pass over whole words, so a mapped name that
/// contains another abstract name is never rewritten twice. Actual names
/// that are not bare identifiers are wrapped in brackets.
pub fn generate_formula_with_columns(
    def: &FormulaDefinition,
    mapping: &IndexMap<String, String>,
) -> String {
    let mut names: Vec<&str> = mapping.keys().map(String::as_str).collect();
    if names.is_empty() {
        return def.formula.to_string();
    }
    // Longest first so `Customers` never shadows `New_Customers`
    names.sort_by_key(|name| std::cmp::Reverse(name.len()));

    let alternation = names
        .iter()
        .map(|name| regex::escape(name))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = match Regex::new(&format!(r"\b(?:{})\b", alternation)) {
        Ok(pattern) => pattern,
        Err(_) => return def.formula.to_string(),
    };

    pattern
        .replace_all(def.formula, |caps: &regex::Captures<'_>| {
            let abstract_name = &caps[0];
            match mapping.get(abstract_name) {
                Some(actual) => column_reference(actual),
                None => abstract_name.to_string(),
            }
        })
        .into_owned()
}

/// A column name as it should be written in a formula
pub fn column_reference(name: &str) -> String {
    if BARE_IDENTIFIER.is_match(name) {
        name.to_string()
    } else {
        format!("[{}]", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormulaSuggestion {
    pub formula: &'static FormulaDefinition,
    pub column_mapping: IndexMap<String, String>,
    pub generated_formula: String,
    pub confidence: Confidence,
}

/// Applicable formulas for a dataset, most confident first.
///
/// Ties keep catalog order.
pub fn suggest_formulas_for_data<S: AsRef<str>>(available: &[S]) -> Vec<FormulaSuggestion> {
    let mut suggestions: Vec<FormulaSuggestion> = DEFINITIONS
        .iter()
        .filter_map(|def| {
            let resolved = resolve_all(def, available)?;
            let direct = resolved
                .iter()
                .filter(|(_, _, strength)| *strength == Strength::Direct)
                .count();
            let fuzzy = resolved.len() - direct;
            let confidence = if fuzzy == 0 {
                Confidence::High
            } else if direct > fuzzy {
                Confidence::Medium
            } else {
                Confidence::Low
            };

            let column_mapping: IndexMap<String, String> = resolved
                .into_iter()
                .map(|(required, actual, _)| (required.to_string(), actual.to_string()))
                .collect();
            let generated_formula = generate_formula_with_columns(def, &column_mapping);

            Some(FormulaSuggestion {
                formula: def,
                column_mapping,
                generated_formula,
                confidence,
            })
        })
        .collect();

    suggestions.sort_by_key(|s| s.confidence);
    suggestions
}
