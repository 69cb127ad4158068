use crate::catalog::{self, FormulaCategory};
use crate::config::load_config;
use crate::core::calculator::calculate_formula;
use crate::core::formula::parse_formula;
use crate::core::validator::{
    quick_validate_formula, validate_formula_comprehensive, validate_formula_for_chart_type,
    ValidationResult,
};
use crate::dataset::{load_dataset, save_dataset};
use crate::error::{CalcError, CalcResult};
use crate::types::{column_names, CellValue};
use colored::Colorize;
use std::path::PathBuf;

/// Rows shown in the calculate preview
const PREVIEW_ROWS: usize = 5;

/// Format a number for display, removing unnecessary decimal places
fn format_number(n: f64) -> String {
    let rounded = (n * 1e6).round() / 1e6;
    let formatted = format!("{:.6}", rounded)
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string();
    if formatted == "-0" {
        "0".to_string()
    } else {
        formatted
    }
}

fn format_cell(value: Option<&CellValue>) -> String {
    match value {
        Some(CellValue::Number(n)) => format_number(*n),
        Some(CellValue::Text(s)) => s.clone(),
        Some(CellValue::Other(v)) => v.to_string(),
        Some(CellValue::Null) | None => "null".to_string(),
    }
}

/// Execute the check command: syntax only, no data
pub fn check(formula: String) -> CalcResult<()> {
    println!("{}", "🔍 dashcalc - Checking formula syntax".bold().green());
    println!("   Formula: {}\n", formula.bright_blue());

    let result = quick_validate_formula(&formula);
    match result.error {
        None => {
            let parsed = parse_formula(&formula)?;
            let rendered: Vec<String> = parsed.tokens().iter().map(|t| t.to_string()).collect();
            println!("   Tokens: {}", rendered.join(" ").cyan());
            println!("\n{}", "✅ Formula syntax is valid".bold().green());
            Ok(())
        }
        Some(error) => {
            println!("{}", format!("❌ {}", error).bold().red());
            Err(CalcError::Validation(error))
        }
    }
}

/// Execute the validate command against a dataset
pub fn validate(
    formula: String,
    data: PathBuf,
    chart_type: Option<String>,
    config: Option<PathBuf>,
) -> CalcResult<()> {
    println!("{}", "✅ dashcalc - Validating formula".bold().green());
    println!("   Formula: {}", formula.bright_blue());
    println!("   Data:    {}", data.display());
    if let Some(ref chart) = chart_type {
        println!("   Chart:   {}", chart.bright_yellow());
    }
    println!();

    let config = load_config(config.as_deref())?;
    let rows = load_dataset(&data)?;
    println!(
        "   Loaded {} rows, {} columns\n",
        rows.len(),
        column_names(&rows).len()
    );

    let result = match chart_type {
        Some(chart) => validate_formula_for_chart_type(&formula, &rows, &chart, &config.validation),
        None => validate_formula_comprehensive(&formula, &rows, &config.validation),
    };
    print_validation(&result);

    if result.valid {
        Ok(())
    } else {
        Err(CalcError::Validation(format!(
            "Formula has {} error(s)",
            result.errors.len()
        )))
    }
}

fn print_validation(result: &ValidationResult) {
    if let Some(ref metadata) = result.metadata {
        println!("{}", "📋 Formula Information:".bold().cyan());
        println!("   Columns:     {}", metadata.used_columns.join(", "));
        if metadata.has_aggregations {
            println!(
                "   Aggregates:  {}",
                metadata.aggregation_functions.join(", ")
            );
        }
        println!("   Complexity:  {}\n", metadata.complexity);
    }

    for error in &result.errors {
        println!("   {}", format!("❌ {}", error).red());
    }
    for warning in &result.warnings {
        println!("   {}", format!("⚠️  {}", warning).yellow());
    }
    if !result.errors.is_empty() || !result.warnings.is_empty() {
        println!();
    }

    if result.valid {
        println!("{}", "✅ Formula is valid".bold().green());
    } else {
        println!(
            "{}",
            format!("❌ Formula is invalid ({} error(s))", result.errors.len())
                .bold()
                .red()
        );
    }
}

/// Execute the calculate command.
///
/// Without `--output` the resulting dataset is written to stdout as JSON.
pub fn calculate(
    formula: String,
    data: PathBuf,
    column: String,
    aggregate_first: bool,
    round: Option<u32>,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
) -> CalcResult<()> {
    let config = load_config(config.as_deref())?;
    let mut options = config.calculation;
    options.aggregate_first |= aggregate_first;
    if round.is_some() {
        options.round = round;
    }

    let rows = load_dataset(&data)?;
    let calculation = calculate_formula(&rows, &formula, &column, &options)?;

    let Some(output) = output else {
        println!("{}", serde_json::to_string_pretty(&calculation.data)?);
        return Ok(());
    };

    save_dataset(&output, &calculation.data)?;

    println!("{}", "🧮 dashcalc - Calculated column".bold().green());
    println!("   Formula: {}", formula.bright_blue());
    println!("   Column:  {}", column.bright_blue().bold());
    println!(
        "   Rows:    {} ({} null)",
        calculation.data.len(),
        calculation.null_rows
    );
    if calculation.broadcast {
        println!("   {}", "Single aggregate value applied to every row".cyan());
    }

    if !calculation.aggregates.is_empty() {
        println!("\n   📐 Aggregates:");
        let mut aggregates: Vec<_> = calculation.aggregates.iter().collect();
        aggregates.sort_by(|a, b| a.0.cmp(b.0));
        for (alias, value) in aggregates {
            let shown = value.map_or_else(|| "null".to_string(), format_number);
            println!("      {} = {}", alias.bright_blue(), shown.bold());
        }
    }

    println!("\n   Preview:");
    for (i, row) in calculation.data.iter().take(PREVIEW_ROWS).enumerate() {
        println!("      [{}] {}", i, format_cell(row.get(&column)));
    }
    if calculation.data.len() > PREVIEW_ROWS {
        println!("      ... {} more", calculation.data.len() - PREVIEW_ROWS);
    }

    println!(
        "\n{}",
        format!("✅ Wrote {}", output.display()).bold().green()
    );
    Ok(())
}

/// Execute the suggest command
pub fn suggest(data: Option<PathBuf>, columns: Option<String>) -> CalcResult<()> {
    let available: Vec<String> = match (data, columns) {
        (Some(path), _) => column_names(&load_dataset(&path)?),
        (None, Some(list)) => list
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
        (None, None) => {
            return Err(CalcError::Validation(
                "Provide either --data or --columns".to_string(),
            ))
        }
    };

    println!("{}", "💡 dashcalc - Formula suggestions".bold().green());
    println!("   Columns: {}\n", available.join(", "));

    let suggestions = catalog::suggest_formulas_for_data(&available);
    if suggestions.is_empty() {
        println!(
            "{}",
            "⚠️  No catalog formulas match these columns".yellow()
        );
        return Ok(());
    }

    for suggestion in &suggestions {
        let confidence = match suggestion.confidence {
            catalog::Confidence::High => suggestion.confidence.to_string().green(),
            catalog::Confidence::Medium => suggestion.confidence.to_string().yellow(),
            catalog::Confidence::Low => suggestion.confidence.to_string().red(),
        };
        println!(
            "   {} ({})",
            suggestion.formula.name.bright_blue().bold(),
            confidence
        );
        println!("      {}", suggestion.generated_formula.cyan());
        for (required, actual) in &suggestion.column_mapping {
            if required != actual {
                println!("      {} -> {}", required, actual);
            }
        }
    }
    println!(
        "\n{}",
        format!("✅ {} formula(s) applicable", suggestions.len())
            .bold()
            .green()
    );
    Ok(())
}

/// Execute the formulas command: list the catalog
pub fn formulas(category: Option<String>) -> CalcResult<()> {
    let categories: Vec<FormulaCategory> = match category {
        Some(name) => {
            let parsed = FormulaCategory::parse(&name).ok_or_else(|| {
                let valid: Vec<&str> = FormulaCategory::ALL.iter().map(|c| c.name()).collect();
                CalcError::Validation(format!(
                    "Unknown category '{}'. Valid categories: {}",
                    name,
                    valid.join(", ")
                ))
            })?;
            vec![parsed]
        }
        None => FormulaCategory::ALL.to_vec(),
    };

    println!("{}", "📚 dashcalc - Common formulas".bold().green());
    for category in categories {
        println!("\n   {}", category.name().to_uppercase().bold().cyan());
        for def in catalog::formulas_by_category(category) {
            println!(
                "   {} {}",
                def.id.bright_blue().bold(),
                format!("({})", def.name).dimmed()
            );
            println!("      {}", def.formula);
            println!("      {}", def.description);
        }
    }
    Ok(())
}
