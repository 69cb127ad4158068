use clap::{Parser, Subcommand};
use dashcalc::cli;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dashcalc")]
#[command(about = "Validate and evaluate dashboard column formulas against JSON datasets")]
#[command(long_about = "dashcalc - Formula engine for dashboard datasets

Formulas reference dataset columns by name (use [Column Name] for names with
spaces), combine them with + - * / % and parentheses, and may aggregate whole
columns with SUM, AVG, COUNT, MIN and MAX.

COMMANDS:
  check      - Syntax-only check, no data needed
  validate   - Check a formula against a dataset
  calculate  - Add a computed column to a dataset
  suggest    - Catalog formulas that fit a dataset's columns
  formulas   - List the formula catalog

EXAMPLES:
  dashcalc check \"(Revenue - Cost) / Revenue * 100\"
  dashcalc validate \"Revenue / Orders\" --data sales.json --chart-type bar
  dashcalc calculate \"SUM(Revenue) / SUM(Orders)\" --data sales.json --column AOV
  dashcalc suggest --columns Revenue,Cost,Orders

Set RUST_LOG=dashcalc=debug to trace aggregate and validation details.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check formula syntax without a dataset
    Check {
        /// Formula to check
        formula: String,
    },

    /// Validate a formula against a dataset
    Validate {
        /// Formula to validate
        formula: String,

        /// Dataset file (JSON array of row objects)
        #[arg(short, long)]
        data: PathBuf,

        /// Target chart type for chart-specific advice (bar, line, pie, scorecard, ...)
        #[arg(long)]
        chart_type: Option<String>,

        /// Engine configuration file (YAML)
        #[arg(short, long, env = "DASHCALC_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Calculate a formula over a dataset into a new column
    Calculate {
        /// Formula to calculate
        formula: String,

        /// Dataset file (JSON array of row objects)
        #[arg(short, long)]
        data: PathBuf,

        /// Name of the output column
        #[arg(long)]
        column: String,

        /// Compute aggregates over the whole dataset first
        #[arg(short, long)]
        aggregate_first: bool,

        /// Round results to this many decimal places
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(0..=15))]
        round: Option<u32>,

        /// Write the result dataset here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Engine configuration file (YAML)
        #[arg(short, long, env = "DASHCALC_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Suggest catalog formulas for a dataset
    Suggest {
        /// Dataset file; its first row supplies the column names
        #[arg(short, long, conflicts_with = "columns", required_unless_present = "columns")]
        data: Option<PathBuf>,

        /// Comma-separated column names
        #[arg(long)]
        columns: Option<String>,
    },

    /// List the formula catalog
    Formulas {
        /// Only this category (financial, marketing, sales, customer, operations)
        #[arg(long)]
        category: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dashcalc=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { formula } => cli::check(formula)?,

        Commands::Validate {
            formula,
            data,
            chart_type,
            config,
        } => cli::validate(formula, data, chart_type, config)?,

        Commands::Calculate {
            formula,
            data,
            column,
            aggregate_first,
            round,
            output,
            config,
        } => cli::calculate(formula, data, column, aggregate_first, round, output, config)?,

        Commands::Suggest { data, columns } => cli::suggest(data, columns)?,

        Commands::Formulas { category } => cli::formulas(category)?,
    }

    Ok(())
}
