use thiserror::Error;

use crate::core::formula::evaluator::EvalError;
use crate::core::formula::parser::ParseError;

pub type CalcResult<T> = Result<T, CalcError>;

#[derive(Error, Debug)]
pub enum CalcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Formula evaluation error: {0}")]
    Eval(#[from] EvalError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
