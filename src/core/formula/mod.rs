//! Formula language: tokenizer, parser, numeric coercion and row evaluator

pub mod evaluator;
pub mod numeric;
pub mod parser;
pub mod tokenizer;

pub use evaluator::{evaluate, substitute_aggregates, AggregateValues, EvalError, RowContext};
pub use numeric::parse_numeric_value;
pub use parser::{
    parse_formula, AggregateCall, AggregateFunction, Expr, ParseError, ParsedFormula,
};
pub use tokenizer::{tokenize, Token, TokenKind, TokenizeError};
