//! Formula parser and syntax validator
//!
//! Checks a token stream for balanced parentheses and known function names,
//! then builds an expression tree with recursive descent. Precedence is the
//! usual one: `* / %` bind tighter than `+ -`, both left-associative.

use super::tokenizer::{tokenize, Token, TokenKind, TokenizeError};
use serde::Serialize;

/// The aggregate functions a formula may call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregateFunction {
    Sum,
    Avg,
    Count,
    Min,
    Max,
}

impl AggregateFunction {
    /// Look up a function by name. Names are case-sensitive uppercase.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "SUM" => Some(AggregateFunction::Sum),
            "AVG" => Some(AggregateFunction::Avg),
            "COUNT" => Some(AggregateFunction::Count),
            "MIN" => Some(AggregateFunction::Min),
            "MAX" => Some(AggregateFunction::Max),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }
}

impl std::fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A `FUNCTION(column)` call found in a formula
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AggregateCall {
    pub function: AggregateFunction,
    pub column: String,
    /// Canonical text of the call; keys precomputed aggregate values
    pub alias: String,
}

impl AggregateCall {
    pub fn new(function: AggregateFunction, column: impl Into<String>) -> Self {
        let column = column.into();
        let alias = format!("{}({})", function.name(), column);
        Self {
            function,
            column,
            alias,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "+" => Some(BinaryOp::Add),
            "-" => Some(BinaryOp::Sub),
            "*" => Some(BinaryOp::Mul),
            "/" => Some(BinaryOp::Div),
            "%" => Some(BinaryOp::Mod),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        }
    }

    /// Division-like operators, where a zero right operand yields null
    pub fn is_division(&self) -> bool {
        matches!(self, BinaryOp::Div | BinaryOp::Mod)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
}

/// Expression tree for a formula
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A numeric literal
    Number(f64),
    /// A null literal; only produced by aggregate substitution
    Null,
    /// A column reference, as written in the formula
    Column(String),
    /// An aggregate call over a whole column
    Aggregate(AggregateCall),
    /// Unary operation: -expr
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// Binary operation: left op right
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    /// Visit every node, parents before children, left to right
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        visit(self);
        match self {
            Expr::Unary { operand, .. } => operand.walk(visit),
            Expr::Binary { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Expr::Number(_) | Expr::Null | Expr::Column(_) | Expr::Aggregate(_) => {}
        }
    }
}

/// A column that appears on the right-hand side of `/` or `%`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivisorColumn {
    pub column: String,
    /// The aggregate wrapping the column, `None` when read per row
    pub aggregate: Option<AggregateFunction>,
}

/// Error during parsing
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ParseError {}

impl From<TokenizeError> for ParseError {
    fn from(err: TokenizeError) -> Self {
        ParseError::new(err.message, err.position)
    }
}

/// A formula that passed syntax validation
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFormula {
    tokens: Vec<Token>,
    expr: Expr,
}

impl ParsedFormula {
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Every distinct column reference, aggregate arguments included,
    /// in order of first appearance
    pub fn column_references(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = Vec::new();
        for token in &self.tokens {
            if token.kind == TokenKind::Column && !columns.contains(&token.value.as_str()) {
                columns.push(&token.value);
            }
        }
        columns
    }

    /// Columns referenced outside any aggregate call (read per row)
    pub fn row_column_references(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = Vec::new();
        self.expr.walk(&mut |node| {
            if let Expr::Column(name) = node {
                if !columns.contains(&name.as_str()) {
                    columns.push(name);
                }
            }
        });
        columns
    }

    /// Distinct aggregate calls, in order of first appearance
    pub fn aggregate_calls(&self) -> Vec<&AggregateCall> {
        let mut calls: Vec<&AggregateCall> = Vec::new();
        self.expr.walk(&mut |node| {
            if let Expr::Aggregate(call) = node {
                if !calls.iter().any(|c| c.alias == call.alias) {
                    calls.push(call);
                }
            }
        });
        calls
    }

    pub fn has_aggregations(&self) -> bool {
        self.tokens.iter().any(|t| t.kind == TokenKind::Function)
    }

    /// Distinct aggregate function names used
    pub fn aggregation_functions(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Vec::new();
        for call in self.aggregate_calls() {
            let name = call.function.name();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    pub fn has_division(&self) -> bool {
        self.tokens
            .iter()
            .any(|t| t.is_operator("/") || t.is_operator("%"))
    }

    /// Deepest parenthesis nesting level
    pub fn nesting_depth(&self) -> usize {
        let mut depth = 0usize;
        let mut max_depth = 0usize;
        for token in &self.tokens {
            if token.is_open_paren() {
                depth += 1;
                max_depth = max_depth.max(depth);
            } else if token.is_close_paren() {
                depth = depth.saturating_sub(1);
            }
        }
        max_depth
    }

    /// Columns that can end up as the divisor of `/` or `%`
    pub fn divisor_columns(&self) -> Vec<DivisorColumn> {
        let mut found: Vec<DivisorColumn> = Vec::new();
        self.expr.walk(&mut |node| {
            if let Expr::Binary { op, right, .. } = node {
                if op.is_division() {
                    right.walk(&mut |inner| {
                        let divisor = match inner {
                            Expr::Column(name) => DivisorColumn {
                                column: name.clone(),
                                aggregate: None,
                            },
                            Expr::Aggregate(call) => DivisorColumn {
                                column: call.column.clone(),
                                aggregate: Some(call.function),
                            },
                            _ => return,
                        };
                        if !found.contains(&divisor) {
                            found.push(divisor);
                        }
                    });
                }
            }
        });
        found
    }
}

/// Parse and syntax-check a formula.
///
/// Never panics; every failure comes back as a `ParseError` whose message is
/// suitable for inline display next to the formula editor.
pub fn parse_formula(formula: &str) -> Result<ParsedFormula, ParseError> {
    if formula.trim().is_empty() {
        return Err(ParseError::new("Formula cannot be empty", 0));
    }

    let tokens = tokenize(formula)?;
    if tokens.is_empty() {
        return Err(ParseError::new("Formula cannot be empty", 0));
    }

    check_parentheses(&tokens)?;
    check_functions(&tokens)?;

    let expr = Parser::new(&tokens).parse()?;

    Ok(ParsedFormula {
        tokens,
        expr,
    })
}

/// Depth must never go negative and must end at zero
fn check_parentheses(tokens: &[Token]) -> Result<(), ParseError> {
    let mut depth: i64 = 0;
    for (i, token) in tokens.iter().enumerate() {
        if token.is_open_paren() {
            depth += 1;
        } else if token.is_close_paren() {
            depth -= 1;
            if depth < 0 {
                return Err(ParseError::new(
                    "Mismatched parentheses: unexpected closing parenthesis ')'",
                    i,
                ));
            }
        }
    }

    if depth > 0 {
        return Err(ParseError::new(
            format!(
                "Mismatched parentheses: {} unclosed opening parenthesis(es) '('",
                depth
            ),
            tokens.len(),
        ));
    }

    Ok(())
}

fn check_functions(tokens: &[Token]) -> Result<(), ParseError> {
    for (i, token) in tokens.iter().enumerate() {
        if token.kind == TokenKind::Function && AggregateFunction::from_name(&token.value).is_none()
        {
            return Err(ParseError::new(
                format!("Unknown function: {}", token.value),
                i,
            ));
        }
    }
    Ok(())
}

/// Deepest parenthesis or unary-sign nesting the parser will descend into
const MAX_PARSE_DEPTH: usize = 256;

/// Recursive-descent parser over a checked token stream
struct Parser<'a> {
    tokens: &'a [Token],
    position: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            position: 0,
            depth: 0,
        }
    }

    fn parse(mut self) -> Result<Expr, ParseError> {
        let expr = self.expression()?;

        if let Some(next) = self.peek() {
            let message = if starts_operand(next) {
                match self.previous() {
                    Some(prev) => format!("Missing operator between '{}' and '{}'", prev, next),
                    None => format!("Unexpected '{}'", next),
                }
            } else {
                format!("Unexpected '{}'", next)
            };
            return Err(ParseError::new(message, self.position));
        }

        Ok(expr)
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.position)
    }

    fn previous(&self) -> Option<&'a Token> {
        self.position
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.position);
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    /// Enter one nesting level; paired with `ascend`
    fn descend(&mut self, position: usize) -> Result<(), ParseError> {
        if self.depth >= MAX_PARSE_DEPTH {
            return Err(ParseError::new(
                format!(
                    "Formula is nested too deeply (more than {} levels)",
                    MAX_PARSE_DEPTH
                ),
                position,
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    /// Consume an operator if it is one of `ops`
    fn match_operator(&mut self, ops: &[&str]) -> Option<BinaryOp> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Operator && ops.contains(&t.value.as_str()) => {
                self.advance();
                BinaryOp::from_symbol(&t.value)
            }
            _ => None,
        }
    }

    /// Expression: term (( "+" | "-" ) term)*
    fn expression(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.term()?;

        while let Some(op) = self.match_operator(&["+", "-"]) {
            let right = self.term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// Term: unary (( "*" | "/" | "%" ) unary)*
    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.unary()?;

        while let Some(op) = self.match_operator(&["*", "/", "%"]) {
            let right = self.unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// Unary: ( "-" | "+" ) unary | primary
    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Some(t) if t.is_operator("-") => Some(UnaryOp::Neg),
            Some(t) if t.is_operator("+") => Some(UnaryOp::Plus),
            _ => None,
        };

        match op {
            Some(op) => {
                self.descend(self.position)?;
                self.advance();
                let operand = self.unary()?;
                self.ascend();
                Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                })
            }
            None => self.primary(),
        }
    }

    /// Primary: NUMBER | COLUMN | FUNCTION "(" COLUMN ")" | "(" expression ")"
    fn primary(&mut self) -> Result<Expr, ParseError> {
        let position = self.position;
        let Some(token) = self.advance() else {
            let message = match self.previous() {
                Some(prev) => format!("Formula ends unexpectedly after '{}'", prev),
                None => "Unexpected end of formula".to_string(),
            };
            return Err(ParseError::new(message, position));
        };

        match token.kind {
            TokenKind::Number => token.value.parse::<f64>().map(Expr::Number).map_err(|_| {
                ParseError::new(format!("Invalid number: {}", token.value), position)
            }),
            TokenKind::Column => Ok(Expr::Column(token.value.clone())),
            TokenKind::Function => self.aggregate_call(token, position),
            TokenKind::Paren if token.is_open_paren() => {
                if self.peek().is_some_and(Token::is_close_paren) {
                    return Err(ParseError::new("Empty parentheses '()'", position));
                }
                self.descend(position)?;
                let expr = self.expression()?;
                self.ascend();
                match self.advance() {
                    Some(t) if t.is_close_paren() => Ok(expr),
                    _ => Err(ParseError::new(
                        "Expected ')' after expression",
                        self.position,
                    )),
                }
            }
            TokenKind::Paren | TokenKind::Operator => Err(ParseError::new(
                format!("Unexpected '{}'", token),
                position,
            )),
        }
    }

    /// FUNCTION "(" COLUMN ")" - exactly one column, no nesting
    fn aggregate_call(&mut self, name: &Token, position: usize) -> Result<Expr, ParseError> {
        let function = AggregateFunction::from_name(&name.value)
            .ok_or_else(|| ParseError::new(format!("Unknown function: {}", name.value), position))?;

        let open = self.advance();
        let column = self.advance();
        let close = self.advance();

        match (open, column, close) {
            (Some(o), Some(c), Some(cl))
                if o.is_open_paren() && c.kind == TokenKind::Column && cl.is_close_paren() =>
            {
                Ok(Expr::Aggregate(AggregateCall::new(function, c.value.clone())))
            }
            _ => Err(ParseError::new(
                format!(
                    "{name} expects a single column reference, e.g. {name}(Revenue)",
                    name = function.name()
                ),
                position,
            )),
        }
    }
}

fn starts_operand(token: &Token) -> bool {
    matches!(
        token.kind,
        TokenKind::Number | TokenKind::Column | TokenKind::Function
    ) || token.is_open_paren()
}
