//! Formula tokenizer
//!
//! Converts formula strings like "SUM([Total Sales]) / Orders" into a flat
//! sequence of typed tokens that the parser walks.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::iter::Peekable;
use std::str::Chars;

/// Anything outside this set is rejected before tokenizing.
static INVALID_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_\s\[\]().,+\-*/%]").expect("valid regex"));

/// Kind of a formula token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// A numeric literal (e.g., 100, 0.25, .5)
    Number,
    /// A column reference, bare (`Revenue`) or bracketed (`[Total Sales]`)
    Column,
    /// One of `+ - * / %`
    Operator,
    /// An identifier directly followed by `(`
    Function,
    /// `(` or `)`
    Paren,
}

/// A token in a formula expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn number(value: impl Into<String>) -> Self {
        Self::new(TokenKind::Number, value)
    }

    pub fn column(value: impl Into<String>) -> Self {
        Self::new(TokenKind::Column, value)
    }

    pub fn operator(value: impl Into<String>) -> Self {
        Self::new(TokenKind::Operator, value)
    }

    pub fn function(value: impl Into<String>) -> Self {
        Self::new(TokenKind::Function, value)
    }

    pub fn paren(value: impl Into<String>) -> Self {
        Self::new(TokenKind::Paren, value)
    }

    pub fn is_open_paren(&self) -> bool {
        self.kind == TokenKind::Paren && self.value == "("
    }

    pub fn is_close_paren(&self) -> bool {
        self.kind == TokenKind::Paren && self.value == ")"
    }

    pub fn is_operator(&self, op: &str) -> bool {
        self.kind == TokenKind::Operator && self.value == op
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            TokenKind::Column if self.value.contains(' ') => write!(f, "[{}]", self.value),
            _ => write!(f, "{}", self.value),
        }
    }
}

/// Error during tokenization
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizeError {
    pub message: String,
    pub position: usize,
}

impl TokenizeError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl std::fmt::Display for TokenizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Tokenize error at position {}: {}",
            self.position, self.message
        )
    }
}

impl std::error::Error for TokenizeError {}

/// Tokenizer for formula expressions
pub struct Tokenizer<'a> {
    source: &'a str,
    chars: Peekable<Chars<'a>>,
    position: usize,
}

impl<'a> Tokenizer<'a> {
    /// Create a new tokenizer for the given formula string
    pub fn new(formula: &'a str) -> Self {
        // Tolerate a spreadsheet-style leading '='
        let trimmed = formula.trim_start();
        let formula = trimmed.strip_prefix('=').unwrap_or(trimmed);
        Self {
            source: formula,
            chars: formula.chars().peekable(),
            position: 0,
        }
    }

    /// Tokenize the entire formula into a vector of tokens
    pub fn tokenize(mut self) -> Result<Vec<Token>, TokenizeError> {
        self.check_characters()?;

        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }

        Ok(tokens)
    }

    /// Reject the whole formula up front if it contains illegal characters
    fn check_characters(&self) -> Result<(), TokenizeError> {
        let mut offending: Vec<char> = Vec::new();
        let mut first_position = None;

        for m in INVALID_CHARS.find_iter(self.source) {
            if first_position.is_none() {
                first_position = Some(self.source[..m.start()].chars().count());
            }
            for c in m.as_str().chars() {
                if !offending.contains(&c) {
                    offending.push(c);
                }
            }
        }

        match first_position {
            None => Ok(()),
            Some(position) => {
                let listed: Vec<String> = offending.iter().map(|c| format!("'{}'", c)).collect();
                Err(TokenizeError::new(
                    format!("Formula contains invalid characters: {}", listed.join(", ")),
                    position,
                ))
            }
        }
    }

    /// Get the next token, or None if at end of input
    fn next_token(&mut self) -> Result<Option<Token>, TokenizeError> {
        self.skip_whitespace();

        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let token = match c {
            '(' | ')' => {
                self.advance();
                Token::paren(c.to_string())
            }
            '+' | '-' | '*' | '/' | '%' => {
                self.advance();
                Token::operator(c.to_string())
            }
            '[' => self.read_bracketed_column()?,
            c if c.is_ascii_digit() => self.read_number(),
            '.' => {
                // Only a number if a digit follows (".5")
                let start = self.position;
                self.advance();
                match self.peek() {
                    Some(d) if d.is_ascii_digit() => self.read_fraction(String::from("0.")),
                    _ => {
                        return Err(TokenizeError::new("Unexpected character '.'", start));
                    }
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => self.read_identifier(),
            c => {
                return Err(TokenizeError::new(
                    format!("Unexpected character '{}'", c),
                    self.position,
                ));
            }
        };

        Ok(Some(token))
    }

    /// Peek at the next character without consuming it
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    /// Advance to the next character
    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c.is_some() {
            self.position += 1;
        }
        c
    }

    /// Skip whitespace characters
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Consume characters while `pred` holds, appending them to `buf`
    fn take_while(&mut self, buf: &mut String, pred: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            buf.push(c);
            self.advance();
        }
    }

    /// Read a decimal number (integer part, optional fraction)
    fn read_number(&mut self) -> Token {
        let mut num = String::new();
        self.take_while(&mut num, |c| c.is_ascii_digit());

        if self.peek() == Some('.') {
            self.advance();
            num.push('.');
            return self.read_fraction(num);
        }

        Token::number(num)
    }

    /// Read the digits after a decimal point
    fn read_fraction(&mut self, mut num: String) -> Token {
        self.take_while(&mut num, |c| c.is_ascii_digit());
        Token::number(num)
    }

    /// Read `[Column Name]` as a single column token
    fn read_bracketed_column(&mut self) -> Result<Token, TokenizeError> {
        let start = self.position;
        self.advance(); // consume '['

        let mut name = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(TokenizeError::new(
                        "Unclosed column reference: missing ']'",
                        start,
                    ));
                }
                Some(']') => break,
                Some(c) => name.push(c),
            }
        }

        let name = name.trim();
        if name.is_empty() {
            return Err(TokenizeError::new("Empty column reference '[]'", start));
        }

        Ok(Token::column(name))
    }

    /// Read a bare identifier; it is a function name when `(` follows
    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();
        self.take_while(&mut ident, |c| c.is_ascii_alphanumeric() || c == '_');

        self.skip_whitespace();
        if self.peek() == Some('(') {
            Token::function(ident)
        } else {
            Token::column(ident)
        }
    }
}

/// Convenience function to tokenize a formula string
pub fn tokenize(formula: &str) -> Result<Vec<Token>, TokenizeError> {
    Tokenizer::new(formula).tokenize()
}
