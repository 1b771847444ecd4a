//! Token types for the mustache expression lexer.

use crate::Location;

/// Token types produced inside `{{ ... }}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    /// Dotted identifier: `title`, `this.title`, `@index`, `as`
    Path,
    /// Quoted string literal (value is unquoted)
    String,
    /// Numeric literal
    Number,
    /// `=` - hash pair separator
    Equal,
    /// `(` - sub-expression open
    OpenParen,
    /// `)` - sub-expression close
    CloseParen,
    /// `|` - block param delimiter
    Pipe,
    /// End of the tag contents
    Eof,
}

impl TokenType {
    /// Fixed literal for punctuation tokens.
    pub fn literal(self) -> Option<&'static str> {
        match self {
            TokenType::Equal => Some("="),
            TokenType::OpenParen => Some("("),
            TokenType::CloseParen => Some(")"),
            TokenType::Pipe => Some("|"),
            _ => None,
        }
    }
}

/// A token with its type, value, and location.
#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    pub value: String,
    pub location: Location,
}

impl Token {
    pub fn new(token_type: TokenType, value: impl Into<String>, location: Location) -> Self {
        Self {
            token_type,
            value: value.into(),
            location,
        }
    }
}
