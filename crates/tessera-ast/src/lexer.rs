//! Lexer for the contents of a single mustache tag.
//!
//! The markup scanner in `parser.rs` locates `{{ ... }}` and hands the inner
//! text here. Whitespace only separates tokens and is not emitted.

use crate::token::{Token, TokenType};
use crate::{Location, ParseError};

/// Tokenize the inner text of a tag. `origin` is the location of its first byte.
pub fn tokenize(source: &str, origin: Location) -> Result<Vec<Token>, ParseError> {
    let mut lexer = Lexer::new(source, origin);
    lexer.tokenize()
}

struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    origin: Location,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str, origin: Location) -> Self {
        Self {
            source: source.as_bytes(),
            pos: 0,
            origin,
        }
    }

    fn tokenize(&mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();

        while self.pos < self.source.len() {
            let loc = self.location();
            let ch = self.source[self.pos];

            match ch {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                b'=' => self.emit_fixed(&mut tokens, TokenType::Equal, loc),
                b'(' => self.emit_fixed(&mut tokens, TokenType::OpenParen, loc),
                b')' => self.emit_fixed(&mut tokens, TokenType::CloseParen, loc),
                b'|' => self.emit_fixed(&mut tokens, TokenType::Pipe, loc),
                b'"' | b'\'' => tokens.push(self.tokenize_string(ch, loc)?),
                b'0'..=b'9' => tokens.push(self.tokenize_number(loc)?),
                b'-' if self.peek_is_digit() => tokens.push(self.tokenize_number(loc)?),
                _ if Self::is_path_byte(ch) => tokens.push(self.tokenize_path(loc)),
                _ => {
                    let ch = self.current_char();
                    return Err(ParseError::UnexpectedCharacter {
                        ch,
                        line: loc.line,
                        column: loc.column,
                    });
                }
            }
        }

        tokens.push(Token::new(TokenType::Eof, "", self.location()));
        Ok(tokens)
    }

    fn tokenize_string(&mut self, quote: u8, loc: Location) -> Result<Token, ParseError> {
        self.pos += 1;
        let mut value = Vec::new();
        loop {
            match self.source.get(self.pos) {
                None => {
                    return Err(ParseError::Unterminated {
                        what: "string literal",
                        line: loc.line,
                        column: loc.column,
                    })
                }
                Some(b'\\') if self.source.get(self.pos + 1) == Some(&quote) => {
                    value.push(quote);
                    self.pos += 2;
                }
                Some(&b) if b == quote => {
                    self.pos += 1;
                    break;
                }
                Some(&b) => {
                    value.push(b);
                    self.pos += 1;
                }
            }
        }
        let value = String::from_utf8_lossy(&value).into_owned();
        Ok(Token::new(TokenType::String, value, loc))
    }

    fn tokenize_number(&mut self, loc: Location) -> Result<Token, ParseError> {
        let start = self.pos;
        if self.source[self.pos] == b'-' {
            self.pos += 1;
        }
        while self.pos < self.source.len() && matches!(self.source[self.pos], b'0'..=b'9' | b'.')
        {
            self.pos += 1;
        }
        let text = self.slice(start);
        if text.parse::<f64>().is_err() {
            return Err(ParseError::UnexpectedToken {
                message: format!("invalid number literal '{text}'"),
                line: loc.line,
                column: loc.column,
            });
        }
        Ok(Token::new(TokenType::Number, text, loc))
    }

    fn tokenize_path(&mut self, loc: Location) -> Token {
        let start = self.pos;
        while self.pos < self.source.len() && Self::is_path_byte(self.source[self.pos]) {
            self.pos += 1;
        }
        Token::new(TokenType::Path, self.slice(start), loc)
    }

    /// Emit a token with fixed literal text and advance by its byte length.
    fn emit_fixed(&mut self, tokens: &mut Vec<Token>, token_type: TokenType, loc: Location) {
        let literal = token_type.literal().unwrap_or_default();
        tokens.push(Token::new(token_type, literal, loc));
        self.pos += literal.len().max(1);
    }

    fn is_path_byte(b: u8) -> bool {
        b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b'@' | b'$' | b':') || b >= 0x80
    }

    fn peek_is_digit(&self) -> bool {
        self.source
            .get(self.pos + 1)
            .is_some_and(|b| b.is_ascii_digit())
    }

    fn current_char(&self) -> char {
        std::str::from_utf8(&self.source[self.pos..])
            .ok()
            .and_then(|s| s.chars().next())
            .unwrap_or('\u{FFFD}')
    }

    fn slice(&self, start: usize) -> String {
        String::from_utf8_lossy(&self.source[start..self.pos]).into_owned()
    }

    fn location(&self) -> Location {
        self.origin.offset(self.pos)
    }
}
