//! Recursive descent parser for Tessera templates.
//!
//! Scans markup directly (elements, attributes, text, comments) and hands the
//! inside of every `{{ ... }}` tag to the expression lexer. Supports
//! `~` whitespace control on either side of a tag, `{{else}}` and
//! `{{else name ...}}` chains, and `as |a b|` block params.

use crate::lexer;
use crate::token::{Token, TokenType};
use crate::{
    is_raw_text_element, is_void_element, AttrPart, AttrValue, Attribute, BlockNode, CommentKind,
    CommentNode, Document, ElementNode, Expr, Hash, HashPair, Literal, LiteralExpr, Location,
    MustacheNode, Node, ParseError, PartialNode, PathExpr, Program, SubExpression, TextNode,
};

/// Parse a full template source.
pub fn parse(source: &str) -> Result<Document, ParseError> {
    let mut parser = Parser::new(source);
    let (nodes, stop) = parser.parse_nodes(None)?;
    match stop {
        Stop::Eof => Ok(Document::new(nodes, Location::new(1, 1, 0))),
        Stop::Else(tag) => Err(ParseError::UnexpectedToken {
            message: "'{{else}}' outside of a block".to_string(),
            line: tag.start.line,
            column: tag.start.column,
        }),
        Stop::CloseBlock { name, location } => Err(ParseError::UnexpectedToken {
            message: format!("'{{{{/{name}}}}}' without a matching block"),
            line: location.line,
            column: location.column,
        }),
        Stop::CloseElement { tag, location } => Err(ParseError::UnexpectedToken {
            message: format!("'</{tag}>' without a matching element"),
            line: location.line,
            column: location.column,
        }),
    }
}

/// Why a run of sibling nodes ended.
enum Stop {
    Eof,
    Else(Tag),
    CloseBlock { name: String, location: Location },
    CloseElement { tag: String, location: Location },
}

/// Raw `{{ ... }}` tag as found in the source.
struct Tag {
    inner: String,
    inner_location: Location,
    start: Location,
    strip_before: bool,
    strip_after: bool,
    trusting: bool,
}

impl Tag {
    /// Text following a leading marker (`#`, `>`, `else`) and its location.
    fn body_after(&self, marker_len: usize) -> (&str, Location) {
        let leading = self.inner.len() - self.inner.trim_start().len();
        let offset = (leading + marker_len).min(self.inner.len());
        (&self.inner[offset..], self.inner_location.offset(offset))
    }
}

struct BlockHeader {
    path: PathExpr,
    params: Vec<Expr>,
    hash: Hash,
    block_params: Vec<String>,
}

struct Parser<'a> {
    source: &'a str,
    pos: usize,
    line: usize,
    col: usize,
    strip_next: bool,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
            col: 1,
            strip_next: false,
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn parse_nodes(&mut self, raw_text: Option<&str>) -> Result<(Vec<Node>, Stop), ParseError> {
        let mut nodes = Vec::new();

        loop {
            if self.at_end() {
                return Ok((nodes, Stop::Eof));
            }

            if self.looking_at("{{!") {
                self.strip_next = false;
                nodes.push(self.parse_doc_comment()?);
                continue;
            }

            if self.looking_at("{{") {
                let tag = self.read_tag()?;
                if tag.strip_before {
                    trim_trailing_text(&mut nodes);
                }
                self.strip_next = tag.strip_after;

                let inner = tag.inner.trim();
                if inner.starts_with('#') {
                    let (text, location) = tag.body_after(1);
                    let header = self.parse_block_header(text, location)?;
                    let close_name = header.path.original.clone();
                    let block = self.parse_block_rest(&close_name, tag.start, header, raw_text)?;
                    nodes.push(Node::Block(block));
                } else if let Some(name) = inner.strip_prefix('/') {
                    return Ok((
                        nodes,
                        Stop::CloseBlock {
                            name: name.trim().to_string(),
                            location: tag.start,
                        },
                    ));
                } else if inner == "else" || inner.starts_with("else ") {
                    return Ok((nodes, Stop::Else(tag)));
                } else if let Some(name) = inner.strip_prefix('>') {
                    nodes.push(Node::Partial(PartialNode {
                        name: name.split_whitespace().next().unwrap_or_default().to_string(),
                        location: tag.start,
                    }));
                } else {
                    nodes.push(Node::Mustache(self.parse_mustache(&tag)?));
                }
                continue;
            }

            match raw_text {
                Some(tag) => {
                    if self.looking_at_close_tag(tag) {
                        let (tag, location) = self.read_close_tag()?;
                        return Ok((nodes, Stop::CloseElement { tag, location }));
                    }
                }
                None => {
                    if self.looking_at("<!--") {
                        self.strip_next = false;
                        nodes.push(self.parse_markup_comment()?);
                        continue;
                    }
                    if self.looking_at("</") {
                        let (tag, location) = self.read_close_tag()?;
                        return Ok((nodes, Stop::CloseElement { tag, location }));
                    }
                    if self.at_element_start() {
                        self.strip_next = false;
                        nodes.push(self.parse_element()?);
                        continue;
                    }
                }
            }

            self.parse_text(&mut nodes, raw_text);
        }
    }

    fn parse_text(&mut self, nodes: &mut Vec<Node>, raw_text: Option<&str>) {
        let location = self.location();
        let start = self.pos;

        loop {
            self.advance();
            if self.at_end() || self.looking_at("{{") {
                break;
            }
            let boundary = match raw_text {
                Some(tag) => self.looking_at_close_tag(tag),
                None => self.at_markup_start(),
            };
            if boundary {
                break;
            }
        }

        let mut chars = self.source[start..self.pos].to_string();
        if std::mem::take(&mut self.strip_next) {
            chars = chars.trim_start().to_string();
        }
        if !chars.is_empty() {
            nodes.push(Node::Text(TextNode { chars, location }));
        }
    }

    fn parse_doc_comment(&mut self) -> Result<Node, ParseError> {
        let location = self.location();
        let (open, close) = if self.looking_at("{{!--") {
            ("{{!--", "--}}")
        } else {
            ("{{!", "}}")
        };
        self.advance_n(open.len());
        let value = self.read_until(close, "comment", location)?;
        Ok(Node::Comment(CommentNode {
            value: value.trim().to_string(),
            kind: CommentKind::Doc,
            location,
        }))
    }

    fn parse_markup_comment(&mut self) -> Result<Node, ParseError> {
        let location = self.location();
        self.advance_n("<!--".len());
        let value = self.read_until("-->", "comment", location)?;
        Ok(Node::Comment(CommentNode {
            value,
            kind: CommentKind::Markup,
            location,
        }))
    }

    // ========================================================================
    // Mustaches and blocks
    // ========================================================================

    fn read_tag(&mut self) -> Result<Tag, ParseError> {
        let start = self.location();
        self.advance_n(2);
        let trusting = self.looking_at("{");
        if trusting {
            self.advance();
        }
        let strip_before = self.looking_at("~");
        if strip_before {
            self.advance();
        }

        let inner_location = self.location();
        let inner_start = self.pos;
        let mut quote: Option<char> = None;
        loop {
            let Some(c) = self.peek() else {
                return Err(ParseError::Unterminated {
                    what: "mustache tag",
                    line: start.line,
                    column: start.column,
                });
            };
            match quote {
                Some(q) => {
                    if c == '\\' {
                        self.advance();
                    } else if c == q {
                        quote = None;
                    }
                    self.advance();
                }
                None if c == '"' || c == '\'' => {
                    quote = Some(c);
                    self.advance();
                }
                None if self.looking_at("}}") => break,
                None => self.advance(),
            }
        }

        let raw = &self.source[inner_start..self.pos];
        let trimmed = raw.trim_end();
        let (inner, strip_after) = match trimmed.strip_suffix('~') {
            Some(inner) => (inner.to_string(), true),
            None => (raw.to_string(), false),
        };
        self.advance_n(2);

        if trusting {
            if !self.looking_at("}") {
                return Err(ParseError::Unterminated {
                    what: "triple-stash tag",
                    line: start.line,
                    column: start.column,
                });
            }
            self.advance();
        }

        Ok(Tag {
            inner,
            inner_location,
            start,
            strip_before,
            strip_after,
            trusting,
        })
    }

    fn parse_mustache(&mut self, tag: &Tag) -> Result<MustacheNode, ParseError> {
        let mut exprs = ExprParser::new(lexer::tokenize(&tag.inner, tag.inner_location)?);
        if exprs.current_type() == TokenType::Eof {
            return Err(ParseError::UnexpectedToken {
                message: "empty mustache".to_string(),
                line: tag.start.line,
                column: tag.start.column,
            });
        }
        let path = exprs.parse_expr()?;
        let (params, hash) = exprs.parse_params_and_hash()?;
        exprs.expect_eof()?;
        Ok(MustacheNode {
            path,
            params,
            hash,
            trusting: tag.trusting,
            location: tag.start,
        })
    }

    fn parse_block_header(
        &mut self,
        text: &str,
        location: Location,
    ) -> Result<BlockHeader, ParseError> {
        let mut exprs = ExprParser::new(lexer::tokenize(text, location)?);
        let path = exprs.expect_path()?;
        let (params, hash) = exprs.parse_params_and_hash()?;
        let block_params = exprs.parse_block_params()?;
        exprs.expect_eof()?;
        Ok(BlockHeader {
            path,
            params,
            hash,
            block_params,
        })
    }

    /// Parse a block body after its opening tag, through the matching close tag.
    /// An `{{else name ...}}` chain becomes a nested block that shares the close tag.
    fn parse_block_rest(
        &mut self,
        close_name: &str,
        open: Location,
        header: BlockHeader,
        raw_text: Option<&str>,
    ) -> Result<BlockNode, ParseError> {
        let (body, stop) = self.parse_nodes(raw_text)?;
        let program = Program {
            body,
            block_params: header.block_params,
            location: open,
        };

        let inverse = match stop {
            Stop::CloseBlock { name, location } => {
                check_block_close(close_name, &name, location)?;
                None
            }
            Stop::Else(tag) => {
                if tag.inner.trim() == "else" {
                    let (body, stop) = self.parse_nodes(raw_text)?;
                    match stop {
                        Stop::CloseBlock { name, location } => {
                            check_block_close(close_name, &name, location)?
                        }
                        _ => return Err(unclosed_block(close_name, open)),
                    }
                    Some(Program {
                        body,
                        block_params: Vec::new(),
                        location: tag.start,
                    })
                } else {
                    let (text, location) = tag.body_after("else".len());
                    let chained_header = self.parse_block_header(text, location)?;
                    let chained =
                        self.parse_block_rest(close_name, tag.start, chained_header, raw_text)?;
                    Some(Program {
                        body: vec![Node::Block(chained)],
                        block_params: Vec::new(),
                        location: tag.start,
                    })
                }
            }
            Stop::Eof | Stop::CloseElement { .. } => return Err(unclosed_block(close_name, open)),
        };

        Ok(BlockNode {
            path: header.path,
            params: header.params,
            hash: header.hash,
            program,
            inverse,
            location: open,
        })
    }

    // ========================================================================
    // Elements
    // ========================================================================

    fn parse_element(&mut self) -> Result<Node, ParseError> {
        let location = self.location();
        self.advance();
        let tag = self.read_while(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'));

        let mut attributes = Vec::new();
        let self_closing = loop {
            self.skip_whitespace();
            if self.at_end() {
                return Err(ParseError::Unterminated {
                    what: "start tag",
                    line: location.line,
                    column: location.column,
                });
            }
            if self.looking_at("/>") {
                self.advance_n(2);
                break true;
            }
            if self.looking_at(">") {
                self.advance();
                break false;
            }
            attributes.push(self.parse_attribute()?);
        };

        if self_closing || is_void_element(&tag) {
            return Ok(Node::Element(ElementNode {
                tag,
                attributes,
                children: Vec::new(),
                location,
            }));
        }

        let raw = is_raw_text_element(&tag).then(|| tag.clone());
        let (children, stop) = self.parse_nodes(raw.as_deref())?;
        match stop {
            Stop::CloseElement {
                tag: found,
                location: close,
            } => {
                if !found.eq_ignore_ascii_case(&tag) {
                    return Err(ParseError::MismatchedElement {
                        expected: tag,
                        found,
                        line: close.line,
                        column: close.column,
                    });
                }
            }
            Stop::Else(tag_found) => {
                return Err(ParseError::UnexpectedToken {
                    message: format!("'{{{{else}}}}' inside element <{tag}>"),
                    line: tag_found.start.line,
                    column: tag_found.start.column,
                })
            }
            Stop::Eof | Stop::CloseBlock { .. } => {
                return Err(ParseError::UnclosedElement {
                    tag,
                    line: location.line,
                    column: location.column,
                })
            }
        }

        Ok(Node::Element(ElementNode {
            tag,
            attributes,
            children,
            location,
        }))
    }

    fn parse_attribute(&mut self) -> Result<Attribute, ParseError> {
        let location = self.location();
        let name =
            self.read_while(|c| !c.is_whitespace() && !matches!(c, '=' | '>' | '/' | '"' | '\''));
        if name.is_empty() {
            let ch = self.peek().unwrap_or('\u{FFFD}');
            return Err(ParseError::UnexpectedCharacter {
                ch,
                line: location.line,
                column: location.column,
            });
        }

        self.skip_whitespace();
        if !self.looking_at("=") {
            return Ok(Attribute {
                name,
                value: AttrValue::Text(String::new()),
                location,
            });
        }
        self.advance();
        self.skip_whitespace();

        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => self.parse_quoted_attr_value(quote, location)?,
            Some(_) if self.looking_at("{{") => {
                let tag = self.read_tag()?;
                AttrValue::Mustache(self.parse_mustache(&tag)?)
            }
            _ => AttrValue::Text(self.read_while(|c| !c.is_whitespace() && c != '>')),
        };

        Ok(Attribute {
            name,
            value,
            location,
        })
    }

    fn parse_quoted_attr_value(
        &mut self,
        quote: char,
        location: Location,
    ) -> Result<AttrValue, ParseError> {
        self.advance();
        let mut parts = Vec::new();
        let mut text = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(ParseError::Unterminated {
                        what: "attribute value",
                        line: location.line,
                        column: location.column,
                    })
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some(_) if self.looking_at("{{") => {
                    if !text.is_empty() {
                        parts.push(AttrPart::Text(std::mem::take(&mut text)));
                    }
                    let tag = self.read_tag()?;
                    parts.push(AttrPart::Mustache(self.parse_mustache(&tag)?));
                }
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
            }
        }

        if parts.is_empty() {
            return Ok(AttrValue::Text(text));
        }
        if !text.is_empty() {
            parts.push(AttrPart::Text(text));
        }
        Ok(AttrValue::Concat(parts))
    }

    fn read_close_tag(&mut self) -> Result<(String, Location), ParseError> {
        let location = self.location();
        self.advance_n(2);
        let tag = self.read_while(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'));
        self.skip_whitespace();
        if !self.looking_at(">") {
            let ch = self.peek().unwrap_or('\u{FFFD}');
            let here = self.location();
            return Err(ParseError::UnexpectedCharacter {
                ch,
                line: here.line,
                column: here.column,
            });
        }
        self.advance();
        Ok((tag, location))
    }

    // ========================================================================
    // Scanning helpers
    // ========================================================================

    fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn looking_at(&self, pattern: &str) -> bool {
        self.source[self.pos..].starts_with(pattern)
    }

    fn looking_at_close_tag(&self, tag: &str) -> bool {
        let rest = &self.source[self.pos..];
        rest.starts_with("</")
            && rest
                .get(2..2 + tag.len())
                .is_some_and(|name| name.eq_ignore_ascii_case(tag))
    }

    fn at_element_start(&self) -> bool {
        let mut chars = self.source[self.pos..].chars();
        chars.next() == Some('<') && chars.next().is_some_and(|c| c.is_alphabetic())
    }

    fn at_markup_start(&self) -> bool {
        self.at_element_start() || self.looking_at("</") || self.looking_at("<!--")
    }

    fn read_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.advance();
        }
        self.source[start..self.pos].to_string()
    }

    fn read_until(
        &mut self,
        terminator: &str,
        what: &'static str,
        start: Location,
    ) -> Result<String, ParseError> {
        let begin = self.pos;
        while !self.looking_at(terminator) {
            if self.at_end() {
                return Err(ParseError::Unterminated {
                    what,
                    line: start.line,
                    column: start.column,
                });
            }
            self.advance();
        }
        let value = self.source[begin..self.pos].to_string();
        self.advance_n(terminator.len());
        Ok(value)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    /// Advance one character, updating line/column tracking.
    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
            self.pos += c.len_utf8();
        }
    }

    /// Advance over an ASCII pattern of `n` bytes.
    fn advance_n(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    fn location(&self) -> Location {
        Location::new(self.line, self.col, self.pos)
    }
}

fn trim_trailing_text(nodes: &mut Vec<Node>) {
    if let Some(Node::Text(text)) = nodes.last_mut() {
        let trimmed_len = text.chars.trim_end().len();
        text.chars.truncate(trimmed_len);
        if text.chars.is_empty() {
            nodes.pop();
        }
    }
}

fn check_block_close(expected: &str, found: &str, location: Location) -> Result<(), ParseError> {
    if expected == found {
        return Ok(());
    }
    Err(ParseError::MismatchedBlock {
        expected: expected.to_string(),
        found: found.to_string(),
        line: location.line,
        column: location.column,
    })
}

fn unclosed_block(name: &str, open: Location) -> ParseError {
    ParseError::UnclosedBlock {
        name: name.to_string(),
        line: open.line,
        column: open.column,
    }
}

// ============================================================================
// Expressions inside a tag
// ============================================================================

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let token = self.current().clone();
        match token.token_type {
            TokenType::Path => {
                self.advance();
                let literal = match token.value.as_str() {
                    "true" => Some(Literal::Boolean(true)),
                    "false" => Some(Literal::Boolean(false)),
                    "null" => Some(Literal::Null),
                    "undefined" => Some(Literal::Undefined),
                    _ => None,
                };
                Ok(match literal {
                    Some(value) => Expr::Literal(LiteralExpr {
                        value,
                        location: token.location,
                    }),
                    None => Expr::Path(PathExpr::from_original(&token.value, token.location)),
                })
            }
            TokenType::String => {
                self.advance();
                Ok(Expr::Literal(LiteralExpr {
                    value: Literal::String(token.value),
                    location: token.location,
                }))
            }
            TokenType::Number => {
                self.advance();
                let number = token.value.parse::<f64>().unwrap_or_default();
                Ok(Expr::Literal(LiteralExpr {
                    value: Literal::Number(number),
                    location: token.location,
                }))
            }
            TokenType::OpenParen => {
                self.advance();
                let path = self.expect_path()?;
                let (params, hash) = self.parse_params_and_hash()?;
                self.consume(TokenType::CloseParen)?;
                Ok(Expr::SubExpression(Box::new(SubExpression {
                    path,
                    params,
                    hash,
                    location: token.location,
                })))
            }
            _ => Err(self.unexpected("expected an expression")),
        }
    }

    fn parse_params_and_hash(&mut self) -> Result<(Vec<Expr>, Hash), ParseError> {
        let mut params = Vec::new();
        let mut hash = Hash::default();

        loop {
            match self.current_type() {
                TokenType::Eof | TokenType::CloseParen => break,
                TokenType::Path if self.at_block_params() => break,
                TokenType::Path if self.peek_type(1) == TokenType::Equal => {
                    let key = self.consume(TokenType::Path)?;
                    self.consume(TokenType::Equal)?;
                    let value = self.parse_expr()?;
                    hash.pairs.push(HashPair {
                        key: key.value,
                        value,
                        location: key.location,
                    });
                }
                _ => {
                    if !hash.is_empty() {
                        return Err(self.unexpected("positional argument after key=value pairs"));
                    }
                    params.push(self.parse_expr()?);
                }
            }
        }

        Ok((params, hash))
    }

    fn parse_block_params(&mut self) -> Result<Vec<String>, ParseError> {
        let mut names = Vec::new();
        if !self.at_block_params() {
            return Ok(names);
        }
        self.advance();
        self.consume(TokenType::Pipe)?;
        while self.current_type() == TokenType::Path {
            names.push(self.consume(TokenType::Path)?.value);
        }
        self.consume(TokenType::Pipe)?;
        Ok(names)
    }

    fn expect_path(&mut self) -> Result<PathExpr, ParseError> {
        let token = self.consume(TokenType::Path)?;
        Ok(PathExpr::from_original(&token.value, token.location))
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        if self.current_type() == TokenType::Eof {
            Ok(())
        } else {
            Err(self.unexpected("unexpected trailing input"))
        }
    }

    fn at_block_params(&self) -> bool {
        self.current_type() == TokenType::Path
            && self.current().value == "as"
            && self.peek_type(1) == TokenType::Pipe
    }

    fn current(&self) -> &Token {
        // tokenize always terminates the stream with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn current_type(&self) -> TokenType {
        self.current().token_type
    }

    fn peek_type(&self, ahead: usize) -> TokenType {
        self.tokens
            .get(self.pos + ahead)
            .map(|t| t.token_type)
            .unwrap_or(TokenType::Eof)
    }

    fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn consume(&mut self, expected: TokenType) -> Result<Token, ParseError> {
        let token = self.current().clone();
        if token.token_type != expected {
            return Err(ParseError::UnexpectedToken {
                message: format!("expected {:?}, got {:?}", expected, token.token_type),
                line: token.location.line,
                column: token.location.column,
            });
        }
        self.advance();
        Ok(token)
    }

    fn unexpected(&self, message: &str) -> ParseError {
        let token = self.current();
        ParseError::UnexpectedToken {
            message: format!("{message}: {:?} '{}'", token.token_type, token.value),
            line: token.location.line,
            column: token.location.column,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::*;
    use pretty_assertions::assert_eq;

    fn first(source: &str) -> Node {
        parse(source).unwrap().nodes()[0].clone()
    }

    #[test]
    fn test_parse_elements_and_mustaches() {
        let doc = parse("<h1>{{title}}</h1><p>{{body}}</p>").unwrap();
        assert_eq!(doc.nodes().len(), 2);
        let Node::Element(h1) = &doc.nodes()[0] else {
            panic!("expected element");
        };
        assert_eq!(h1.tag, "h1");
        let Node::Mustache(m) = &h1.children[0] else {
            panic!("expected mustache");
        };
        assert_eq!(m.path.as_path().unwrap().parts, vec!["title"]);
    }

    #[test]
    fn test_parse_block_with_else() {
        let Node::Block(block) = first("{{#each @items}}{{this}}{{else}}none{{/each}}") else {
            panic!("expected block");
        };
        assert_eq!(block.path.original, "each");
        assert!(block.params[0].as_path().unwrap().data_rooted);
        assert_eq!(block.program.body.len(), 1);
        let inverse = block.inverse.unwrap();
        assert_eq!(
            inverse.body,
            vec![Node::Text(TextNode {
                chars: "none".to_string(),
                location: inverse.body[0].location(),
            })]
        );
    }

    #[test]
    fn test_parse_block_params_and_hash() {
        let Node::Block(block) =
            first("{{#collection posts limit=3 sortable=true as |post|}}{{post.title}}{{/collection}}")
        else {
            panic!("expected block");
        };
        assert_eq!(block.program.block_params, vec!["post"]);
        assert_eq!(block.hash.pairs.len(), 2);
        assert!(matches!(
            block.hash.get("sortable"),
            Some(Expr::Literal(LiteralExpr {
                value: Literal::Boolean(true),
                ..
            }))
        ));
    }

    #[test]
    fn test_parse_else_chain() {
        let Node::Block(block) = first("{{#if a}}A{{else if b}}B{{else}}C{{/if}}") else {
            panic!("expected block");
        };
        let inverse = block.inverse.unwrap();
        let Node::Block(chained) = &inverse.body[0] else {
            panic!("expected chained block");
        };
        assert_eq!(chained.path.original, "if");
        assert!(chained.inverse.is_some());
    }

    #[test]
    fn test_parse_sub_expression() {
        let Node::Block(block) = first("{{#if (eq a \"x\")}}y{{/if}}") else {
            panic!("expected block");
        };
        let Expr::SubExpression(sub) = &block.params[0] else {
            panic!("expected sub-expression");
        };
        assert_eq!(sub.path.original, "eq");
        assert_eq!(sub.params.len(), 2);
    }

    #[test]
    fn test_parse_attributes() {
        let Node::Element(el) =
            first(r#"<a class="btn {{kind}}" href={{url}} @title="Hi" disabled>x</a>"#)
        else {
            panic!("expected element");
        };
        assert_eq!(el.attributes.len(), 4);
        assert!(matches!(el.attributes[0].value, AttrValue::Concat(ref parts) if parts.len() == 2));
        assert!(matches!(el.attributes[1].value, AttrValue::Mustache(_)));
        assert_eq!(el.attributes[2].name, "@title");
        assert_eq!(el.attributes[3].value, AttrValue::Text(String::new()));
    }

    #[test]
    fn test_parse_component_self_closing() {
        let Node::Element(el) = first("<Card @post={{this}} />") else {
            panic!("expected element");
        };
        assert!(el.is_component());
        assert!(el.children.is_empty());
    }

    #[test]
    fn test_parse_void_element() {
        let doc = parse("<img src=\"a.png\"><p>x</p>").unwrap();
        assert_eq!(doc.nodes().len(), 2);
    }

    #[test]
    fn test_parse_comments() {
        let doc = parse("<!-- keep -->{{! drop }}{{!-- drop {{x}} --}}").unwrap();
        let kinds: Vec<_> = doc
            .nodes()
            .iter()
            .map(|n| match n {
                Node::Comment(c) => c.kind,
                _ => panic!("expected comment"),
            })
            .collect();
        assert_eq!(kinds, vec![CommentKind::Markup, CommentKind::Doc, CommentKind::Doc]);
    }

    #[test]
    fn test_parse_raw_text_element() {
        let Node::Element(el) = first("<script>if (a < b) { {{x}} }</script>") else {
            panic!("expected element");
        };
        assert_eq!(el.children.len(), 3);
    }

    #[test]
    fn test_parse_partial() {
        assert!(matches!(first("{{> header}}"), Node::Partial(p) if p.name == "header"));
    }

    #[test]
    fn test_whitespace_control() {
        let doc = parse("a   {{~x~}}   b").unwrap();
        let texts: Vec<_> = doc
            .nodes()
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.chars.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[test]
    fn test_triple_stash() {
        let Node::Mustache(m) = first("{{{body}}}") else {
            panic!("expected mustache");
        };
        assert!(m.trusting);
    }

    #[test]
    fn test_mismatched_block() {
        let result = parse("{{#if a}}x{{/each}}");
        assert!(matches!(result, Err(ParseError::MismatchedBlock { .. })));
    }

    #[test]
    fn test_unclosed_element() {
        let result = parse("<div><p>x</p>");
        assert!(matches!(result, Err(ParseError::UnclosedElement { .. })));
    }

    #[test]
    fn test_stray_close_block() {
        assert!(parse("{{/if}}").is_err());
    }

    #[test]
    fn test_lone_angle_bracket_is_text() {
        let doc = parse("a < b").unwrap();
        assert_eq!(doc.nodes().len(), 1);
    }
}
