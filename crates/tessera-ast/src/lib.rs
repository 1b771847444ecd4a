//! Expression tree for Tessera templates.
//!
//! The engine only depends on the node shapes defined here. [`parse`] is the
//! bundled front end: a hand-written scanner for HTML markup with embedded
//! `{{ ... }}` mustaches, blocks, sub-expressions and comments. Any other
//! parser can be swapped in as long as it produces a [`Document`].

mod lexer;
mod parser;
mod token;

use thiserror::Error;

// ============================================================================
// Location
// ============================================================================

/// Location in source code (1-indexed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: usize,
    pub column: usize,
    pub byte_offset: usize,
}

impl Location {
    pub fn new(line: usize, column: usize, byte_offset: usize) -> Self {
        Self {
            line,
            column,
            byte_offset,
        }
    }

    /// Location shifted right by `columns` on the same line.
    pub fn offset(self, columns: usize) -> Self {
        Self {
            line: self.line,
            column: self.column + columns,
            byte_offset: self.byte_offset + columns,
        }
    }
}

// ============================================================================
// Element classification
// ============================================================================

/// Elements that never have children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose content is text rather than markup.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Text-only elements that still decode character references, so their
/// content must be escaped on output.
const ESCAPABLE_RAW_TEXT_ELEMENTS: &[&str] = &["textarea", "title"];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str())
}

pub fn is_raw_text_element(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str())
}

pub fn is_escapable_raw_text_element(tag: &str) -> bool {
    ESCAPABLE_RAW_TEXT_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str())
}

/// A tag names a component when it starts with an uppercase letter or
/// contains a hyphen (`<Card>`, `<site-header>`).
pub fn is_component_tag(tag: &str) -> bool {
    tag.chars().next().is_some_and(|c| c.is_uppercase()) || tag.contains('-')
}

// ============================================================================
// AST Nodes
// ============================================================================

/// A parsed template file.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    nodes: Vec<Node>,
    location: Location,
}

impl Document {
    pub fn new(nodes: Vec<Node>, location: Location) -> Self {
        Self { nodes, location }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn location(&self) -> Location {
        self.location
    }
}

/// Body of a block: its statements plus the names declared with `as |a b|`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub body: Vec<Node>,
    pub block_params: Vec<String>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(TextNode),
    Element(ElementNode),
    Mustache(MustacheNode),
    Block(BlockNode),
    Comment(CommentNode),
    Partial(PartialNode),
}

impl Node {
    pub fn location(&self) -> Location {
        match self {
            Node::Text(n) => n.location,
            Node::Element(n) => n.location,
            Node::Mustache(n) => n.location,
            Node::Block(n) => n.location,
            Node::Comment(n) => n.location,
            Node::Partial(n) => n.location,
        }
    }
}

/// Raw text content.
#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub chars: String,
    pub location: Location,
}

/// Markup element: `<tag attr="...">children</tag>`
#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub tag: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    pub location: Location,
}

impl ElementNode {
    pub fn is_component(&self) -> bool {
        is_component_tag(&self.tag)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
    pub location: Location,
}

/// Attribute values: `a="text"`, `a={{expr}}`, `a="x {{expr}} y"`.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Mustache(MustacheNode),
    Concat(Vec<AttrPart>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttrPart {
    Text(String),
    Mustache(MustacheNode),
}

/// Value output or inline operator call: `{{path param key=value}}`.
/// `trusting` is set for triple-stash output (`{{{path}}}`).
#[derive(Debug, Clone, PartialEq)]
pub struct MustacheNode {
    pub path: Expr,
    pub params: Vec<Expr>,
    pub hash: Hash,
    pub trusting: bool,
    pub location: Location,
}

/// Block operator: `{{#name params key=value as |x|}} ... {{else}} ... {{/name}}`
#[derive(Debug, Clone, PartialEq)]
pub struct BlockNode {
    pub path: PathExpr,
    pub params: Vec<Expr>,
    pub hash: Hash,
    pub program: Program,
    pub inverse: Option<Program>,
    pub location: Location,
}

/// Comment origin: `<!-- ... -->` is emitted, `{{! ... }}` is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    Markup,
    Doc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentNode {
    pub value: String,
    pub kind: CommentKind,
    pub location: Location,
}

/// Legacy inclusion: `{{> name}}`
#[derive(Debug, Clone, PartialEq)]
pub struct PartialNode {
    pub name: String,
    pub location: Location,
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Path(PathExpr),
    SubExpression(Box<SubExpression>),
    Literal(LiteralExpr),
}

impl Expr {
    pub fn location(&self) -> Location {
        match self {
            Expr::Path(p) => p.location,
            Expr::SubExpression(s) => s.location,
            Expr::Literal(l) => l.location,
        }
    }

    pub fn as_path(&self) -> Option<&PathExpr> {
        match self {
            Expr::Path(p) => Some(p),
            _ => None,
        }
    }
}

/// Nested operator call: `(name params key=value)`
#[derive(Debug, Clone, PartialEq)]
pub struct SubExpression {
    pub path: PathExpr,
    pub params: Vec<Expr>,
    pub hash: Hash,
    pub location: Location,
}

/// A dotted reference. `this.a.b` is this-rooted with parts `[a, b]`,
/// `@a.b` is data-rooted with parts `[a, b]`, bare `this` has no parts.
#[derive(Debug, Clone, PartialEq)]
pub struct PathExpr {
    pub original: String,
    pub parts: Vec<String>,
    pub this_rooted: bool,
    pub data_rooted: bool,
    pub location: Location,
}

impl PathExpr {
    /// Parse the textual form of a path.
    pub fn from_original(original: &str, location: Location) -> Self {
        let (data_rooted, rest) = match original.strip_prefix('@') {
            Some(rest) => (true, rest),
            None => (false, original),
        };
        let mut parts: Vec<String> = rest
            .split('.')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let this_rooted = !data_rooted && parts.first().is_some_and(|p| p == "this");
        if this_rooted {
            parts.remove(0);
        }
        Self {
            original: original.to_string(),
            parts,
            this_rooted,
            data_rooted,
            location,
        }
    }

    /// The single identifier of an un-rooted, one-segment path.
    pub fn simple_name(&self) -> Option<&str> {
        if self.this_rooted || self.data_rooted || self.parts.len() != 1 {
            return None;
        }
        self.parts.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
    Undefined,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiteralExpr {
    pub value: Literal,
    pub location: Location,
}

/// Ordered `key=value` arguments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Hash {
    pub pairs: Vec<HashPair>,
}

impl Hash {
    pub fn get(&self, key: &str) -> Option<&Expr> {
        self.pairs.iter().find(|p| p.key == key).map(|p| &p.value)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HashPair {
    pub key: String,
    pub value: Expr,
    pub location: Location,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("unexpected token at line {line}, column {column}: {message}")]
    UnexpectedToken {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("unexpected character '{ch}' at line {line}, column {column}")]
    UnexpectedCharacter { ch: char, line: usize, column: usize },

    #[error("unterminated {what} starting at line {line}, column {column}")]
    Unterminated {
        what: &'static str,
        line: usize,
        column: usize,
    },

    #[error("block '{name}' opened at line {line}, column {column} is never closed")]
    UnclosedBlock {
        name: String,
        line: usize,
        column: usize,
    },

    #[error("expected '{{{{/{expected}}}}}' but found '{{{{/{found}}}}}' at line {line}, column {column}")]
    MismatchedBlock {
        expected: String,
        found: String,
        line: usize,
        column: usize,
    },

    #[error("element <{tag}> opened at line {line}, column {column} is never closed")]
    UnclosedElement {
        tag: String,
        line: usize,
        column: usize,
    },

    #[error("expected '</{expected}>' but found '</{found}>' at line {line}, column {column}")]
    MismatchedElement {
        expected: String,
        found: String,
        line: usize,
        column: usize,
    },
}

impl ParseError {
    pub fn location(&self) -> Location {
        let (line, column) = match self {
            ParseError::UnexpectedToken { line, column, .. }
            | ParseError::UnexpectedCharacter { line, column, .. }
            | ParseError::Unterminated { line, column, .. }
            | ParseError::UnclosedBlock { line, column, .. }
            | ParseError::MismatchedBlock { line, column, .. }
            | ParseError::UnclosedElement { line, column, .. }
            | ParseError::MismatchedElement { line, column, .. } => (*line, *column),
        };
        Location::new(line, column, 0)
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a template source string into a [`Document`].
pub fn parse(source: &str) -> Result<Document, ParseError> {
    parser::parse(source)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_from_original_plain() {
        let path = PathExpr::from_original("user.name", Location::default());
        assert_eq!(path.parts, vec!["user", "name"]);
        assert!(!path.this_rooted);
        assert!(!path.data_rooted);
        assert_eq!(path.simple_name(), None);
    }

    #[test]
    fn path_from_original_this_and_data() {
        let this = PathExpr::from_original("this", Location::default());
        assert!(this.this_rooted);
        assert!(this.parts.is_empty());

        let nested = PathExpr::from_original("this.title", Location::default());
        assert!(nested.this_rooted);
        assert_eq!(nested.parts, vec!["title"]);

        let data = PathExpr::from_original("@index", Location::default());
        assert!(data.data_rooted);
        assert_eq!(data.parts, vec!["index"]);
    }

    #[test]
    fn component_tags() {
        assert!(is_component_tag("Card"));
        assert!(is_component_tag("site-header"));
        assert!(!is_component_tag("div"));
    }

    #[test]
    fn element_classes() {
        assert!(is_void_element("img"));
        assert!(is_void_element("BR"));
        assert!(is_raw_text_element("script"));
        assert!(is_raw_text_element("title"));
        assert!(!is_raw_text_element("div"));
        assert!(is_escapable_raw_text_element("TEXTAREA"));
        assert!(!is_escapable_raw_text_element("script"));
    }
}
