//! Normalized view of a template reference used by schema inference.
//!
//! `{{title}}`, `{{this.title}}`, `{{post.title}}` and `{{date published}}`
//! all reduce to a [`ParsedExpr`] with a `key` and an optional `context`.

use crate::schema::Options;
use serde_json::Value as JsonValue;
use tessera_ast::{Expr, Hash, Literal, Location, PathExpr};

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedExpr {
    pub original: String,
    /// First segment after the context.
    pub key: String,
    /// `this` for `this.`-rooted paths, the first segment of dotted paths.
    pub context: Option<String>,
    pub parts: Vec<String>,
    pub hash: Options,
    /// Data-rooted (`@`) references never declare fields.
    pub is_private: bool,
    pub field_type: Option<String>,
    pub location: Location,
}

impl ParsedExpr {
    /// Normalize a path with its (statically evaluated) hash.
    /// Bare `this` names nothing and yields `None`.
    pub fn from_path(path: &PathExpr, hash: &Hash) -> Option<Self> {
        let (context, key) = if path.this_rooted {
            (Some("this".to_string()), path.parts.first()?.clone())
        } else {
            match path.parts.as_slice() {
                [] => return None,
                [key] => (None, key.clone()),
                [context, key, ..] => (Some(context.clone()), key.clone()),
            }
        };

        let hash = evaluate_hash(hash);
        let field_type = hash
            .get("type")
            .and_then(JsonValue::as_str)
            .map(str::to_string);

        Some(Self {
            original: path.original.clone(),
            key,
            context,
            parts: path.parts.clone(),
            hash,
            is_private: path.data_rooted,
            field_type,
            location: path.location,
        })
    }

    /// Normalize an operator invocation by its first positional argument.
    pub fn from_invocation(params: &[Expr], hash: &Hash) -> Option<Self> {
        match params.first()? {
            Expr::Path(path) => Self::from_path(path, hash),
            _ => None,
        }
    }

    /// Section name a branch block declares: the context unless it is `this`,
    /// else the key.
    pub fn branch_name(&self) -> &str {
        match self.context.as_deref() {
            Some(context) if context != "this" => context,
            _ => &self.key,
        }
    }
}

/// Evaluate a hash statically: literals verbatim, paths as their source text.
pub fn evaluate_hash(hash: &Hash) -> Options {
    hash.pairs
        .iter()
        .map(|pair| (pair.key.clone(), static_value(&pair.value)))
        .collect()
}

fn static_value(expr: &Expr) -> JsonValue {
    match expr {
        Expr::Literal(lit) => match &lit.value {
            Literal::String(s) => JsonValue::String(s.clone()),
            Literal::Number(n) if n.fract() == 0.0 && n.is_finite() => JsonValue::from(*n as i64),
            Literal::Number(n) => serde_json::Number::from_f64(*n)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Literal::Boolean(b) => JsonValue::Bool(*b),
            Literal::Null | Literal::Undefined => JsonValue::Null,
        },
        Expr::Path(path) => JsonValue::String(path.original.clone()),
        Expr::SubExpression(sub) => JsonValue::String(sub.path.original.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tessera_ast::Node;

    fn mustache(source: &str) -> tessera_ast::MustacheNode {
        match tessera_ast::parse(source).unwrap().nodes()[0].clone() {
            Node::Mustache(m) => m,
            other => panic!("expected mustache, got {other:?}"),
        }
    }

    fn parse_path(source: &str) -> Option<ParsedExpr> {
        let m = mustache(source);
        ParsedExpr::from_path(m.path.as_path().unwrap(), &m.hash)
    }

    #[test]
    fn test_single_identifier() {
        let expr = parse_path("{{title}}").unwrap();
        assert_eq!(expr.key, "title");
        assert_eq!(expr.context, None);
        assert!(!expr.is_private);
    }

    #[test]
    fn test_this_rooted() {
        let expr = parse_path("{{this.title}}").unwrap();
        assert_eq!(expr.context.as_deref(), Some("this"));
        assert_eq!(expr.key, "title");
        assert_eq!(expr.branch_name(), "title");
    }

    #[test]
    fn test_dotted_path() {
        let expr = parse_path("{{post.author.name}}").unwrap();
        assert_eq!(expr.context.as_deref(), Some("post"));
        assert_eq!(expr.key, "author");
        assert_eq!(expr.branch_name(), "post");
    }

    #[test]
    fn test_data_rooted_is_private() {
        assert!(parse_path("{{@index}}").unwrap().is_private);
    }

    #[test]
    fn test_bare_this() {
        assert_eq!(parse_path("{{this}}"), None);
    }

    #[test]
    fn test_hash_and_type() {
        let expr = parse_path("{{hero type=\"image\" priority=2 label=\"Hero\" fallback=other}}")
            .unwrap();
        assert_eq!(expr.field_type.as_deref(), Some("image"));
        assert_eq!(expr.hash.get("priority"), Some(&json!(2)));
        assert_eq!(expr.hash.get("fallback"), Some(&json!("other")));
    }

    #[test]
    fn test_invocation_uses_first_param() {
        let m = mustache("{{date published format=\"%Y\"}}");
        let expr = ParsedExpr::from_invocation(&m.params, &m.hash).unwrap();
        assert_eq!(expr.key, "published");
        assert_eq!(expr.hash.get("format"), Some(&json!("%Y")));
    }
}
