//! Field operators with structured values: `link`, `image`.

use super::{first_param, HelperOptions, Operator};
use crate::error::Result;
use crate::expr::ParsedExpr;
use crate::html_escape::escape;
use crate::value::{Value, ValueMap};

fn text_of(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .map(|key| value.get(key).resolved())
        .find(Value::is_truthy)
        .map(|v| v.display())
}

/// Optional `class` hash entry as an attribute.
fn class_attr(hash: &ValueMap) -> String {
    hash.get("class")
        .filter(|v| v.is_truthy())
        .map(|v| format!(" class=\"{}\"", escape(&v.display())))
        .unwrap_or_default()
}

/// `{url, name | text}`
pub struct Link;

impl Operator for Link {
    fn name(&self) -> &str {
        "link"
    }

    fn is_field(&self) -> bool {
        true
    }

    fn field_type(&self, _expr: &ParsedExpr) -> Option<String> {
        Some("link".to_string())
    }

    /// The block body reads from the value itself.
    fn rebinds_this(&self) -> bool {
        true
    }

    fn run(&self, params: &[Value], hash: &ValueMap, options: &HelperOptions<'_>) -> Result<Value> {
        let value = first_param(params);
        let url = text_of(&value, &["url"]);
        let label = text_of(&value, &["name", "text"]);

        if options.is_block() {
            let fragment = if url.is_some() && label.is_some() {
                options.block(&[value], ValueMap::new())?
            } else {
                options.inverse(&[], ValueMap::new())?
            };
            return Ok(Value::Fragment(fragment));
        }

        let Some(url) = url else {
            return Ok(Value::Null);
        };
        let label = label.unwrap_or_else(|| url.clone());
        Ok(Value::Safe(format!(
            "<a href=\"{}\"{}>{}</a>",
            escape(&url),
            class_attr(hash),
            escape(&label)
        )))
    }
}

/// A URL string or `{src | url, alt}`.
pub struct Image;

impl Operator for Image {
    fn name(&self) -> &str {
        "image"
    }

    fn is_field(&self) -> bool {
        true
    }

    fn field_type(&self, _expr: &ParsedExpr) -> Option<String> {
        Some("image".to_string())
    }

    /// The block body reads from the value itself.
    fn rebinds_this(&self) -> bool {
        true
    }

    fn run(&self, params: &[Value], hash: &ValueMap, options: &HelperOptions<'_>) -> Result<Value> {
        let value = first_param(params);

        if options.is_block() {
            let fragment = if value.is_null() {
                options.inverse(&[], ValueMap::new())?
            } else {
                options.block(&[value], ValueMap::new())?
            };
            return Ok(Value::Fragment(fragment));
        }

        let (src, alt) = match &value {
            Value::String(src) => (Some(src.clone()), None),
            other => (text_of(other, &["src", "url"]), text_of(other, &["alt"])),
        };
        let Some(src) = src.filter(|s| !s.is_empty()) else {
            return Ok(Value::Null);
        };
        let alt = alt
            .or_else(|| hash.get("alt").map(Value::display))
            .unwrap_or_default();
        Ok(Value::Safe(format!(
            "<img src=\"{}\" alt=\"{}\"{}>",
            escape(&src),
            escape(&alt),
            class_attr(hash)
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{run_block, run_inline};
    use super::*;
    use serde_json::json;

    #[test]
    fn test_link_block_requires_url_and_name() {
        let good = Value::from_json(json!({"url": "/about", "text": "About"}));
        let (_, calls) = run_block(&Link, &[good], &ValueMap::new()).unwrap();
        assert_eq!(calls.len(), 1);

        let bad = Value::from_json(json!({"url": "/about"}));
        let (value, calls) = run_block(&Link, &[bad], &ValueMap::new()).unwrap();
        assert!(calls.is_empty());
        assert!(matches!(value, Value::Fragment(f) if f.to_html() == "inverse"));
    }

    #[test]
    fn test_link_markup() {
        let link = Value::from_json(json!({"url": "/a?b=1&c=2", "name": "A & B"}));
        let value = run_inline(&Link, &[link], &ValueMap::new()).unwrap();
        assert_eq!(
            value,
            Value::Safe("<a href=\"/a?b=1&amp;c=2\">A &amp; B</a>".to_string())
        );
    }

    #[test]
    fn test_image_markup() {
        let image = Value::from_json(json!({"src": "/hero.png", "alt": "Hero"}));
        let value = run_inline(&Image, &[image], &ValueMap::new()).unwrap();
        assert_eq!(
            value,
            Value::Safe("<img src=\"/hero.png\" alt=\"Hero\">".to_string())
        );
        assert_eq!(
            run_inline(&Image, &[Value::Null], &ValueMap::new()).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_image_block() {
        let (value, calls) = run_block(&Image, &[Value::Null], &ValueMap::new()).unwrap();
        assert!(calls.is_empty());
        assert!(matches!(value, Value::Fragment(f) if f.to_html() == "inverse"));
    }
}
