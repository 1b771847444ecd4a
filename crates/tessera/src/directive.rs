//! Field directives: turn stored content into render values, per field type.

use crate::schema::{Field, DEFAULT_FIELD_TYPE};
use crate::value::{Value, ValueMap};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldRenderError {
    #[error("expected {expected}, got {found}")]
    UnexpectedValue {
        expected: &'static str,
        found: String,
    },

    #[error("{0}")]
    Invalid(String),
}

fn unexpected(expected: &'static str, stored: &JsonValue) -> FieldRenderError {
    FieldRenderError::UnexpectedValue {
        expected,
        found: stored.to_string(),
    }
}

/// What happens to a page when one of its fields fails to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldFailurePolicy {
    /// Substitute `options.default` (or null), warn and continue.
    #[default]
    UseDefault,
    /// Fail the page with `FieldRenderFailure`.
    Abort,
}

pub trait FieldRenderer: Send + Sync {
    fn render(&self, field: &Field, stored: &JsonValue) -> Result<Value, FieldRenderError>;
}

/// Plain text. Numbers and booleans are stringified.
pub struct TextDirective;

impl FieldRenderer for TextDirective {
    fn render(&self, _field: &Field, stored: &JsonValue) -> Result<Value, FieldRenderError> {
        match stored {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::String(s) => Ok(Value::String(s.clone())),
            JsonValue::Number(_) | JsonValue::Bool(_) => Ok(Value::String(stored.to_string())),
            other => Err(unexpected("text", other)),
        }
    }
}

/// Trusted markup.
pub struct HtmlDirective;

impl FieldRenderer for HtmlDirective {
    fn render(&self, _field: &Field, stored: &JsonValue) -> Result<Value, FieldRenderError> {
        match stored {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::String(s) => Ok(Value::Safe(s.clone())),
            other => Err(unexpected("markup string", other)),
        }
    }
}

/// RFC 3339 or `YYYY-MM-DD` strings, or epoch milliseconds. Formatting is
/// left to the `date` operator.
pub struct DateDirective;

impl FieldRenderer for DateDirective {
    fn render(&self, _field: &Field, stored: &JsonValue) -> Result<Value, FieldRenderError> {
        match stored {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::Number(n) => Ok(Value::Number(n.as_f64().unwrap_or_default())),
            JsonValue::String(s) => {
                let valid = DateTime::parse_from_rfc3339(s).is_ok()
                    || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok();
                if valid {
                    Ok(Value::String(s.clone()))
                } else {
                    Err(FieldRenderError::Invalid(format!("'{s}' is not a date")))
                }
            }
            other => Err(unexpected("date", other)),
        }
    }
}

/// `{src, alt}`; a bare string is the source.
pub struct ImageDirective;

impl FieldRenderer for ImageDirective {
    fn render(&self, _field: &Field, stored: &JsonValue) -> Result<Value, FieldRenderError> {
        match stored {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::String(src) => {
                let mut image = ValueMap::new();
                image.insert("src".into(), Value::String(src.clone()));
                Ok(Value::Object(image))
            }
            JsonValue::Object(obj) if obj.contains_key("src") || obj.contains_key("url") => {
                Ok(Value::from_json(stored.clone()))
            }
            other => Err(unexpected("image", other)),
        }
    }
}

/// `{url, text}`; a bare string is both.
pub struct LinkDirective;

impl FieldRenderer for LinkDirective {
    fn render(&self, _field: &Field, stored: &JsonValue) -> Result<Value, FieldRenderError> {
        match stored {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::String(url) => {
                let mut link = ValueMap::new();
                link.insert("url".into(), Value::String(url.clone()));
                link.insert("text".into(), Value::String(url.clone()));
                Ok(Value::Object(link))
            }
            JsonValue::Object(obj) if obj.contains_key("url") => Ok(Value::from_json(stored.clone())),
            other => Err(unexpected("link", other)),
        }
    }
}

pub struct NumberDirective;

impl FieldRenderer for NumberDirective {
    fn render(&self, _field: &Field, stored: &JsonValue) -> Result<Value, FieldRenderError> {
        match stored {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::Number(n) => Ok(Value::Number(n.as_f64().unwrap_or_default())),
            JsonValue::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Number)
                .map_err(|_| unexpected("number", stored)),
            other => Err(unexpected("number", other)),
        }
    }
}

pub struct BooleanDirective;

impl FieldRenderer for BooleanDirective {
    fn render(&self, _field: &Field, stored: &JsonValue) -> Result<Value, FieldRenderError> {
        match stored {
            JsonValue::Null => Ok(Value::Bool(false)),
            JsonValue::Bool(b) => Ok(Value::Bool(*b)),
            JsonValue::Number(n) => Ok(Value::Bool(n.as_f64().is_some_and(|n| n != 0.0))),
            JsonValue::String(s) => match s.as_str() {
                "true" | "1" | "on" => Ok(Value::Bool(true)),
                "false" | "0" | "off" | "" => Ok(Value::Bool(false)),
                _ => Err(unexpected("boolean", stored)),
            },
            other => Err(unexpected("boolean", other)),
        }
    }
}

/// Field type → renderer. Unknown types render as text.
#[derive(Clone)]
pub struct DirectiveRegistry {
    renderers: HashMap<String, Arc<dyn FieldRenderer>>,
}

impl DirectiveRegistry {
    pub fn empty() -> Self {
        Self {
            renderers: HashMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(DEFAULT_FIELD_TYPE, TextDirective);
        registry.register("html", HtmlDirective);
        registry.register("date", DateDirective);
        registry.register("image", ImageDirective);
        registry.register("link", LinkDirective);
        registry.register("number", NumberDirective);
        registry.register("boolean", BooleanDirective);
        registry
    }

    pub fn register(&mut self, field_type: impl Into<String>, renderer: impl FieldRenderer + 'static) {
        self.renderers.insert(field_type.into(), Arc::new(renderer));
    }

    pub fn render(&self, field: &Field, stored: &JsonValue) -> Result<Value, FieldRenderError> {
        match self
            .renderers
            .get(&field.field_type)
            .or_else(|| self.renderers.get(DEFAULT_FIELD_TYPE))
        {
            Some(renderer) => renderer.render(field, stored),
            None => TextDirective.render(field, stored),
        }
    }
}

impl Default for DirectiveRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&String> = self.renderers.keys().collect();
        types.sort();
        f.debug_struct("DirectiveRegistry")
            .field("types", &types)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(field_type: &str) -> Field {
        let mut field = Field::new("f");
        field.field_type = field_type.to_string();
        field
    }

    #[test]
    fn test_text_and_html() {
        let registry = DirectiveRegistry::builtin();
        assert_eq!(
            registry.render(&field("text"), &json!(42)).unwrap(),
            Value::from("42")
        );
        assert_eq!(
            registry.render(&field("html"), &json!("<b>x</b>")).unwrap(),
            Value::Safe("<b>x</b>".to_string())
        );
    }

    #[test]
    fn test_unknown_type_falls_back_to_text() {
        let registry = DirectiveRegistry::builtin();
        assert_eq!(
            registry.render(&field("color"), &json!("red")).unwrap(),
            Value::from("red")
        );
    }

    #[test]
    fn test_date_validation() {
        let registry = DirectiveRegistry::builtin();
        assert!(registry.render(&field("date"), &json!("2026-10-16")).is_ok());
        assert!(registry.render(&field("date"), &json!("yesterday")).is_err());
    }

    #[test]
    fn test_structured_values() {
        let registry = DirectiveRegistry::builtin();
        let image = registry.render(&field("image"), &json!("/a.png")).unwrap();
        assert_eq!(image.get("src"), Value::from("/a.png"));
        let link = registry
            .render(&field("link"), &json!({"url": "/x", "text": "X"}))
            .unwrap();
        assert_eq!(link.get("text"), Value::from("X"));
        assert!(registry.render(&field("link"), &json!([1])).is_err());
    }

    #[test]
    fn test_number_and_boolean() {
        let registry = DirectiveRegistry::builtin();
        assert_eq!(
            registry.render(&field("number"), &json!("2.5")).unwrap(),
            Value::Number(2.5)
        );
        assert_eq!(
            registry.render(&field("boolean"), &json!("on")).unwrap(),
            Value::Bool(true)
        );
        assert!(registry.render(&field("number"), &json!("many")).is_err());
    }
}
