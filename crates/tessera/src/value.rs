//! Runtime value types for Tessera templates.

use crate::fragment::Fragment;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

/// Ordered string-keyed map of values.
pub type ValueMap = IndexMap<String, Value>;

/// Prefix left behind by an unresolved reference. Strings starting with it are falsy.
pub const UNRESOLVED_MARKER: &str = "{{";

/// A deferred value, computed each time it is forced.
#[derive(Clone)]
pub struct LazyValue(Arc<dyn Fn() -> Value + Send + Sync>);

impl LazyValue {
    pub fn new(f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn force(&self) -> Value {
        (self.0)()
    }
}

impl fmt::Debug for LazyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LazyValue(..)")
    }
}

impl PartialEq for LazyValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Runtime value type for Tessera templates
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(ValueMap),
    /// Trusted markup, inserted without escaping.
    Safe(String),
    Fragment(Fragment),
    Lazy(LazyValue),
}

impl Value {
    /// Convert a JSON value to a Tessera Value
    pub fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            JsonValue::String(s) => Value::String(s),
            JsonValue::Array(arr) => Value::Array(arr.into_iter().map(Value::from_json).collect()),
            JsonValue::Object(obj) => Value::Object(
                obj.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert back to JSON. Lazy values are forced, markup becomes strings.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) | Value::Safe(s) => JsonValue::String(s.clone()),
            Value::Array(arr) => JsonValue::Array(arr.iter().map(Value::to_json).collect()),
            Value::Object(obj) => JsonValue::Object(
                obj.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Fragment(f) => JsonValue::String(f.to_html()),
            Value::Lazy(lazy) => lazy.force().to_json(),
        }
    }

    /// Force lazy values until a concrete value remains.
    pub fn resolved(self) -> Value {
        let mut value = self;
        while let Value::Lazy(lazy) = value {
            value = lazy.force();
        }
        value
    }

    /// Falsy values: null, false, 0, NaN, "", unresolved references, [], empty fragments
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) | Value::Safe(s) => {
                !s.is_empty() && !s.starts_with(UNRESOLVED_MARKER)
            }
            Value::Array(arr) => !arr.is_empty(),
            Value::Object(_) => true,
            Value::Fragment(f) => !f.is_empty(),
            Value::Lazy(lazy) => lazy.force().is_truthy(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Property access: object keys and numeric array indexes. Missing yields null.
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Object(obj) => obj.get(key).cloned().unwrap_or_default(),
            Value::Array(arr) => key
                .parse::<usize>()
                .ok()
                .and_then(|i| arr.get(i))
                .cloned()
                .unwrap_or_default(),
            Value::Lazy(lazy) => lazy.force().get(key),
            _ => Value::Null,
        }
    }

    /// Text form used for output and string comparisons.
    pub fn display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) | Value::Safe(s) => s.clone(),
            Value::Array(arr) => arr
                .iter()
                .map(Value::display)
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => self.to_json().to_string(),
            Value::Fragment(f) => f.to_html(),
            Value::Lazy(lazy) => lazy.force().display(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Safe(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ValueMap> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Safe(_) => "markup",
            Value::Fragment(_) => "fragment",
            Value::Lazy(_) => "lazy",
        }
    }
}

/// Integral numbers print without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn number_to_json(n: f64) -> JsonValue {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        JsonValue::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
    }
}

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        Value::from_json(json)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<ValueMap> for Value {
    fn from(map: ValueMap) -> Self {
        Value::Object(map)
    }
}

impl From<Fragment> for Value {
    fn from(fragment: Fragment) -> Self {
        Value::Fragment(fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthy() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(Value::Number(-1.0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::from("{{title}}").is_truthy());
        assert!(Value::from("hello").is_truthy());
        assert!(!Value::Array(vec![]).is_truthy());
        assert!(Value::Object(ValueMap::new()).is_truthy());
        assert!(!Value::Fragment(Fragment::new()).is_truthy());
    }

    #[test]
    fn test_lazy_is_forced() {
        let lazy = Value::Lazy(LazyValue::new(|| Value::from("later")));
        assert!(lazy.is_truthy());
        assert_eq!(lazy.display(), "later");
        assert_eq!(lazy.resolved(), Value::from("later"));
    }

    #[test]
    fn test_display_numbers() {
        assert_eq!(Value::Number(42.0).display(), "42");
        assert_eq!(Value::Number(2.5).display(), "2.5");
        assert_eq!(Value::Null.display(), "");
    }

    #[test]
    fn test_from_json_and_get() {
        let value = Value::from_json(json!({"name": "test", "tags": ["a", "b"]}));
        assert_eq!(value.get("name"), Value::from("test"));
        assert_eq!(value.get("tags").get("1"), Value::from("b"));
        assert_eq!(value.get("missing"), Value::Null);
    }

    #[test]
    fn test_to_json_round_trips_integers() {
        let value = Value::from_json(json!({"count": 3, "ratio": 0.5}));
        assert_eq!(value.to_json(), json!({"count": 3, "ratio": 0.5}));
    }
}
