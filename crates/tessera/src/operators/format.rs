//! `math`, `date`, `log`.

use super::{first_param, HelperOptions, Operator};
use crate::error::{Result, TesseraError};
use crate::expr::ParsedExpr;
use crate::value::{format_number, Value, ValueMap};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fmt::Write;
use tracing::debug;

/// Default long date format: `October 16, 2026`.
pub const DEFAULT_DATE_FORMAT: &str = "%B %-d, %Y";

/// `{{math op a b}}`
pub struct Math;

impl Math {
    fn operand(&self, value: Option<&Value>) -> Result<f64> {
        let value = value.cloned().unwrap_or_default().resolved();
        value
            .as_number()
            .ok_or_else(|| TesseraError::InvalidOperatorArgument {
                operator: self.name().to_string(),
                message: format!("expected a number, got {}", value.type_name()),
            })
    }
}

impl Operator for Math {
    fn name(&self) -> &str {
        "math"
    }

    fn run(&self, params: &[Value], _hash: &ValueMap, _options: &HelperOptions<'_>) -> Result<Value> {
        let op = first_param(params).display();
        let a = self.operand(params.get(1))?;
        let result = match op.as_str() {
            "ceil" => a.ceil(),
            "floor" => a.floor(),
            "div" | "mult" | "mod" | "sum" | "minus" | "min" | "max" => {
                let b = self.operand(params.get(2))?;
                match op.as_str() {
                    "div" => a / b,
                    "mult" => a * b,
                    "mod" => a % b,
                    "sum" => a + b,
                    "minus" => a - b,
                    "min" => a.min(b),
                    _ => a.max(b),
                }
            }
            _ => {
                return Err(TesseraError::InvalidOperatorArgument {
                    operator: self.name().to_string(),
                    message: format!("unknown operation '{op}'"),
                })
            }
        };
        Ok(Value::String(format_number(result)))
    }
}

/// Formats RFC 3339, `YYYY-MM-DD` or epoch-millisecond values.
pub struct Date;

impl Date {
    fn parse(value: &Value) -> Option<NaiveDateTime> {
        match value {
            Value::Number(ms) => DateTime::from_timestamp_millis(*ms as i64).map(|d| d.naive_utc()),
            Value::String(s) => {
                let s = s.trim();
                DateTime::parse_from_rfc3339(s)
                    .map(|d| d.naive_local())
                    .ok()
                    .or_else(|| {
                        NaiveDate::parse_from_str(s, "%Y-%m-%d")
                            .ok()
                            .and_then(|d| d.and_hms_opt(0, 0, 0))
                    })
            }
            _ => None,
        }
    }
}

impl Operator for Date {
    fn name(&self) -> &str {
        "date"
    }

    fn is_field(&self) -> bool {
        true
    }

    fn field_type(&self, _expr: &ParsedExpr) -> Option<String> {
        Some("date".to_string())
    }

    fn run(&self, params: &[Value], hash: &ValueMap, _options: &HelperOptions<'_>) -> Result<Value> {
        let value = first_param(params);
        if value.is_null() {
            return Ok(Value::Null);
        }
        let Some(date) = Self::parse(&value) else {
            return Ok(Value::String(value.display()));
        };

        let format = hash
            .get("format")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_DATE_FORMAT);
        let mut out = String::new();
        write!(out, "{}", date.format(format)).map_err(|_| {
            TesseraError::InvalidOperatorArgument {
                operator: self.name().to_string(),
                message: format!("invalid date format '{format}'"),
            }
        })?;
        Ok(Value::String(out))
    }
}

/// Emits its arguments at debug level and renders nothing.
pub struct Log;

impl Operator for Log {
    fn name(&self) -> &str {
        "log"
    }

    fn run(&self, params: &[Value], _hash: &ValueMap, _options: &HelperOptions<'_>) -> Result<Value> {
        let message = params
            .iter()
            .map(Value::display)
            .collect::<Vec<_>>()
            .join(" ");
        debug!(target: "tessera::template", "{message}");
        Ok(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::run_inline;
    use super::*;

    fn math(op: &str, a: f64, b: f64) -> Result<Value> {
        run_inline(
            &Math,
            &[Value::from(op), Value::Number(a), Value::Number(b)],
            &ValueMap::new(),
        )
    }

    #[test]
    fn test_math_operations() {
        assert_eq!(math("sum", 2.0, 3.0).unwrap(), Value::from("5"));
        assert_eq!(math("minus", 2.0, 3.0).unwrap(), Value::from("-1"));
        assert_eq!(math("mult", 2.0, 3.0).unwrap(), Value::from("6"));
        assert_eq!(math("div", 3.0, 2.0).unwrap(), Value::from("1.5"));
        assert_eq!(math("mod", 7.0, 3.0).unwrap(), Value::from("1"));
        assert_eq!(math("max", 7.0, 3.0).unwrap(), Value::from("7"));
        assert_eq!(math("ceil", 1.2, 0.0).unwrap(), Value::from("2"));
    }

    #[test]
    fn test_math_numeric_strings() {
        let params = [Value::from("sum"), Value::from("2"), Value::from("40")];
        assert_eq!(run_inline(&Math, &params, &ValueMap::new()).unwrap(), Value::from("42"));
    }

    #[test]
    fn test_math_unknown_op() {
        assert!(matches!(
            math("pow", 2.0, 3.0),
            Err(TesseraError::InvalidOperatorArgument { .. })
        ));
    }

    #[test]
    fn test_date_formats() {
        let date = |v: Value, hash: ValueMap| run_inline(&Date, &[v], &hash).unwrap();
        assert_eq!(date(Value::from("2026-10-16"), ValueMap::new()), Value::from("October 16, 2026"));
        assert_eq!(
            date(Value::from("2026-03-05T10:00:00Z"), ValueMap::new()),
            Value::from("March 5, 2026")
        );
        let mut hash = ValueMap::new();
        hash.insert("format".into(), Value::from("%Y/%m/%d"));
        assert_eq!(date(Value::Number(0.0), hash), Value::from("1970/01/01"));
        assert_eq!(date(Value::from("soon"), ValueMap::new()), Value::from("soon"));
    }

    #[test]
    fn test_log_renders_nothing() {
        let value = run_inline(&Log, &[Value::from("hi")], &ValueMap::new()).unwrap();
        assert_eq!(value, Value::Null);
    }
}
