//! `if`, `unless`, `and`, `or`, `eq`.

use super::{HelperOptions, Operator};
use crate::error::Result;
use crate::value::{Value, ValueMap};

/// Block form renders the body or the inverse; value form picks between
/// the second and third argument.
fn choose(condition: bool, params: &[Value], options: &HelperOptions<'_>) -> Result<Value> {
    if options.is_block() {
        let fragment = if condition {
            options.block(&[], ValueMap::new())?
        } else {
            options.inverse(&[], ValueMap::new())?
        };
        return Ok(Value::Fragment(fragment));
    }
    let picked = if condition { params.get(1) } else { params.get(2) };
    Ok(picked.cloned().unwrap_or_default())
}

/// Block form renders like `if`; value form yields the boolean itself.
fn boolean(result: bool, options: &HelperOptions<'_>) -> Result<Value> {
    if options.is_block() {
        return choose(result, &[], options);
    }
    Ok(Value::Bool(result))
}

fn condition(params: &[Value]) -> bool {
    params.first().is_some_and(Value::is_truthy)
}

pub struct If;

impl Operator for If {
    fn name(&self) -> &str {
        "if"
    }

    fn run(&self, params: &[Value], _hash: &ValueMap, options: &HelperOptions<'_>) -> Result<Value> {
        choose(condition(params), params, options)
    }
}

pub struct Unless;

impl Operator for Unless {
    fn name(&self) -> &str {
        "unless"
    }

    fn run(&self, params: &[Value], _hash: &ValueMap, options: &HelperOptions<'_>) -> Result<Value> {
        choose(!condition(params), params, options)
    }
}

/// True when every argument is truthy. Arguments are evaluated before the
/// call, so a failing sub-expression fails the whole `and`.
pub struct And;

impl Operator for And {
    fn name(&self) -> &str {
        "and"
    }

    fn run(&self, params: &[Value], _hash: &ValueMap, options: &HelperOptions<'_>) -> Result<Value> {
        boolean(!params.is_empty() && params.iter().all(Value::is_truthy), options)
    }
}

/// True when any argument is truthy. Like `and`, all arguments are
/// evaluated first.
pub struct Or;

impl Operator for Or {
    fn name(&self) -> &str {
        "or"
    }

    fn run(&self, params: &[Value], _hash: &ValueMap, options: &HelperOptions<'_>) -> Result<Value> {
        boolean(params.iter().any(Value::is_truthy), options)
    }
}

/// Strict equality of the first two arguments.
pub struct Equals;

impl Equals {
    /// Force lazies, unwrap one-element arrays, treat markup as plain strings.
    fn normalize(value: &Value) -> Value {
        match value.clone().resolved() {
            Value::Array(mut items) if items.len() == 1 => Self::normalize(&items.remove(0)),
            Value::Safe(s) => Value::String(s),
            other => other,
        }
    }
}

impl Operator for Equals {
    fn name(&self) -> &str {
        "eq"
    }

    fn run(&self, params: &[Value], _hash: &ValueMap, options: &HelperOptions<'_>) -> Result<Value> {
        let left = params.first().map(Self::normalize).unwrap_or_default();
        let right = params.get(1).map(Self::normalize).unwrap_or_default();
        boolean(left == right, options)
    }
}
