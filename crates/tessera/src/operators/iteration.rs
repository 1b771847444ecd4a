//! `each`, `collection`, `section`, `collate`.

use super::{first_param, HelperOptions, Operator};
use crate::context::RECORD_META_KEY;
use crate::error::{Result, TesseraError};
use crate::expr::ParsedExpr;
use crate::fragment::Fragment;
use crate::schema::RecordType;
use crate::scope::Alias;
use crate::slug::slugify;
use crate::value::{Value, ValueMap};
use indexmap::IndexMap;
use tessera_ast::BlockNode;

/// Arrays iterate as-is, any other truthy value is a single item.
fn to_items(value: Value) -> Vec<Value> {
    match value.resolved() {
        Value::Array(items) => items,
        value if value.is_truthy() => vec![value],
        _ => Vec::new(),
    }
}

/// Render the block once per item, or the inverse when there are none.
fn iterate(items: &[Value], options: &HelperOptions<'_>) -> Result<Value> {
    if items.is_empty() {
        return Ok(Value::Fragment(options.inverse(&[], ValueMap::new())?));
    }

    let length = items.len();
    let mut out = Fragment::new();
    for (index, item) in items.iter().enumerate() {
        let mut data = ValueMap::new();
        data.insert("index".into(), Value::from(index as i64));
        data.insert("length".into(), Value::from(length as i64));
        data.insert("first".into(), Value::Bool(index == 0));
        data.insert("last".into(), Value::Bool(index + 1 == length));
        data.insert(
            "next".into(),
            items.get(index + 1).cloned().unwrap_or_default(),
        );
        data.insert(
            "prev".into(),
            index
                .checked_sub(1)
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or_default(),
        );
        data.insert("record".into(), item.get(RECORD_META_KEY));
        out.extend(options.block(std::slice::from_ref(item), data)?);
    }
    Ok(Value::Fragment(out))
}

pub struct Each;

impl Operator for Each {
    fn name(&self) -> &str {
        "each"
    }

    fn rebinds_this(&self) -> bool {
        true
    }

    fn run(&self, params: &[Value], _hash: &ValueMap, options: &HelperOptions<'_>) -> Result<Value> {
        if !options.is_block() {
            return Ok(Value::Null);
        }
        iterate(&to_items(first_param(params)), options)
    }
}

/// `each` over a declared collection section, with an optional `limit`.
pub struct Collection;

impl Operator for Collection {
    fn name(&self) -> &str {
        "collection"
    }

    fn branch(&self) -> Option<RecordType> {
        Some(RecordType::Collection)
    }

    fn rebinds_this(&self) -> bool {
        true
    }

    fn block_param(&self, index: usize, node: &BlockNode) -> Option<Alias> {
        if index != 0 {
            return None;
        }
        let expr = ParsedExpr::from_invocation(&node.params, &node.hash)?;
        if expr.is_private {
            return None;
        }
        Some(Alias::new(expr.branch_name(), RecordType::Collection))
    }

    fn run(&self, params: &[Value], hash: &ValueMap, options: &HelperOptions<'_>) -> Result<Value> {
        if !options.is_block() {
            return Ok(Value::Null);
        }
        let mut items = to_items(first_param(params));
        if let Some(limit) = hash.get("limit").and_then(Value::as_number) {
            if limit >= 0.0 {
                items.truncate(limit as usize);
            }
        }
        iterate(&items, options)
    }
}

/// Render the body with `this` bound to a named section.
pub struct Section;

impl Operator for Section {
    fn name(&self) -> &str {
        "section"
    }

    fn rebinds_this(&self) -> bool {
        true
    }

    fn run(&self, params: &[Value], _hash: &ValueMap, options: &HelperOptions<'_>) -> Result<Value> {
        let value = match first_param(params) {
            Value::String(name) => options.lookup(&name),
            other => other,
        };
        match value.resolved() {
            Value::Array(items) => iterate(&items, options),
            value if value.is_truthy() => Ok(Value::Fragment(
                options.block(std::slice::from_ref(&value), ValueMap::new())?,
            )),
            _ => Ok(Value::Fragment(options.inverse(&[], ValueMap::new())?)),
        }
    }
}

/// Group items by the distinct values of `key`.
pub struct Collate;

impl Operator for Collate {
    fn name(&self) -> &str {
        "collate"
    }

    fn branch(&self) -> Option<RecordType> {
        Some(RecordType::Collection)
    }

    fn run(&self, params: &[Value], hash: &ValueMap, options: &HelperOptions<'_>) -> Result<Value> {
        let key = hash
            .get("key")
            .map(Value::display)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| TesseraError::MissingOperatorArgument {
                operator: self.name().to_string(),
                argument: "key".to_string(),
            })?;
        let default = hash.get("default").filter(|v| v.is_truthy()).cloned();

        let mut distinct: IndexMap<String, Value> = IndexMap::new();
        for item in to_items(first_param(params)) {
            let values: Vec<Value> = match item.get(&key).resolved() {
                Value::Array(values) => values.into_iter().map(Value::resolved).collect(),
                value => vec![value],
            };
            // Falsy values such as `0` or `false` are still values.
            let mut values: Vec<Value> = values.into_iter().filter(|v| !v.is_null()).collect();
            if values.is_empty() {
                values.extend(default.clone());
            }
            for value in values {
                distinct.entry(value.display()).or_insert(value);
            }
        }

        let groups: Vec<Value> = distinct
            .into_iter()
            .map(|(name, value)| {
                let mut group = ValueMap::new();
                group.insert("slug".into(), Value::String(slugify(&name)));
                group.insert("name".into(), Value::String(name));
                group.insert("value".into(), value);
                Value::Object(group)
            })
            .collect();
        iterate(&groups, options)
    }
}
