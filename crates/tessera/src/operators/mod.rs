//! Named operators: the control and formatting primitives templates call.
//!
//! An operator plays two roles. During schema inference its flags tell the
//! walker whether a call declares a field or a branch and how `this` and
//! block params resolve in its body. During rendering [`Operator::run`]
//! receives evaluated arguments and, for blocks, callbacks that render the
//! block body or its inverse.

mod conditional;
mod field;
mod format;
mod iteration;

pub use conditional::{And, Equals, If, Or, Unless};
pub use field::{Image, Link};
pub use format::{Date, Log, Math};
pub use iteration::{Collate, Collection, Each, Section};

use crate::error::Result;
use crate::expr::ParsedExpr;
use crate::fragment::Fragment;
use crate::schema::RecordType;
use crate::scope::Alias;
use crate::value::{Value, ValueMap};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tessera_ast::BlockNode;

/// Renders a block body (or inverse) with the given block params and data.
pub type BlockFn<'a> = dyn Fn(&[Value], ValueMap) -> Result<Fragment> + 'a;

/// Resolves a name against the root render context.
pub type LookupFn<'a> = dyn Fn(&str) -> Value + 'a;

pub trait Operator: Send + Sync {
    fn name(&self) -> &str;

    /// Whether a call declares a content field.
    fn is_field(&self) -> bool {
        false
    }

    /// Record type of the section a block call declares.
    fn branch(&self) -> Option<RecordType> {
        None
    }

    /// Whether the block body sees a different `this` than its surroundings.
    fn rebinds_this(&self) -> bool {
        false
    }

    /// Field type for a field-declaring call.
    fn field_type(&self, _expr: &ParsedExpr) -> Option<String> {
        None
    }

    /// Alias for the block param at `index`, when it names a known section.
    fn block_param(&self, _index: usize, _node: &BlockNode) -> Option<Alias> {
        None
    }

    fn run(&self, params: &[Value], hash: &ValueMap, options: &HelperOptions<'_>) -> Result<Value>;
}

/// Per-call handle into the renderer.
pub struct HelperOptions<'a> {
    name: &'a str,
    block: Option<&'a BlockFn<'a>>,
    inverse: Option<&'a BlockFn<'a>>,
    lookup: &'a LookupFn<'a>,
}

impl<'a> HelperOptions<'a> {
    pub fn new(name: &'a str, lookup: &'a LookupFn<'a>) -> Self {
        Self {
            name,
            block: None,
            inverse: None,
            lookup,
        }
    }

    pub fn with_block(mut self, block: &'a BlockFn<'a>, inverse: &'a BlockFn<'a>) -> Self {
        self.block = Some(block);
        self.inverse = Some(inverse);
        self
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn is_block(&self) -> bool {
        self.block.is_some()
    }

    /// Render the block body. Outside block form this renders nothing.
    pub fn block(&self, params: &[Value], data: ValueMap) -> Result<Fragment> {
        match self.block {
            Some(block) => block(params, data),
            None => Ok(Fragment::new()),
        }
    }

    /// Render the `{{else}}` branch, empty when absent.
    pub fn inverse(&self, params: &[Value], data: ValueMap) -> Result<Fragment> {
        match self.inverse {
            Some(inverse) => inverse(params, data),
            None => Ok(Fragment::new()),
        }
    }

    /// Look a name up in the root render context.
    pub fn lookup(&self, name: &str) -> Value {
        (self.lookup)(name)
    }
}

/// Value of the first positional argument, forced.
pub(crate) fn first_param(params: &[Value]) -> Value {
    params.first().cloned().unwrap_or_default().resolved()
}

// ============================================================================
// Registry
// ============================================================================

/// Closed name → operator table.
#[derive(Clone)]
pub struct OperatorRegistry {
    operators: HashMap<String, Arc<dyn Operator>>,
}

impl OperatorRegistry {
    /// Registry with every built-in operator.
    pub fn builtin() -> Self {
        Self::builder().with_builtins().build()
    }

    pub fn builder() -> OperatorRegistryBuilder {
        OperatorRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Operator> {
        self.operators.get(name).map(|op| op.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("operators", &self.names())
            .finish()
    }
}

#[derive(Default)]
pub struct OperatorRegistryBuilder {
    operators: HashMap<String, Arc<dyn Operator>>,
}

impl OperatorRegistryBuilder {
    /// Register an operator, replacing any earlier one with the same name.
    pub fn register(mut self, operator: impl Operator + 'static) -> Self {
        self.operators
            .insert(operator.name().to_string(), Arc::new(operator));
        self
    }

    pub fn with_builtins(self) -> Self {
        self.register(If)
            .register(Unless)
            .register(And)
            .register(Or)
            .register(Equals)
            .register(Each)
            .register(Collection)
            .register(Section)
            .register(Collate)
            .register(Math)
            .register(Date)
            .register(Log)
            .register(Link)
            .register(Image)
    }

    pub fn build(self) -> OperatorRegistry {
        OperatorRegistry {
            operators: self.operators,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Drive operators without a renderer.

    use super::*;
    use crate::fragment::DomNode;

    /// Render the block as a text node `block:<first param>` (or `block`).
    pub fn run_block(
        op: &dyn Operator,
        params: &[Value],
        hash: &ValueMap,
    ) -> Result<(Value, Vec<(Vec<Value>, ValueMap)>)> {
        let calls = std::cell::RefCell::new(Vec::new());
        let block = |args: &[Value], data: ValueMap| -> Result<Fragment> {
            calls.borrow_mut().push((args.to_vec(), data));
            let label = args.first().map(Value::display).unwrap_or_default();
            Ok(Fragment::from(vec![DomNode::Text(format!("block:{label}"))]))
        };
        let inverse = |_: &[Value], _: ValueMap| -> Result<Fragment> {
            Ok(Fragment::from(vec![DomNode::Text("inverse".into())]))
        };
        let lookup = |_: &str| Value::Null;
        let options = HelperOptions::new(op.name(), &lookup).with_block(&block, &inverse);
        let value = op.run(params, hash, &options)?;
        Ok((value, calls.into_inner()))
    }

    pub fn run_inline(op: &dyn Operator, params: &[Value], hash: &ValueMap) -> Result<Value> {
        let lookup = |_: &str| Value::Null;
        let options = HelperOptions::new(op.name(), &lookup);
        op.run(params, hash, &options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry() {
        let registry = OperatorRegistry::builtin();
        for name in [
            "if", "unless", "each", "collection", "section", "collate", "eq", "math", "link",
            "image", "date", "and", "or", "log",
        ] {
            assert!(registry.contains(name), "missing {name}");
        }
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn test_operator_flags() {
        let registry = OperatorRegistry::builtin();
        assert_eq!(
            registry.get("collection").unwrap().branch(),
            Some(RecordType::Collection)
        );
        assert!(registry.get("each").unwrap().rebinds_this());
        assert!(registry.get("image").unwrap().is_field());
        assert!(registry.get("image").unwrap().rebinds_this());
        assert!(registry.get("link").unwrap().rebinds_this());
        assert!(!registry.get("if").unwrap().is_field());
    }

    struct Shout;

    impl Operator for Shout {
        fn name(&self) -> &str {
            "shout"
        }

        fn run(&self, params: &[Value], _: &ValueMap, _: &HelperOptions<'_>) -> Result<Value> {
            Ok(Value::String(first_param(params).display().to_uppercase()))
        }
    }

    #[test]
    fn test_custom_operator() {
        let registry = OperatorRegistry::builder().register(Shout).build();
        let op = registry.get("shout").unwrap();
        let value = testing::run_inline(op, &[Value::from("hi")], &ValueMap::new()).unwrap();
        assert_eq!(value, Value::from("HI"));
        assert!(!registry.contains("if"));
    }
}
