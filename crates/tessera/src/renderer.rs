//! Renderer for evaluating Tessera expression trees.
//!
//! Rendering is a synchronous walk over an immutable [`Document`]. Every call
//! owns a [`RenderSession`] with the component cache and the stack of
//! components currently being rendered, so independent renders share nothing
//! mutable.
//!
//! Names resolve in three places: `@name` reads the data scope (loop metadata,
//! component attributes, then the global render data), `this.name` reads the
//! current `this`, and a bare `name` tries block params, then `this`, then the
//! root context.

use crate::component::{ComponentResolver, NoComponents};
use crate::error::{Result, TesseraError};
use crate::fragment::{DomElement, DomNode, Fragment};
use crate::operators::{HelperOptions, Operator, OperatorRegistry};
use crate::value::{Value, ValueMap};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use tessera_ast::{
    AttrPart, AttrValue, BlockNode, CommentKind, Document, ElementNode, Expr, Hash, Literal,
    MustacheNode, Node, PathExpr, Program,
};
use tracing::trace;
use uuid::Uuid;

/// Renders documents against a root context.
#[derive(Clone, Copy)]
pub struct Renderer<'a> {
    operators: &'a OperatorRegistry,
    components: &'a dyn ComponentResolver,
}

impl<'a> Renderer<'a> {
    pub fn new(operators: &'a OperatorRegistry) -> Self {
        Self {
            operators,
            components: &NoComponents,
        }
    }

    pub fn with_components(mut self, components: &'a dyn ComponentResolver) -> Self {
        self.components = components;
        self
    }

    /// Render `tree` with `root` as the root context and `data` as the
    /// global `@` data.
    pub fn render(&self, tree: &Document, root: &Value, data: ValueMap) -> Result<Fragment> {
        let session = RenderSession {
            operators: self.operators,
            components: self.components,
            root,
            globals: data,
            cache: RefCell::new(HashMap::new()),
            resolving: RefCell::new(Vec::new()),
        };
        let frame = Frame::root(root.get("this").resolved());
        session.render_nodes(tree.nodes(), &frame)
    }
}

/// Render `tree` once with the given collaborators.
pub fn render(
    tree: &Document,
    components: &dyn ComponentResolver,
    operators: &OperatorRegistry,
    context: &Value,
    data: ValueMap,
) -> Result<Fragment> {
    Renderer::new(operators)
        .with_components(components)
        .render(tree, context, data)
}

// ============================================================================
// Scope frames
// ============================================================================

/// One level of render scope. Child frames shadow but never modify parents.
struct Frame<'f> {
    parent: Option<&'f Frame<'f>>,
    this: Value,
    locals: ValueMap,
    data: ValueMap,
    yielded: Option<&'f Fragment>,
}

impl Frame<'static> {
    fn root(this: Value) -> Self {
        Self {
            parent: None,
            this,
            locals: ValueMap::new(),
            data: ValueMap::new(),
            yielded: None,
        }
    }
}

impl<'f> Frame<'f> {
    fn child(&'f self, this: Value, locals: ValueMap, data: ValueMap) -> Frame<'f> {
        Frame {
            parent: Some(self),
            this,
            locals,
            data,
            yielded: None,
        }
    }

    fn local(&self, name: &str) -> Option<&Value> {
        self.locals
            .get(name)
            .or_else(|| self.parent.and_then(|p| p.local(name)))
    }

    fn data(&self, name: &str) -> Option<&Value> {
        self.data
            .get(name)
            .or_else(|| self.parent.and_then(|p| p.data(name)))
    }

    fn yielded(&self) -> Option<&Fragment> {
        self.yielded
            .or_else(|| self.parent.and_then(|p| p.yielded()))
    }
}

// ============================================================================
// Session
// ============================================================================

/// Per-render state.
struct RenderSession<'r> {
    operators: &'r OperatorRegistry,
    components: &'r dyn ComponentResolver,
    root: &'r Value,
    globals: ValueMap,
    cache: RefCell<HashMap<String, Option<Arc<Document>>>>,
    resolving: RefCell<Vec<String>>,
}

impl<'r> RenderSession<'r> {
    fn render_nodes(&self, nodes: &[Node], frame: &Frame<'_>) -> Result<Fragment> {
        let mut out = Fragment::new();
        for node in nodes {
            self.render_node(node, frame, &mut out)?;
        }
        Ok(out)
    }

    fn render_node(&self, node: &Node, frame: &Frame<'_>, out: &mut Fragment) -> Result<()> {
        match node {
            Node::Text(n) => out.push_text(n.chars.as_str()),
            Node::Element(n) => self.render_element(n, frame, out)?,
            Node::Mustache(n) => {
                let value = self.eval_mustache(n, frame)?;
                let value = if n.trusting { trust(value) } else { value };
                push_value(out, value);
            }
            Node::Block(n) => self.render_block(n, frame, out)?,
            Node::Comment(n) => {
                if n.kind == CommentKind::Markup {
                    out.push(DomNode::Comment(n.value.clone()));
                }
            }
            Node::Partial(n) => {
                return Err(TesseraError::UnsupportedFeature {
                    feature: format!("Partial '{}'", n.name),
                    location: n.location,
                })
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Elements and components
    // ------------------------------------------------------------------------

    fn render_element(&self, node: &ElementNode, frame: &Frame<'_>, out: &mut Fragment) -> Result<()> {
        if node.is_component() {
            if let Some(document) = self.component(&node.tag) {
                return self.render_component(node, &document, frame, out);
            }
        }

        let mut element = DomElement::new(node.tag.as_str());
        element.append_fragment(self.render_nodes(&node.children, frame)?);
        for attr in &node.attributes {
            let value = match &attr.value {
                AttrValue::Text(text) => text.clone(),
                AttrValue::Concat(parts) => self.concat(parts, frame)?,
                AttrValue::Mustache(_) => {
                    return Err(TesseraError::InvalidAttribute {
                        tag: node.tag.clone(),
                        name: attr.name.clone(),
                        location: attr.location,
                    })
                }
            };
            element.set_attribute(attr.name.as_str(), value);
        }
        out.push(DomNode::Element(element));
        Ok(())
    }

    fn render_component(
        &self,
        node: &ElementNode,
        document: &Document,
        frame: &Frame<'_>,
        out: &mut Fragment,
    ) -> Result<()> {
        trace!(component = %node.tag, "rendering component");

        let mut data = ValueMap::new();
        for attr in &node.attributes {
            let Some(name) = attr.name.strip_prefix('@') else {
                continue;
            };
            let value = match &attr.value {
                AttrValue::Text(text) => Value::String(text.clone()),
                AttrValue::Mustache(m) => self.eval_mustache(m, frame)?,
                AttrValue::Concat(parts) => Value::String(self.concat(parts, frame)?),
            };
            data.insert(name.to_string(), value);
        }
        data.insert(
            "componentId".to_string(),
            Value::String(Uuid::new_v4().to_string()),
        );

        // Children belong to the caller's scope.
        let yielded = self.render_nodes(&node.children, frame)?;

        self.enter(&node.tag)?;
        let body = Frame {
            parent: None,
            this: frame.this.clone(),
            locals: ValueMap::new(),
            data,
            yielded: Some(&yielded),
        };
        let rendered = self.render_nodes(document.nodes(), &body);
        self.resolving.borrow_mut().pop();

        out.extend(rendered?);
        Ok(())
    }

    fn component(&self, tag: &str) -> Option<Arc<Document>> {
        self.cache
            .borrow_mut()
            .entry(tag.to_string())
            .or_insert_with(|| self.components.resolve(tag))
            .clone()
    }

    fn enter(&self, tag: &str) -> Result<()> {
        let mut resolving = self.resolving.borrow_mut();
        if resolving.iter().any(|t| t == tag) {
            let mut chain = resolving.clone();
            chain.push(tag.to_string());
            return Err(TesseraError::ComponentCycle { chain });
        }
        resolving.push(tag.to_string());
        Ok(())
    }

    fn concat(&self, parts: &[AttrPart], frame: &Frame<'_>) -> Result<String> {
        let mut out = String::new();
        for part in parts {
            match part {
                AttrPart::Text(text) => out.push_str(text),
                AttrPart::Mustache(m) => out.push_str(&self.eval_mustache(m, frame)?.display()),
            }
        }
        Ok(out)
    }

    // ------------------------------------------------------------------------
    // Mustaches and blocks
    // ------------------------------------------------------------------------

    fn eval_mustache(&self, node: &MustacheNode, frame: &Frame<'_>) -> Result<Value> {
        let Expr::Path(path) = &node.path else {
            return self.eval_expr(&node.path, frame);
        };

        if !node.params.is_empty() {
            let op = path
                .simple_name()
                .and_then(|name| self.operators.get(name))
                .ok_or_else(|| unknown_operator(path))?;
            return self.call(op, &path.original, &node.params, &node.hash, frame);
        }
        if path.simple_name() == Some("yield") {
            return Ok(Value::Fragment(frame.yielded().cloned().unwrap_or_default()));
        }

        let value = self.resolve_path(path, frame);
        if !value.is_null() {
            return Ok(value);
        }
        match node.hash.get("default") {
            Some(default) => self.eval_expr(default, frame),
            None => Ok(Value::Null),
        }
    }

    fn render_block(&self, node: &BlockNode, frame: &Frame<'_>, out: &mut Fragment) -> Result<()> {
        let name = node.path.original.as_str();
        let op = self
            .operators
            .get(name)
            .ok_or_else(|| unknown_operator(&node.path))?;
        trace!(operator = name, line = node.location.line, "rendering block");

        let params = self.eval_params(&node.params, frame)?;
        let hash = self.eval_hash(&node.hash, frame)?;

        let block = |args: &[Value], data: ValueMap| -> Result<Fragment> {
            self.render_program(&node.program, frame, args, data)
        };
        let inverse = |args: &[Value], data: ValueMap| -> Result<Fragment> {
            match &node.inverse {
                Some(program) => self.render_program(program, frame, args, data),
                None => Ok(Fragment::new()),
            }
        };
        let lookup = |key: &str| self.root.get(key);
        let options = HelperOptions::new(name, &lookup).with_block(&block, &inverse);

        push_value(out, op.run(&params, &hash, &options)?);
        Ok(())
    }

    /// Render a block body in a child frame: `this` is the first argument,
    /// declared block params bind positionally.
    fn render_program(
        &self,
        program: &Program,
        frame: &Frame<'_>,
        args: &[Value],
        data: ValueMap,
    ) -> Result<Fragment> {
        let this = args.first().cloned().unwrap_or_else(|| frame.this.clone());
        let locals: ValueMap = program
            .block_params
            .iter()
            .cloned()
            .zip(args.iter().cloned())
            .collect();
        let child = frame.child(this, locals, data);
        self.render_nodes(&program.body, &child)
    }

    fn call(
        &self,
        op: &dyn Operator,
        name: &str,
        params: &[Expr],
        hash: &Hash,
        frame: &Frame<'_>,
    ) -> Result<Value> {
        let params = self.eval_params(params, frame)?;
        let hash = self.eval_hash(hash, frame)?;
        let lookup = |key: &str| self.root.get(key);
        op.run(&params, &hash, &HelperOptions::new(name, &lookup))
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn eval_expr(&self, expr: &Expr, frame: &Frame<'_>) -> Result<Value> {
        match expr {
            Expr::Path(path) => Ok(self.resolve_path(path, frame)),
            Expr::Literal(literal) => Ok(literal_value(&literal.value)),
            Expr::SubExpression(sub) if sub.params.is_empty() => Ok(self.resolve_path(&sub.path, frame)),
            Expr::SubExpression(sub) => {
                let name = sub.path.original.as_str();
                let op = self
                    .operators
                    .get(name)
                    .ok_or_else(|| unknown_operator(&sub.path))?;
                self.call(op, name, &sub.params, &sub.hash, frame)
            }
        }
    }

    fn eval_params(&self, params: &[Expr], frame: &Frame<'_>) -> Result<Vec<Value>> {
        params.iter().map(|p| self.eval_expr(p, frame)).collect()
    }

    fn eval_hash(&self, hash: &Hash, frame: &Frame<'_>) -> Result<ValueMap> {
        hash.pairs
            .iter()
            .map(|pair| Ok((pair.key.clone(), self.eval_expr(&pair.value, frame)?)))
            .collect()
    }

    fn resolve_path(&self, path: &PathExpr, frame: &Frame<'_>) -> Value {
        let (base, rest) = if path.data_rooted {
            let Some((head, rest)) = path.parts.split_first() else {
                return Value::Null;
            };
            let base = frame
                .data(head)
                .or_else(|| self.globals.get(head))
                .cloned()
                .unwrap_or_default();
            (base, rest)
        } else if path.this_rooted {
            (frame.this.clone(), path.parts.as_slice())
        } else {
            let Some((head, rest)) = path.parts.split_first() else {
                return frame.this.clone();
            };
            let base = match frame.local(head) {
                Some(value) => value.clone(),
                None => {
                    let from_this = frame.this.get(head);
                    if from_this.is_null() {
                        self.root.get(head)
                    } else {
                        from_this
                    }
                }
            };
            (base, rest)
        };

        let mut value = base.resolved();
        for part in rest {
            if value.is_null() {
                break;
            }
            value = value.get(part).resolved();
        }
        value
    }
}

fn unknown_operator(path: &PathExpr) -> TesseraError {
    TesseraError::UnknownOperator {
        name: path.original.clone(),
        location: path.location,
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::String(s) => Value::String(s.clone()),
        Literal::Number(n) => Value::Number(*n),
        Literal::Boolean(b) => Value::Bool(*b),
        Literal::Null | Literal::Undefined => Value::Null,
    }
}

/// Triple-stash output: the value is trusted markup.
fn trust(value: Value) -> Value {
    match value.resolved() {
        Value::Null => Value::Null,
        fragment @ Value::Fragment(_) => fragment,
        other => Value::Safe(other.display()),
    }
}

fn push_value(out: &mut Fragment, value: Value) {
    match value.resolved() {
        Value::Null => {}
        Value::Safe(markup) => out.push(DomNode::Raw(markup)),
        Value::Fragment(fragment) => out.extend(fragment),
        other => out.push_text(other.display()),
    }
}
