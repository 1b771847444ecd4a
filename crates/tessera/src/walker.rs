//! Schema inference: walk a template tree and collect the record types and
//! fields it references.
//!
//! The walker never evaluates anything. A reference such as `{{title}}`
//! becomes a field of whatever section `this` is bound to; blocks like
//! `{{#collection posts}}` declare new sections and rebind `this` for their
//! body. Bindings live in an [`AliasScope`] chain, so a block only affects
//! the scope of its own body.

use crate::component::{ComponentResolver, NoComponents};
use crate::config::{EngineConfig, UnscopedFieldPolicy};
use crate::error::{Result, TesseraError};
use crate::expr::{evaluate_hash, ParsedExpr};
use crate::operators::OperatorRegistry;
use crate::schema::{RecordType, Schema};
use crate::scope::{Alias, AliasScope};
use serde_json::Value as JsonValue;
use tessera_ast::{
    AttrPart, AttrValue, BlockNode, Document, ElementNode, Expr, Hash, Literal, MustacheNode,
    Node, PartialNode, PathExpr,
};
use tracing::{trace, warn};

/// Marker mustache for component children; never a field.
const YIELD: &str = "yield";

/// Walk `tree` with the built-in component-free setup.
pub fn walk(tree: &Document, operators: &OperatorRegistry, aliases: &AliasScope<'_>) -> Result<Schema> {
    SchemaWalker::new(operators).walk(tree, aliases)
}

pub struct SchemaWalker<'a> {
    operators: &'a OperatorRegistry,
    components: &'a dyn ComponentResolver,
    partials: &'a dyn ComponentResolver,
    unscoped: UnscopedFieldPolicy,
    general_section: String,
    resolving: Vec<String>,
}

impl<'a> SchemaWalker<'a> {
    pub fn new(operators: &'a OperatorRegistry) -> Self {
        Self {
            operators,
            components: &NoComponents,
            partials: &NoComponents,
            unscoped: UnscopedFieldPolicy::default(),
            general_section: EngineConfig::default().general_section,
            resolving: Vec::new(),
        }
    }

    pub fn with_components(mut self, components: &'a dyn ComponentResolver) -> Self {
        self.components = components;
        self
    }

    pub fn with_partials(mut self, partials: &'a dyn ComponentResolver) -> Self {
        self.partials = partials;
        self
    }

    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.unscoped = config.unscoped_fields;
        self.general_section = config.general_section.clone();
        self
    }

    /// Walk one tree into a fresh schema.
    pub fn walk(&mut self, tree: &Document, scope: &AliasScope<'_>) -> Result<Schema> {
        let mut schema = Schema::new();
        self.walk_into(tree, scope, &mut schema)?;
        Ok(schema)
    }

    /// Walk one tree, merging discoveries into `schema`.
    pub fn walk_into(
        &mut self,
        tree: &Document,
        scope: &AliasScope<'_>,
        schema: &mut Schema,
    ) -> Result<()> {
        self.resolving.clear();
        self.walk_nodes(tree.nodes(), scope, schema)
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    fn walk_nodes(
        &mut self,
        nodes: &[Node],
        scope: &AliasScope<'_>,
        schema: &mut Schema,
    ) -> Result<()> {
        for node in nodes {
            match node {
                Node::Text(_) | Node::Comment(_) => {}
                Node::Element(el) => self.walk_element(el, scope, schema)?,
                Node::Mustache(m) => self.walk_mustache(m, scope, schema)?,
                Node::Block(b) => self.walk_block(b, scope, schema)?,
                Node::Partial(p) => self.walk_partial(p, scope, schema)?,
            }
        }
        Ok(())
    }

    fn walk_element(
        &mut self,
        el: &ElementNode,
        scope: &AliasScope<'_>,
        schema: &mut Schema,
    ) -> Result<()> {
        if el.is_component() {
            if let Some(tree) = self.components.resolve(&el.tag) {
                trace!(component = %el.tag, "walking component");
                self.enter(&el.tag)?;
                let result = self.walk_nodes(tree.nodes(), scope, schema);
                self.resolving.pop();
                result?;
            }
        }

        for attr in &el.attributes {
            match &attr.value {
                AttrValue::Text(_) => {}
                AttrValue::Mustache(m) => self.walk_mustache(m, scope, schema)?,
                AttrValue::Concat(parts) => {
                    for part in parts {
                        if let AttrPart::Mustache(m) = part {
                            self.walk_mustache(m, scope, schema)?;
                        }
                    }
                }
            }
        }
        self.walk_nodes(&el.children, scope, schema)
    }

    fn walk_partial(
        &mut self,
        partial: &PartialNode,
        scope: &AliasScope<'_>,
        schema: &mut Schema,
    ) -> Result<()> {
        let Some(tree) = self.partials.resolve(&partial.name) else {
            return Ok(());
        };
        self.enter(&format!("> {}", partial.name))?;
        let result = self.walk_nodes(tree.nodes(), scope, schema);
        self.resolving.pop();
        result
    }

    fn enter(&mut self, name: &str) -> Result<()> {
        if self.resolving.iter().any(|n| n == name) {
            let mut chain = self.resolving.clone();
            chain.push(name.to_string());
            return Err(TesseraError::ComponentCycle { chain });
        }
        self.resolving.push(name.to_string());
        Ok(())
    }

    // ========================================================================
    // Mustaches and operator calls
    // ========================================================================

    fn walk_mustache(
        &mut self,
        m: &MustacheNode,
        scope: &AliasScope<'_>,
        schema: &mut Schema,
    ) -> Result<()> {
        match &m.path {
            Expr::Path(path) => self.walk_call(path, &m.params, &m.hash, scope, schema),
            Expr::SubExpression(sub) => {
                self.walk_call(&sub.path, &sub.params, &sub.hash, scope, schema)?;
                self.walk_params(&m.params, scope, schema)
            }
            Expr::Literal(_) => self.walk_params(&m.params, scope, schema),
        }
    }

    fn walk_call(
        &mut self,
        path: &PathExpr,
        params: &[Expr],
        hash: &Hash,
        scope: &AliasScope<'_>,
        schema: &mut Schema,
    ) -> Result<()> {
        if params.is_empty() && path.simple_name() == Some(YIELD) {
            return Ok(());
        }

        // Without arguments a name is a field reference, even when an
        // operator shares it (`{{date}}`, `{{image}}`).
        let operator = if params.is_empty() {
            None
        } else {
            path.simple_name().and_then(|name| self.operators.get(name))
        };
        match operator {
            None if params.is_empty() => {
                self.add_to_tree(ParsedExpr::from_path(path, hash), None, scope, schema)
            }
            None => {
                warn!(operator = %path.original, "unknown operator, walking its arguments only");
                self.walk_params(params, scope, schema)
            }
            Some(op) => {
                self.walk_params(params, scope, schema)?;
                if op.is_field() {
                    if let Some(leaf) = ParsedExpr::from_invocation(params, hash) {
                        let field_type = op.field_type(&leaf);
                        self.add_to_tree(Some(leaf), field_type, scope, schema)?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Arguments are references: paths declare fields, sub-expressions are calls.
    fn walk_params(
        &mut self,
        params: &[Expr],
        scope: &AliasScope<'_>,
        schema: &mut Schema,
    ) -> Result<()> {
        for param in params {
            match param {
                Expr::Path(path) => {
                    let leaf = ParsedExpr::from_path(path, &Hash::default());
                    self.add_to_tree(leaf, None, scope, schema)?;
                }
                Expr::SubExpression(sub) => {
                    self.walk_call(&sub.path, &sub.params, &sub.hash, scope, schema)?
                }
                Expr::Literal(_) => {}
            }
        }
        Ok(())
    }

    // ========================================================================
    // Blocks
    // ========================================================================

    fn walk_block(
        &mut self,
        node: &BlockNode,
        scope: &AliasScope<'_>,
        schema: &mut Schema,
    ) -> Result<()> {
        let name = node.path.original.as_str();
        let Some(op) = self.operators.get(name) else {
            warn!(block = name, "unknown block operator, skipping its body");
            return Ok(());
        };

        let mut child = scope.child();
        if name == "section" {
            self.bind_section(node, &mut child, schema);
        } else {
            let leaf = ParsedExpr::from_invocation(&node.params, &node.hash);
            if op.branch().is_none() {
                self.walk_params(&node.params, scope, schema)?;
            }
            if op.is_field() {
                if let Some(leaf) = leaf.clone() {
                    let field_type = op.field_type(&leaf);
                    self.add_to_tree(Some(leaf), field_type, scope, schema)?;
                }
            }
            if let Some(record_type) = op.branch() {
                let alias = ensure_branch(leaf.as_ref(), record_type, schema);
                child.bind("this", alias);
            } else if op.rebinds_this() {
                child.bind("this", Alias::private(name, RecordType::Settings));
            }
        }

        for (index, param) in node.program.block_params.iter().enumerate() {
            let alias = op
                .block_param(index, node)
                .unwrap_or_else(|| Alias::private(param.clone(), RecordType::Settings));
            child.bind(param.clone(), alias);
        }

        self.walk_nodes(&node.program.body, &child, schema)?;
        if let Some(inverse) = &node.inverse {
            self.walk_nodes(&inverse.body, &child, schema)?;
        }
        Ok(())
    }

    /// `{{#section name multiple=true}}` rebinds `this` to the named section.
    fn bind_section(&self, node: &BlockNode, child: &mut AliasScope<'_>, schema: &mut Schema) {
        let options = evaluate_hash(&node.hash);
        let record_type = if options.get("multiple") == Some(&JsonValue::Bool(true)) {
            RecordType::Collection
        } else {
            RecordType::Settings
        };

        let target = match node.params.first() {
            Some(Expr::Literal(lit)) => match &lit.value {
                Literal::String(name) => Some((name.clone(), false)),
                _ => None,
            },
            Some(Expr::Path(path)) => ParsedExpr::from_path(path, &node.hash)
                .map(|expr| (expr.branch_name().to_string(), expr.is_private)),
            _ => None,
        };
        let Some((name, is_private)) = target else {
            child.bind("this", Alias::private("section", record_type));
            return;
        };

        if !is_private {
            let sortable = options.get("sortable").is_some_and(json_truthy);
            schema.ensure_branch(&name, record_type, &options, sortable);
        }
        child.bind(
            "this",
            Alias {
                name,
                record_type,
                is_private,
            },
        );
    }

    // ========================================================================
    // Fields
    // ========================================================================

    /// Merge a discovered reference into the section it resolves to.
    fn add_to_tree(
        &self,
        leaf: Option<ParsedExpr>,
        field_type: Option<String>,
        scope: &AliasScope<'_>,
        schema: &mut Schema,
    ) -> Result<()> {
        let Some(leaf) = leaf else {
            return Ok(());
        };
        if leaf.is_private {
            return Ok(());
        }

        let (section, record_type) = match leaf.context.as_deref() {
            Some(context) => match scope.get(context) {
                Some(alias) if alias.is_private => return Ok(()),
                Some(alias) => (alias.name.clone(), alias.record_type),
                None if context == "this" => self.unscoped_section(&leaf)?,
                None => (context.to_string(), RecordType::Settings),
            },
            None => {
                if scope.get(&leaf.key).is_some() {
                    return Ok(());
                }
                match scope.this() {
                    Some(alias) if alias.is_private => return Ok(()),
                    Some(alias) => (alias.name.clone(), alias.record_type),
                    None => self.unscoped_section(&leaf)?,
                }
            }
        };

        let field_type = field_type.or_else(|| leaf.field_type.clone());
        trace!(section = %section, key = %leaf.key, "field");
        schema
            .get_or_insert(&section, record_type)
            .merge_leaf(&leaf.key, field_type.as_deref(), &leaf.hash);
        Ok(())
    }

    fn unscoped_section(&self, leaf: &ParsedExpr) -> Result<(String, RecordType)> {
        match self.unscoped {
            UnscopedFieldPolicy::Error => Err(TesseraError::UnscopedField {
                key: leaf.key.clone(),
                location: leaf.location,
            }),
            UnscopedFieldPolicy::General => {
                warn!(
                    key = %leaf.key,
                    section = %self.general_section,
                    "field has no enclosing section, using the general section"
                );
                Ok((self.general_section.clone(), RecordType::Settings))
            }
        }
    }
}

/// Declare the section a branch block names. A private or missing argument
/// declares nothing and hides the body's fields.
fn ensure_branch(leaf: Option<&ParsedExpr>, record_type: RecordType, schema: &mut Schema) -> Alias {
    match leaf {
        Some(leaf) if !leaf.is_private => {
            let name = leaf.branch_name().to_string();
            let sortable = leaf.hash.get("sortable").is_some_and(json_truthy);
            schema.ensure_branch(&name, record_type, &leaf.hash, sortable);
            Alias::new(name, record_type)
        }
        Some(leaf) => Alias::private(leaf.branch_name(), record_type),
        None => Alias::private(String::new(), record_type),
    }
}

fn json_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        JsonValue::String(s) => !s.is_empty() && s != "false",
        JsonValue::Array(a) => !a.is_empty(),
        JsonValue::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentLibrary;
    use pretty_assertions::assert_eq;

    fn page_scope() -> AliasScope<'static> {
        AliasScope::with_this(Alias::new("index", RecordType::Page))
    }

    fn infer(source: &str) -> Schema {
        let tree = tessera_ast::parse(source).unwrap();
        walk(&tree, &OperatorRegistry::builtin(), &page_scope()).unwrap()
    }

    fn field_keys(schema: &Schema, name: &str, record_type: RecordType) -> Vec<String> {
        schema
            .find(name, record_type)
            .map(|t| t.fields.keys().cloned().collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_plain_fields() {
        let schema = infer("<h1>{{title}}</h1><p>{{body}}</p>");
        assert_eq!(field_keys(&schema, "index", RecordType::Page), vec!["title", "body"]);
    }

    #[test]
    fn test_collection_branch() {
        let schema = infer("{{#collection posts}}<h2>{{this.title}}</h2>{{/collection}}");
        assert_eq!(field_keys(&schema, "posts", RecordType::Collection), vec!["title"]);
        assert!(schema.find("index", RecordType::Page).is_none());
    }

    #[test]
    fn test_collection_block_param_alias() {
        let schema = infer(
            "{{#collection posts sortable=true as |post|}}{{post.title}}{{post}}{{/collection}}",
        );
        let posts = schema.find("posts", RecordType::Collection).unwrap();
        assert!(posts.sortable);
        assert_eq!(posts.fields.keys().collect::<Vec<_>>(), vec!["title"]);
    }

    #[test]
    fn test_each_hides_fields() {
        let schema = infer("{{#each items}}{{label}}{{this.name}}{{/each}}{{heading}}");
        assert_eq!(field_keys(&schema, "index", RecordType::Page), vec!["items", "heading"]);
    }

    #[test]
    fn test_private_references() {
        let schema = infer("{{@site.title}}{{#each @pages as |page|}}{{page.name}}{{/each}}");
        assert!(schema.is_empty());
    }

    #[test]
    fn test_dotted_context_without_alias_is_settings() {
        let schema = infer("{{footer.copyright}}");
        assert_eq!(field_keys(&schema, "footer", RecordType::Settings), vec!["copyright"]);
    }

    #[test]
    fn test_section_rebinds_this() {
        let schema = infer(
            "{{#section \"footer\"}}{{copyright}}{{/section}}\
             {{#section team multiple=true}}{{name}}{{/section}}\
             {{#section @nav}}{{hidden}}{{/section}}",
        );
        assert_eq!(field_keys(&schema, "footer", RecordType::Settings), vec!["copyright"]);
        assert_eq!(field_keys(&schema, "team", RecordType::Collection), vec!["name"]);
        assert!(schema.find("nav", RecordType::Settings).is_none());
    }

    #[test]
    fn test_field_operators_set_type() {
        let schema = infer("{{date published}}{{#image hero}}<img>{{/image}}{{{body}}}");
        let page = schema.find("index", RecordType::Page).unwrap();
        assert_eq!(page.field("published").unwrap().field_type, "date");
        assert_eq!(page.field("hero").unwrap().field_type, "image");
        assert_eq!(page.field("body").unwrap().field_type, "text");
    }

    #[test]
    fn test_operator_names_without_arguments_are_fields() {
        let schema = infer("<img src=\"{{image}}\"><time>{{date}}</time><p>{{title}}</p>{{#if (link)}}x{{/if}}");
        assert_eq!(
            field_keys(&schema, "index", RecordType::Page),
            vec!["image", "date", "title", "link"]
        );
        let page = schema.find("index", RecordType::Page).unwrap();
        assert_eq!(page.field("date").unwrap().field_type, "text");
    }

    #[test]
    fn test_field_blocks_read_from_their_value() {
        let schema = infer(
            "{{#image hero}}<img src=\"{{src}}\" alt=\"{{alt}}\">{{/image}}\
             {{#link cta}}<a href=\"{{url}}\">{{text}}</a>{{/link}}",
        );
        assert_eq!(field_keys(&schema, "index", RecordType::Page), vec!["hero", "cta"]);
        let page = schema.find("index", RecordType::Page).unwrap();
        assert_eq!(page.field("hero").unwrap().field_type, "image");
        assert_eq!(page.field("cta").unwrap().field_type, "link");
    }

    #[test]
    fn test_hash_type_priority_and_label() {
        let schema = infer("{{summary type=\"html\" priority=3 label=\"Summary\"}}");
        let field = schema.find("index", RecordType::Page).unwrap().field("summary").unwrap().clone();
        assert_eq!(field.field_type, "html");
        assert_eq!(field.priority, 3);
        assert_eq!(field.label, "Summary");
    }

    #[test]
    fn test_yield_is_not_a_field() {
        assert!(infer("<div>{{yield}}</div>").is_empty());
    }

    #[test]
    fn test_unknown_block_is_skipped() {
        assert!(infer("{{#mystery}}{{title}}{{/mystery}}").is_empty());
    }

    #[test]
    fn test_unscoped_field_policy() {
        let tree = tessera_ast::parse("{{title}}").unwrap();
        let operators = OperatorRegistry::builtin();

        let result = walk(&tree, &operators, &AliasScope::root());
        assert!(matches!(result, Err(TesseraError::UnscopedField { ref key, .. }) if key == "title"));

        let config = EngineConfig {
            unscoped_fields: UnscopedFieldPolicy::General,
            ..EngineConfig::default()
        };
        let schema = SchemaWalker::new(&operators)
            .with_config(&config)
            .walk(&tree, &AliasScope::root())
            .unwrap();
        assert_eq!(field_keys(&schema, "general", RecordType::Settings), vec!["title"]);
    }

    #[test]
    fn test_components_inline_with_current_this() {
        let mut components = ComponentLibrary::new();
        components.add("Hero", "<header>{{headline}}{{yield}}</header>").unwrap();
        let tree = tessera_ast::parse("<Hero @tone=\"dark\"><p>{{intro}}</p></Hero>").unwrap();
        let operators = OperatorRegistry::builtin();

        let schema = SchemaWalker::new(&operators)
            .with_components(&components)
            .walk(&tree, &page_scope())
            .unwrap();
        assert_eq!(field_keys(&schema, "index", RecordType::Page), vec!["headline", "intro"]);
    }

    #[test]
    fn test_component_cycle() {
        let mut components = ComponentLibrary::new();
        components.add("Card", "<Badge />").unwrap();
        components.add("Badge", "<Card />").unwrap();
        let tree = tessera_ast::parse("<Card />").unwrap();
        let operators = OperatorRegistry::builtin();

        let result = SchemaWalker::new(&operators)
            .with_components(&components)
            .walk(&tree, &page_scope());
        match result {
            Err(TesseraError::ComponentCycle { chain }) => {
                assert_eq!(chain, vec!["Card", "Badge", "Card"])
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_partials_walked_when_registered() {
        let mut partials = ComponentLibrary::new();
        partials.add("footer", "<footer>{{copyright}}</footer>").unwrap();
        let tree = tessera_ast::parse("{{> footer}}{{> missing}}").unwrap();
        let operators = OperatorRegistry::builtin();

        let schema = SchemaWalker::new(&operators)
            .with_partials(&partials)
            .walk(&tree, &page_scope())
            .unwrap();
        assert_eq!(field_keys(&schema, "index", RecordType::Page), vec!["copyright"]);
    }

    #[test]
    fn test_walk_is_idempotent() {
        let source = "{{title}}{{#collection posts as |p|}}{{p.title}}{{date p.published}}{{/collection}}";
        assert_eq!(infer(source), infer(source));
    }
}
