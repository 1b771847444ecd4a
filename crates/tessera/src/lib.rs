//! Tessera - templates that double as a content schema
//!
//! A Tessera site is a set of HTML templates with embedded `{{ ... }}`
//! expressions. The same templates are used twice:
//! - statically, to infer the content schema: `{{title}}` declares a field,
//!   `{{#collection posts}}` declares a collection, and so on
//! - at request time, to render stored content into a document tree
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//!
//! let html = tessera::render(
//!     "<h1>{{title}}</h1><p>{{body}}</p>",
//!     json!({"this": {"title": "Hello", "body": "World"}}),
//! ).unwrap();
//!
//! assert_eq!(html, "<h1>Hello</h1><p>World</p>");
//! ```

// Public modules
pub mod component;
pub mod config;
pub mod context;
pub mod directive;
pub mod error;
pub mod expr;
pub mod fragment;
pub mod html_escape;
pub mod operators;
pub mod renderer;
pub mod schema;
pub mod scope;
pub mod site;
pub mod slug;
pub mod store;
pub mod value;
pub mod walker;

pub use component::{ComponentLibrary, ComponentResolver, NoComponents};
pub use config::{EngineConfig, UnscopedFieldPolicy};
pub use context::{make_page_context, ContextAssembler, Record, RenderContext};
pub use directive::{DirectiveRegistry, FieldFailurePolicy, FieldRenderer};
pub use error::{Result, TesseraError};
pub use fragment::{DomElement, DomNode, Fragment};
pub use operators::{HelperOptions, Operator, OperatorRegistry};
pub use renderer::Renderer;
pub use schema::{Field, RecordType, Schema, Template};
pub use scope::{Alias, AliasScope};
pub use site::{SchemaStore, Site};
pub use store::{publish_schema, ContentStore, MemoryStore};
pub use tessera_ast::{Document, Location, ParseError};
pub use value::{LazyValue, Value, ValueMap};
pub use walker::{walk, SchemaWalker};

/// Parses, infers and renders with one shared configuration.
#[derive(Debug, Default)]
pub struct Engine {
    config: EngineConfig,
    operators: OperatorRegistry,
    directives: DirectiveRegistry,
    components: ComponentLibrary,
}

impl Engine {
    /// Engine with the built-in operators and directives.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the operator set.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tessera::{Engine, OperatorRegistry};
    /// use tessera::operators::If;
    ///
    /// let engine = Engine::new().with_operators(OperatorRegistry::builder().register(If).build());
    /// assert!(engine.operators().contains("if"));
    /// assert!(!engine.operators().contains("each"));
    /// ```
    pub fn with_operators(mut self, operators: OperatorRegistry) -> Self {
        self.operators = operators;
        self
    }

    pub fn with_directives(mut self, directives: DirectiveRegistry) -> Self {
        self.directives = directives;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn operators(&self) -> &OperatorRegistry {
        &self.operators
    }

    pub fn components(&self) -> &ComponentLibrary {
        &self.components
    }

    /// Parse a template source string.
    pub fn parse(&self, source: &str) -> Result<Document> {
        Ok(tessera_ast::parse(source)?)
    }

    /// Parse `source` and make it available as `<name>` to both passes.
    pub fn register_component(&mut self, name: impl Into<String>, source: &str) -> Result<()> {
        self.components.add(name, source)
    }

    /// Infer the schema one template declares, with `this` bound to the
    /// template `name` of type `record_type`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tessera::{Engine, RecordType};
    ///
    /// let engine = Engine::new();
    /// let tree = engine.parse("<h1>{{title}}</h1><p>{{body}}</p>").unwrap();
    /// let schema = engine.infer_schema(&tree, "index", RecordType::Page).unwrap();
    ///
    /// let index = schema.get("page:index").unwrap();
    /// assert_eq!(index.fields.keys().collect::<Vec<_>>(), vec!["title", "body"]);
    /// ```
    pub fn infer_schema(&self, tree: &Document, name: &str, record_type: RecordType) -> Result<Schema> {
        let scope = AliasScope::with_this(Alias::new(name, record_type));
        let mut schema = SchemaWalker::new(&self.operators)
            .with_components(&self.components)
            .with_config(&self.config)
            .walk(tree, &scope)?;
        schema.get_or_insert(name, record_type);
        Ok(schema)
    }

    /// Render `tree` against a root context and global `@` data.
    pub fn render(&self, tree: &Document, context: &Value, data: ValueMap) -> Result<Fragment> {
        Renderer::new(&self.operators)
            .with_components(&self.components)
            .render(tree, context, data)
    }

    /// Assemble the context for `record` and render `tree` with it.
    pub fn render_page(
        &self,
        tree: &Document,
        record: &Record,
        records: &[Record],
        schema: &Schema,
        site: &Value,
    ) -> Result<String> {
        let context = ContextAssembler::new()
            .with_directives(self.directives.clone())
            .with_failure_policy(self.config.field_failures)
            .assemble(record, records, schema, site)?;
        let fragment = self.render(tree, &context.context_value(), context.data_value())?;
        Ok(fragment.to_html())
    }
}

/// Convenience function: parse and render in one call
///
/// # Example
///
/// ```rust
/// use serde_json::json;
///
/// let result = tessera::render(
///     "{{#each items}}<li>{{this}}</li>{{/each}}",
///     json!({"items": ["a", "b"]}),
/// ).unwrap();
///
/// assert_eq!(result, "<li>a</li><li>b</li>");
/// ```
pub fn render(source: &str, data: serde_json::Value) -> Result<String> {
    let engine = Engine::new();
    let tree = engine.parse(source)?;
    let fragment = engine.render(&tree, &Value::from_json(data), ValueMap::new())?;
    Ok(fragment.to_html())
}
