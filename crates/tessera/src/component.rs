//! Component resolution shared by the schema walker and the renderer.

use crate::error::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tessera_ast::Document;

/// Trait for looking up parsed component (or partial) trees by name
pub trait ComponentResolver: Send + Sync + std::fmt::Debug {
    /// Try to resolve a component tree by tag name
    fn resolve(&self, name: &str) -> Option<Arc<Document>>;

    /// Check if a component with the given name exists
    fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }
}

/// A resolver that knows no components.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoComponents;

impl ComponentResolver for NoComponents {
    fn resolve(&self, _name: &str) -> Option<Arc<Document>> {
        None
    }
}

/// A simple resolver backed by a HashMap of parsed trees.
#[derive(Debug, Clone, Default)]
pub struct ComponentLibrary {
    components: HashMap<String, Arc<Document>>,
}

impl ComponentLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an already parsed tree.
    pub fn insert(&mut self, name: impl Into<String>, document: Document) {
        self.insert_shared(name, Arc::new(document));
    }

    pub fn insert_shared(&mut self, name: impl Into<String>, document: Arc<Document>) {
        self.components.insert(name.into(), document);
    }

    /// Parse `source` and add it under `name`.
    pub fn add(&mut self, name: impl Into<String>, source: &str) -> Result<()> {
        let document = tessera_ast::parse(source)?;
        self.insert(name, document);
        Ok(())
    }

    pub fn names(&self) -> Vec<String> {
        self.components.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl ComponentResolver for ComponentLibrary {
    fn resolve(&self, name: &str) -> Option<Arc<Document>> {
        self.components.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_resolves_added_components() {
        let mut library = ComponentLibrary::new();
        library.add("Card", "<div class=\"card\">{{yield}}</div>").unwrap();
        assert!(library.contains("Card"));
        assert!(!library.contains("Badge"));
        assert_eq!(library.len(), 1);
    }

    #[test]
    fn test_add_reports_syntax_errors() {
        let mut library = ComponentLibrary::new();
        assert!(library.add("Broken", "<div>").is_err());
        assert!(library.is_empty());
    }

    #[test]
    fn test_no_components() {
        assert!(NoComponents.resolve("Card").is_none());
    }
}
