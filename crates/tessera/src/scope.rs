//! Alias scopes for schema inference.
//!
//! A scope maps identifiers to the section they resolve to. Entering a block
//! creates a child scope that points at its parent; bindings in the child
//! shadow the parent without touching it.

use crate::schema::RecordType;
use indexmap::IndexMap;

/// How an identifier resolves to a section during inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub name: String,
    pub record_type: RecordType,
    /// Private aliases hide every field referenced through them.
    pub is_private: bool,
}

impl Alias {
    pub fn new(name: impl Into<String>, record_type: RecordType) -> Self {
        Self {
            name: name.into(),
            record_type,
            is_private: false,
        }
    }

    pub fn private(name: impl Into<String>, record_type: RecordType) -> Self {
        Self {
            name: name.into(),
            record_type,
            is_private: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct AliasScope<'p> {
    parent: Option<&'p AliasScope<'p>>,
    bindings: IndexMap<String, Alias>,
}

impl AliasScope<'static> {
    pub fn root() -> Self {
        Self::default()
    }

    /// Root scope with `this` bound to a page or collection template.
    pub fn with_this(alias: Alias) -> Self {
        let mut scope = Self::root();
        scope.bind("this", alias);
        scope
    }
}

impl<'p> AliasScope<'p> {
    pub fn child(&self) -> AliasScope<'_> {
        AliasScope {
            parent: Some(self),
            bindings: IndexMap::new(),
        }
    }

    pub fn bind(&mut self, name: impl Into<String>, alias: Alias) {
        self.bindings.insert(name.into(), alias);
    }

    /// Innermost alias bound to `name`.
    pub fn get(&self, name: &str) -> Option<&Alias> {
        let mut scope = self;
        loop {
            if let Some(alias) = scope.bindings.get(name) {
                return Some(alias);
            }
            scope = scope.parent?;
        }
    }

    pub fn this(&self) -> Option<&Alias> {
        self.get("this")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_shadows_parent() {
        let root = AliasScope::with_this(Alias::new("index", RecordType::Page));
        let mut child = root.child();
        child.bind("this", Alias::private("each", RecordType::Settings));

        assert!(child.this().unwrap().is_private);
        assert!(!root.this().unwrap().is_private);
    }

    #[test]
    fn test_lookup_walks_chain() {
        let mut root = AliasScope::root();
        root.bind("post", Alias::new("posts", RecordType::Collection));
        let child = root.child();
        let grandchild = child.child();
        assert_eq!(grandchild.get("post").unwrap().name, "posts");
        assert!(grandchild.get("missing").is_none());
    }
}
