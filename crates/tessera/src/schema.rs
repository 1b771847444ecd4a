//! Inferred content schema: templates (record types) and their fields.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Statically evaluated operator hash / template options.
pub type Options = IndexMap<String, JsonValue>;

/// Field type used when nothing more specific is known.
pub const DEFAULT_FIELD_TYPE: &str = "text";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Page,
    Collection,
    Settings,
    Component,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Page => "page",
            RecordType::Collection => "collection",
            RecordType::Settings => "settings",
            RecordType::Component => "component",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named, typed content slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub key: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub options: Options,
}

impl Field {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            field_type: DEFAULT_FIELD_TYPE.to_string(),
            priority: 0,
            label: String::new(),
            options: Options::new(),
        }
    }

    /// Merge a field discovered in another file.
    fn merge(&mut self, other: &Field) {
        if other.field_type != DEFAULT_FIELD_TYPE && self.field_type == DEFAULT_FIELD_TYPE {
            self.field_type = other.field_type.clone();
        }
        self.priority = self.priority.max(other.priority);
        if self.label.is_empty() {
            self.label = other.label.clone();
        }
        shallow_merge(&mut self.options, &other.options);
    }
}

/// Schema entry describing one record type's shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub options: Options,
    #[serde(default)]
    pub fields: IndexMap<String, Field>,
}

impl Template {
    pub fn new(name: impl Into<String>, record_type: RecordType) -> Self {
        Self {
            name: name.into(),
            record_type,
            sortable: false,
            options: Options::new(),
            fields: IndexMap::new(),
        }
    }

    /// `lowercase(type:name)`
    pub fn identifier(&self) -> String {
        identifier(&self.name, self.record_type)
    }

    pub fn field(&self, key: &str) -> Option<&Field> {
        self.fields.get(key)
    }

    /// Merge one discovered reference into the field `key`.
    ///
    /// A given type replaces the stored one, priority only grows, a given
    /// label replaces the stored one, and the hash is overlaid on the options.
    pub fn merge_leaf(&mut self, key: &str, field_type: Option<&str>, hash: &Options) {
        let field = self
            .fields
            .entry(key.to_string())
            .or_insert_with(|| Field::new(key));

        if let Some(field_type) = field_type {
            field.field_type = field_type.to_string();
        }
        let priority = hash.get("priority").and_then(JsonValue::as_i64).unwrap_or(0);
        field.priority = field.priority.max(priority);
        if let Some(label) = hash.get("label").and_then(JsonValue::as_str) {
            field.label = label.to_string();
        }
        shallow_merge(&mut field.options, hash);
    }

    /// Merge a template with the same identifier discovered elsewhere.
    /// Name and record type stay with the first writer.
    pub fn merge(&mut self, other: &Template) {
        self.sortable |= other.sortable;
        shallow_merge(&mut self.options, &other.options);
        for (key, field) in &other.fields {
            match self.fields.get_mut(key) {
                Some(existing) => existing.merge(field),
                None => {
                    self.fields.insert(key.clone(), field.clone());
                }
            }
        }
    }

    /// Fields in display order: ascending priority, `title`/`name` first among
    /// equals, otherwise discovery order.
    pub fn sorted_fields(&self) -> Vec<&Field> {
        let mut fields: Vec<&Field> = self.fields.values().collect();
        fields.sort_by_key(|f| {
            let named = matches!(f.key.as_str(), "title" | "name");
            (f.priority, !named)
        });
        fields
    }
}

pub fn identifier(name: &str, record_type: RecordType) -> String {
    format!("{record_type}:{name}").to_lowercase()
}

/// Overlay `overlay` onto `base`, key by key.
pub fn shallow_merge(base: &mut Options, overlay: &Options) {
    for (key, value) in overlay {
        base.insert(key.clone(), value.clone());
    }
}

/// Ordered map identifier → Template.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    templates: IndexMap<String, Template>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identifier: &str) -> Option<&Template> {
        self.templates.get(identifier)
    }

    pub fn find(&self, name: &str, record_type: RecordType) -> Option<&Template> {
        self.templates.get(&identifier(name, record_type))
    }

    pub fn templates(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn get_or_insert(&mut self, name: &str, record_type: RecordType) -> &mut Template {
        self.templates
            .entry(identifier(name, record_type))
            .or_insert_with(|| Template::new(name, record_type))
    }

    /// Get or create a branch template, merging options and the sortable flag.
    pub fn ensure_branch(
        &mut self,
        name: &str,
        record_type: RecordType,
        options: &Options,
        sortable: bool,
    ) -> &mut Template {
        let template = self.get_or_insert(name, record_type);
        shallow_merge(&mut template.options, options);
        template.sortable |= sortable;
        template
    }

    pub fn insert(&mut self, template: Template) {
        match self.templates.get_mut(&template.identifier()) {
            Some(existing) => existing.merge(&template),
            None => {
                self.templates.insert(template.identifier(), template);
            }
        }
    }

    /// Merge every template of `other` into this schema.
    pub fn merge(&mut self, other: &Schema) {
        for template in other.templates() {
            self.insert(template.clone());
        }
    }
}

impl FromIterator<Template> for Schema {
    fn from_iter<I: IntoIterator<Item = Template>>(iter: I) -> Self {
        let mut schema = Schema::new();
        for template in iter {
            schema.insert(template);
        }
        schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn options(value: JsonValue) -> Options {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_identifier_is_lowercase() {
        let template = Template::new("Posts", RecordType::Collection);
        assert_eq!(template.identifier(), "collection:posts");
    }

    #[test]
    fn test_merge_leaf() {
        let mut template = Template::new("index", RecordType::Page);
        template.merge_leaf("title", None, &Options::new());
        template.merge_leaf("title", None, &options(json!({"priority": 2, "label": "Title"})));
        template.merge_leaf("title", Some("html"), &options(json!({"priority": 1})));

        let field = template.field("title").unwrap();
        assert_eq!(field.field_type, "html");
        assert_eq!(field.priority, 2);
        assert_eq!(field.label, "Title");
        assert_eq!(field.options.get("priority"), Some(&json!(1)));
    }

    #[test]
    fn test_template_merge_prefers_specific_type() {
        let mut a = Template::new("posts", RecordType::Collection);
        a.merge_leaf("published", None, &Options::new());
        let mut b = Template::new("Posts", RecordType::Collection);
        b.sortable = true;
        b.merge_leaf("published", Some("date"), &options(json!({"label": "Published"})));

        let mut ab = a.clone();
        ab.merge(&b);
        let mut ba = b.clone();
        ba.merge(&a);

        assert_eq!(ab.name, "posts");
        assert_eq!(ba.name, "Posts");
        assert!(ab.sortable && ba.sortable);
        assert_eq!(ab.fields, ba.fields);
        assert_eq!(ab.field("published").unwrap().field_type, "date");
    }

    #[test]
    fn test_sorted_fields() {
        let mut template = Template::new("index", RecordType::Page);
        template.merge_leaf("body", None, &Options::new());
        template.merge_leaf("hero", None, &options(json!({"priority": 1})));
        template.merge_leaf("title", None, &Options::new());
        template.merge_leaf("summary", None, &Options::new());

        let keys: Vec<_> = template.sorted_fields().iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["title", "body", "summary", "hero"]);
    }

    #[test]
    fn test_ensure_branch_merges_options() {
        let mut schema = Schema::new();
        schema.ensure_branch("posts", RecordType::Collection, &options(json!({"limit": 3})), false);
        schema.ensure_branch("posts", RecordType::Collection, &options(json!({"label": "Posts"})), true);

        let template = schema.find("posts", RecordType::Collection).unwrap();
        assert!(template.sortable);
        assert_eq!(template.options.len(), 2);
        assert_eq!(schema.len(), 1);
    }

    #[test]
    fn test_schema_serializes_by_identifier() {
        let mut schema = Schema::new();
        schema.get_or_insert("index", RecordType::Page).merge_leaf("title", None, &Options::new());
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["page:index"]["type"], json!("page"));
        assert_eq!(json["page:index"]["fields"]["title"]["type"], json!("text"));
    }
}
