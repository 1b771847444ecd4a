//! The content-store boundary.
//!
//! The engine reads templates and records through [`ContentStore`] and writes
//! schema updates back through it. Persistence is someone else's job;
//! [`MemoryStore`] is enough for tests and embedding.

use crate::context::Record;
use crate::error::Result;
use crate::schema::{RecordType, Schema, Template};
use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

pub trait ContentStore: Send + Sync {
    fn all_templates(&self) -> Result<Vec<Template>>;

    fn all_records(&self) -> Result<Vec<Record>>;

    /// Look up by `type:name` identifier.
    fn template_by_id(&self, id: &str) -> Result<Option<Template>>;

    fn template_by_name(&self, name: &str) -> Result<Option<Template>>;

    fn records_by_template_id(&self, template_id: &str) -> Result<Vec<Record>>;

    fn records_by_type(&self, record_type: RecordType) -> Result<Vec<Record>>;

    /// Insert a template, merging into an existing one with the same identifier.
    fn update_template(&self, template: Template) -> Result<()>;

    /// Insert or replace a record by id.
    fn update_record(&self, record: Record) -> Result<()>;
}

/// Feed every template of `schema` to the store. Returns how many were written.
pub fn publish_schema(store: &dyn ContentStore, schema: &Schema) -> Result<usize> {
    let mut written = 0;
    for template in schema.templates() {
        store.update_template(template.clone())?;
        written += 1;
    }
    debug!(templates = written, "published schema");
    Ok(written)
}

/// In-memory [`ContentStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    templates: RwLock<Schema>,
    records: RwLock<IndexMap<String, Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let store = Self::new();
        {
            let mut map = store.records.write();
            for record in records {
                map.insert(record.id.clone(), record);
            }
        }
        store
    }

    /// Copy of the stored templates as a schema.
    pub fn schema(&self) -> Schema {
        self.templates.read().clone()
    }

    pub fn clear(&self) {
        *self.templates.write() = Schema::new();
        self.records.write().clear();
    }
}

impl ContentStore for MemoryStore {
    fn all_templates(&self) -> Result<Vec<Template>> {
        Ok(self.templates.read().templates().cloned().collect())
    }

    fn all_records(&self) -> Result<Vec<Record>> {
        Ok(self.records.read().values().cloned().collect())
    }

    fn template_by_id(&self, id: &str) -> Result<Option<Template>> {
        Ok(self.templates.read().get(&id.to_lowercase()).cloned())
    }

    fn template_by_name(&self, name: &str) -> Result<Option<Template>> {
        Ok(self
            .templates
            .read()
            .templates()
            .find(|t| t.name == name)
            .cloned())
    }

    fn records_by_template_id(&self, template_id: &str) -> Result<Vec<Record>> {
        let template_id = template_id.to_lowercase();
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| r.template_id.to_lowercase() == template_id)
            .cloned()
            .collect())
    }

    fn records_by_type(&self, record_type: RecordType) -> Result<Vec<Record>> {
        let templates = self.templates.read();
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| {
                templates
                    .get(&r.template_id.to_lowercase())
                    .is_some_and(|t| t.record_type == record_type)
            })
            .cloned()
            .collect())
    }

    fn update_template(&self, template: Template) -> Result<()> {
        self.templates.write().insert(template);
        Ok(())
    }

    fn update_record(&self, record: Record) -> Result<()> {
        self.records.write().insert(record.id.clone(), record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema() -> Schema {
        let mut schema = Schema::new();
        schema
            .get_or_insert("index", RecordType::Page)
            .merge_leaf("title", None, &Default::default());
        schema
            .get_or_insert("posts", RecordType::Collection)
            .merge_leaf("title", None, &Default::default());
        schema
    }

    #[test]
    fn test_publish_schema() {
        let store = MemoryStore::new();
        assert_eq!(publish_schema(&store, &schema()).unwrap(), 2);
        assert_eq!(store.all_templates().unwrap().len(), 2);
        assert!(store.template_by_id("collection:posts").unwrap().is_some());
        assert_eq!(
            store.template_by_name("index").unwrap().unwrap().record_type,
            RecordType::Page
        );
    }

    #[test]
    fn test_update_template_merges() {
        let store = MemoryStore::new();
        publish_schema(&store, &schema()).unwrap();

        let mut more = Template::new("posts", RecordType::Collection);
        more.merge_leaf("summary", Some("html"), &Default::default());
        store.update_template(more).unwrap();

        let posts = store.template_by_id("collection:posts").unwrap().unwrap();
        assert_eq!(posts.fields.keys().collect::<Vec<_>>(), vec!["title", "summary"]);
    }

    #[test]
    fn test_record_queries() {
        let store = MemoryStore::with_records([
            Record::new("home", "page:index", "index"),
            Record::new("p1", "collection:posts", "one").with_content(json!({"title": "One"})),
            Record::new("p2", "collection:posts", "two"),
        ]);
        publish_schema(&store, &schema()).unwrap();

        assert_eq!(store.records_by_template_id("collection:posts").unwrap().len(), 2);
        assert_eq!(store.records_by_type(RecordType::Page).unwrap().len(), 1);

        store
            .update_record(Record::new("p2", "collection:posts", "renamed"))
            .unwrap();
        let all = store.all_records().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].slug, "renamed");
    }
}
