//! Context assembly: stored records → the context a page renders against.
//!
//! The root context holds `this` (the shown record) plus one entry per
//! collection or settings template. The `@` data carries `meta`, `page`,
//! `pages`, `navigation`, `site` and `media`.

use crate::directive::{DirectiveRegistry, FieldFailurePolicy};
use crate::error::{Result, TesseraError};
use crate::schema::{Field, RecordType, Schema, Template};
use crate::value::{Value, ValueMap};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Key of the non-field metadata slot inside every record's data. Field keys
/// never start with `@`, so it cannot collide with content.
pub const RECORD_META_KEY: &str = "@record";

/// `parent_id` of records that belong to the site navigation.
pub const NAVIGATION_MARKER: &str = "navigation";

// ============================================================================
// Records
// ============================================================================

/// One stored content instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub template_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub slug: String,
    #[serde(default)]
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub content: IndexMap<String, JsonValue>,
    #[serde(default)]
    pub metadata: IndexMap<String, JsonValue>,
}

impl Record {
    pub fn new(id: impl Into<String>, template_id: impl Into<String>, slug: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            template_id: template_id.into(),
            parent_id: None,
            slug: slug.into(),
            order: 0,
            created_at: now,
            updated_at: now,
            content: IndexMap::new(),
            metadata: IndexMap::new(),
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    /// Replace the content with the entries of a JSON object.
    pub fn with_content(mut self, content: JsonValue) -> Self {
        if let JsonValue::Object(map) = content {
            self.content = map.into_iter().collect();
        }
        self
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        if let JsonValue::Object(map) = metadata {
            self.metadata = map.into_iter().collect();
        }
        self
    }

    /// Display name: `metadata.name`, `content.title`, `content.name`, else the slug.
    pub fn display_name(&self) -> String {
        [
            self.metadata.get("name"),
            self.content.get("title"),
            self.content.get("name"),
        ]
        .into_iter()
        .flatten()
        .filter_map(JsonValue::as_str)
        .find(|s| !s.is_empty())
        .unwrap_or(self.slug.as_str())
        .to_string()
    }
}

// ============================================================================
// Render context
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderContext {
    /// `this` plus one bucket per collection or settings template.
    pub content: ValueMap,
    pub meta: Value,
    pub page: Value,
    pub pages: Vec<Value>,
    pub navigation: Vec<Value>,
    pub site: Value,
    pub media: Value,
}

impl RenderContext {
    /// Root context for the renderer.
    pub fn context_value(&self) -> Value {
        Value::Object(self.content.clone())
    }

    /// Global `@` data for the renderer.
    pub fn data_value(&self) -> ValueMap {
        let mut data = ValueMap::new();
        data.insert("meta".into(), self.meta.clone());
        data.insert("page".into(), self.page.clone());
        data.insert("pages".into(), Value::Array(self.pages.clone()));
        data.insert("navigation".into(), Value::Array(self.navigation.clone()));
        data.insert("site".into(), self.site.clone());
        data.insert("media".into(), self.media.clone());
        data
    }
}

/// Build the context for `record` with the built-in directives and the
/// default failure policy.
pub fn make_page_context(
    record: &Record,
    records: &[Record],
    templates: &Schema,
    site: &Value,
) -> Result<RenderContext> {
    ContextAssembler::new().assemble(record, records, templates, site)
}

// ============================================================================
// Assembler
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ContextAssembler {
    directives: DirectiveRegistry,
    failures: FieldFailurePolicy,
    media: Value,
}

impl ContextAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_directives(mut self, directives: DirectiveRegistry) -> Self {
        self.directives = directives;
        self
    }

    pub fn with_failure_policy(mut self, failures: FieldFailurePolicy) -> Self {
        self.failures = failures;
        self
    }

    pub fn with_media(mut self, media: Value) -> Self {
        self.media = media;
        self
    }

    pub fn assemble(
        &self,
        record: &Record,
        records: &[Record],
        templates: &Schema,
        site: &Value,
    ) -> Result<RenderContext> {
        let template = find_template(templates, &record.template_id).ok_or_else(|| {
            TesseraError::MissingTemplate {
                record: record.id.clone(),
                template: record.template_id.clone(),
            }
        })?;

        let mut ordered: Vec<&Record> = records.iter().collect();
        ordered.sort_by(|a, b| a.order.cmp(&b.order).then(a.created_at.cmp(&b.created_at)));

        let index = RecordIndex::new(&ordered);
        let current_url = index.permalink(&record.id);

        let slot = index.slot(record, &current_url);
        let mut this = self.record_data(record, template)?;
        this.insert(RECORD_META_KEY.into(), slot.clone());

        let mut meta: ValueMap = record
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), Value::from_json(v.clone())))
            .collect();
        meta.insert(RECORD_META_KEY.into(), slot.clone());

        let mut context = RenderContext {
            content: ValueMap::new(),
            meta: Value::Object(meta),
            page: slot,
            pages: Vec::new(),
            navigation: Vec::new(),
            site: site.clone(),
            media: self.media.clone(),
        };

        for other in &ordered {
            let Some(other_template) = find_template(templates, &other.template_id) else {
                warn!(
                    record = %other.id,
                    template = %other.template_id,
                    "skipping record with unknown template"
                );
                continue;
            };
            match other_template.record_type {
                RecordType::Page => {
                    let slot = index.slot(other, &current_url);
                    if other.parent_id.as_deref() == Some(NAVIGATION_MARKER) {
                        context.navigation.push(slot.clone());
                    }
                    context.pages.push(slot);
                }
                RecordType::Collection => {
                    let data = self.bucket_entry(other, other_template, &index, &current_url)?;
                    let bucket = context
                        .content
                        .entry(other_template.name.clone())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    match bucket {
                        Value::Array(items) => items.push(data),
                        existing => *existing = Value::Array(vec![data]),
                    }
                }
                RecordType::Settings => {
                    let data = self.bucket_entry(other, other_template, &index, &current_url)?;
                    context.content.insert(other_template.name.clone(), data);
                }
                RecordType::Component => {}
            }
        }

        context.content.insert("this".into(), Value::Object(this));
        debug!(
            record = %record.id,
            permalink = %current_url,
            pages = context.pages.len(),
            "assembled page context"
        );
        Ok(context)
    }

    fn bucket_entry(
        &self,
        record: &Record,
        template: &Template,
        index: &RecordIndex<'_>,
        current_url: &str,
    ) -> Result<Value> {
        let mut data = self.record_data(record, template)?;
        data.insert(RECORD_META_KEY.into(), index.slot(record, current_url));
        Ok(Value::Object(data))
    }

    /// Run every stored content value through its field's directive.
    fn record_data(&self, record: &Record, template: &Template) -> Result<ValueMap> {
        let mut data = ValueMap::new();
        for (key, stored) in &record.content {
            let fallback;
            let field = match template.field(key) {
                Some(field) => field,
                None => {
                    fallback = Field::new(key.as_str());
                    &fallback
                }
            };
            let value = match self.directives.render(field, stored) {
                Ok(value) => value,
                Err(err) => match self.failures {
                    FieldFailurePolicy::Abort => {
                        return Err(TesseraError::FieldRenderFailure {
                            field: key.clone(),
                            message: err.to_string(),
                        })
                    }
                    FieldFailurePolicy::UseDefault => {
                        warn!(
                            record = %record.id,
                            field = %key,
                            error = %err,
                            "field failed to render; using default"
                        );
                        field
                            .options
                            .get("default")
                            .cloned()
                            .map(Value::from_json)
                            .unwrap_or_default()
                    }
                },
            };
            data.insert(key.clone(), value);
        }
        Ok(data)
    }
}

fn find_template<'s>(templates: &'s Schema, template_id: &str) -> Option<&'s Template> {
    templates
        .get(template_id)
        .or_else(|| templates.get(&template_id.to_lowercase()))
}

// ============================================================================
// Record index: permalinks and navigation slots
// ============================================================================

struct RecordIndex<'a> {
    by_id: HashMap<&'a str, &'a Record>,
    children: HashMap<&'a str, Vec<&'a Record>>,
    permalinks: HashMap<&'a str, String>,
}

impl<'a> RecordIndex<'a> {
    /// `ordered` must already be sorted; children keep that order.
    fn new(ordered: &[&'a Record]) -> Self {
        let by_id: HashMap<&str, &Record> = ordered.iter().map(|&r| (r.id.as_str(), r)).collect();
        let mut children: HashMap<&str, Vec<&Record>> = HashMap::new();
        for &record in ordered {
            if let Some(parent) = record.parent_id.as_deref() {
                children.entry(parent).or_default().push(record);
            }
        }
        let mut index = Self {
            by_id,
            children,
            permalinks: HashMap::new(),
        };
        let permalinks = ordered
            .iter()
            .map(|&r| (r.id.as_str(), index.compute_permalink(r)))
            .collect();
        index.permalinks = permalinks;
        index
    }

    fn parent(&self, record: &Record) -> Option<&'a Record> {
        record
            .parent_id
            .as_deref()
            .and_then(|id| self.by_id.get(id).copied())
    }

    fn compute_permalink(&self, record: &'a Record) -> String {
        let mut chain: Vec<&Record> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut current = Some(record);
        while let Some(r) = current {
            if !seen.insert(r.id.as_str()) {
                warn!(record = %record.id, "parent chain loops; truncating permalink");
                break;
            }
            chain.push(r);
            current = self.parent(r);
        }

        let mut link = String::new();
        for (depth, r) in chain.iter().rev().enumerate() {
            if depth == 0 || !link.ends_with('/') {
                link.push('/');
            }
            if r.slug != "index" {
                link.push_str(&r.slug);
            }
        }
        link
    }

    fn permalink(&self, id: &str) -> String {
        self.permalinks
            .get(id)
            .cloned()
            .unwrap_or_else(|| "/".to_string())
    }

    /// Slot without `children`/`parent`, used one level down.
    fn shallow_slot(&self, record: &Record, current_url: &str) -> ValueMap {
        let permalink = self.permalink(&record.id);
        let is_active = current_url == permalink;
        let parent_link = self
            .parent(record)
            .map(|p| self.permalink(&p.id))
            .unwrap_or_else(|| "/".to_string());

        let mut slot = ValueMap::new();
        slot.insert("id".into(), Value::from(record.id.as_str()));
        slot.insert("name".into(), Value::String(record.display_name()));
        slot.insert("permalink".into(), Value::String(permalink));
        slot.insert(
            "isNavigation".into(),
            Value::Bool(record.parent_id.as_deref() == Some(NAVIGATION_MARKER)),
        );
        slot.insert("isActive".into(), Value::Bool(is_active));
        slot.insert(
            "isParentActive".into(),
            Value::Bool(is_active || current_url.starts_with(&parent_link)),
        );
        slot.insert(
            "hasChildren".into(),
            Value::Bool(self.children.get(record.id.as_str()).is_some_and(|c| !c.is_empty())),
        );
        slot
    }

    fn slot(&self, record: &Record, current_url: &str) -> Value {
        let mut slot = self.shallow_slot(record, current_url);
        let children: Vec<Value> = self
            .children
            .get(record.id.as_str())
            .map(|kids| {
                kids.iter()
                    .map(|kid| Value::Object(self.shallow_slot(kid, current_url)))
                    .collect()
            })
            .unwrap_or_default();
        slot.insert("children".into(), Value::Array(children));
        slot.insert(
            "parent".into(),
            self.parent(record)
                .map(|p| Value::Object(self.shallow_slot(p, current_url)))
                .unwrap_or_default(),
        );
        Value::Object(slot)
    }
}
