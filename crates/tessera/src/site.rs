//! Site sources and the shared schema snapshot.
//!
//! A site is a set of template files. Each file is classified by where it
//! lives (`components/`, `collections/`, `partials/`, or a page), parsed
//! once, and then schema-walked in isolation so one broken file cannot spoil
//! the others.
//!
//! ```text
//!  files ──► Site::from_files / load_dir ──► Site::infer_schema ──► SchemaStore
//!              (parse, per-file errors)        (walk, per-file)      (ArcSwap)
//! ```

use crate::component::ComponentLibrary;
use crate::config::EngineConfig;
use crate::error::{Result, TesseraError};
use crate::operators::OperatorRegistry;
use crate::schema::{RecordType, Schema};
use crate::scope::{Alias, AliasScope};
use crate::walker::SchemaWalker;
use arc_swap::ArcSwap;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tessera_ast::Document;
use tracing::{debug, warn};
use walkdir::WalkDir;

// ============================================================================
// Classification
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Page,
    Collection,
    Component,
    Partial,
}

impl FileKind {
    /// Record type of the template a file defines, if it defines one.
    pub fn record_type(self) -> Option<RecordType> {
        match self {
            FileKind::Page => Some(RecordType::Page),
            FileKind::Collection => Some(RecordType::Collection),
            FileKind::Component | FileKind::Partial => None,
        }
    }
}

/// Classify a site-relative path. Returns the kind and the name the file is
/// known by, or `None` for files that are not templates.
pub fn classify(path: &Path, config: &EngineConfig) -> Option<(FileKind, String)> {
    let extension = path.extension()?.to_str()?;
    if !config.is_template_extension(extension) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?.to_string();

    let segments: Vec<&str> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect();
    let top = if segments.len() > 1 { segments.first().copied() } else { None };

    if top == Some(config.components_dir.as_str()) {
        return Some((FileKind::Component, stem));
    }
    if top == Some(config.collections_dir.as_str()) {
        return Some((FileKind::Collection, stem));
    }
    if top == Some(config.partials_dir.as_str()) {
        return Some((FileKind::Partial, stem));
    }
    if let Some(name) = stem.strip_prefix('_') {
        return Some((FileKind::Partial, name.to_string()));
    }

    let mut name: Vec<&str> = segments[..segments.len().saturating_sub(1)].to_vec();
    name.push(&stem);
    Some((FileKind::Page, name.join("/")))
}

// ============================================================================
// Site
// ============================================================================

#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the site root.
    pub path: PathBuf,
    pub kind: FileKind,
    pub name: String,
    pub document: Arc<Document>,
}

/// A failure tied to one source file.
#[derive(Debug)]
pub struct FileError {
    pub path: PathBuf,
    pub error: TesseraError,
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}

#[derive(Debug)]
pub struct Site {
    config: EngineConfig,
    files: Vec<SourceFile>,
    components: ComponentLibrary,
    partials: ComponentLibrary,
    errors: Vec<FileError>,
}

/// Outcome of schema inference over a whole site.
#[derive(Debug)]
pub struct SchemaReport {
    pub schema: Schema,
    pub errors: Vec<FileError>,
}

impl Site {
    /// Build a site from `(relative path, source)` pairs. Files that fail to
    /// parse are recorded in [`Site::errors`] and left out.
    pub fn from_files<P, S>(config: EngineConfig, files: impl IntoIterator<Item = (P, S)>) -> Self
    where
        P: Into<PathBuf>,
        S: AsRef<str>,
    {
        let mut site = Self {
            config,
            files: Vec::new(),
            components: ComponentLibrary::new(),
            partials: ComponentLibrary::new(),
            errors: Vec::new(),
        };
        for (path, source) in files {
            site.add_file(path.into(), source.as_ref());
        }
        site
    }

    /// Load every template file below `root`.
    pub fn load_dir(config: EngineConfig, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let mut site = Self::from_files(config, Vec::<(PathBuf, String)>::new());

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            if classify(relative, &site.config).is_none() {
                continue;
            }
            match fs::read_to_string(entry.path()) {
                Ok(source) => site.add_file(relative.to_path_buf(), &source),
                Err(err) => {
                    warn!(path = %relative.display(), error = %err, "unreadable template");
                    site.errors.push(FileError {
                        path: relative.to_path_buf(),
                        error: err.into(),
                    });
                }
            }
        }
        debug!(root = %root.display(), files = site.files.len(), "loaded site");
        Ok(site)
    }

    fn add_file(&mut self, path: PathBuf, source: &str) {
        let Some((kind, name)) = classify(&path, &self.config) else {
            return;
        };
        let document = match tessera_ast::parse(source) {
            Ok(document) => Arc::new(document),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "template failed to parse");
                self.errors.push(FileError {
                    path,
                    error: err.into(),
                });
                return;
            }
        };
        match kind {
            FileKind::Component => self.components.insert_shared(name.clone(), document.clone()),
            FileKind::Partial => self.partials.insert_shared(name.clone(), document.clone()),
            FileKind::Page | FileKind::Collection => {}
        }
        self.files.push(SourceFile {
            path,
            kind,
            name,
            document,
        });
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn file(&self, kind: FileKind, name: &str) -> Option<&SourceFile> {
        self.files.iter().find(|f| f.kind == kind && f.name == name)
    }

    pub fn components(&self) -> &ComponentLibrary {
        &self.components
    }

    /// Files that could not be read or parsed.
    pub fn errors(&self) -> &[FileError] {
        &self.errors
    }

    /// Walk every page and collection file into its own schema and merge the
    /// ones that succeed. Each file's root template exists even when the file
    /// declares no fields.
    pub fn infer_schema(&self, operators: &OperatorRegistry) -> SchemaReport {
        let mut schema = Schema::new();
        let mut errors = Vec::new();

        for file in &self.files {
            let Some(record_type) = file.kind.record_type() else {
                continue;
            };
            let scope = AliasScope::with_this(Alias::new(file.name.as_str(), record_type));
            let mut walker = SchemaWalker::new(operators)
                .with_components(&self.components)
                .with_partials(&self.partials)
                .with_config(&self.config);

            match walker.walk(&file.document, &scope) {
                Ok(mut discovered) => {
                    discovered.get_or_insert(&file.name, record_type);
                    schema.merge(&discovered);
                }
                Err(error) => {
                    warn!(path = %file.path.display(), error = %error, "schema walk failed");
                    errors.push(FileError {
                        path: file.path.clone(),
                        error,
                    });
                }
            }
        }

        debug!(templates = schema.len(), failed = errors.len(), "inferred schema");
        SchemaReport { schema, errors }
    }
}

// ============================================================================
// Snapshot store
// ============================================================================

/// Result of [`SchemaStore::rebuild`].
#[derive(Debug)]
pub struct RebuildReport {
    /// Whether the published snapshot differs from the previous one.
    pub changed: bool,
    pub errors: Vec<FileError>,
}

/// Holds the current schema snapshot. Readers get an `Arc` to a complete
/// schema; rebuilds replace it atomically.
#[derive(Debug)]
pub struct SchemaStore {
    current: ArcSwap<Schema>,
}

impl SchemaStore {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Schema::new()),
        }
    }

    /// Current snapshot. Lock-free.
    #[inline]
    pub fn current(&self) -> Arc<Schema> {
        self.current.load_full()
    }

    /// Swap in `schema`. Returns `true` if it differs from the previous one.
    pub fn replace(&self, schema: Schema) -> bool {
        let next = Arc::new(schema);
        let previous = self.current.swap(Arc::clone(&next));
        *previous != *next
    }

    /// Recompute the schema of `site` and publish it.
    pub fn rebuild(&self, site: &Site, operators: &OperatorRegistry) -> RebuildReport {
        let SchemaReport { schema, errors } = site.infer_schema(operators);
        let changed = self.replace(schema);
        debug!(changed, failed = errors.len(), "schema rebuilt");
        RebuildReport { changed, errors }
    }
}

impl Default for SchemaStore {
    fn default() -> Self {
        Self::new()
    }
}
