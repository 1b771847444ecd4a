//! Engine configuration, loadable from TOML.
//!
//! ```toml
//! unscoped_fields = "general"
//! field_failures = "abort"
//! template_extensions = ["html", "hbs"]
//! ```

use crate::directive::FieldFailurePolicy;
use crate::error::{Result, TesseraError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// What the schema walker does with a field referenced outside any section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnscopedFieldPolicy {
    /// Fail the file with `UnscopedField`.
    #[default]
    Error,
    /// Warn and put the field into the general settings section.
    General,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub unscoped_fields: UnscopedFieldPolicy,
    pub field_failures: FieldFailurePolicy,
    /// Settings section used by [`UnscopedFieldPolicy::General`].
    pub general_section: String,
    /// File extensions considered template sources, without the dot.
    pub template_extensions: Vec<String>,
    pub components_dir: String,
    pub collections_dir: String,
    pub partials_dir: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unscoped_fields: UnscopedFieldPolicy::default(),
            field_failures: FieldFailurePolicy::default(),
            general_section: "general".to_string(),
            template_extensions: vec!["html".to_string()],
            components_dir: "components".to_string(),
            collections_dir: "collections".to_string(),
            partials_dir: "partials".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| TesseraError::ConfigError {
            message: e.to_string(),
        })
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    pub fn is_template_extension(&self, extension: &str) -> bool {
        self.template_extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.unscoped_fields, UnscopedFieldPolicy::Error);
        assert_eq!(config.field_failures, FieldFailurePolicy::UseDefault);
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_toml_str(
            r#"
            unscoped_fields = "general"
            field_failures = "abort"
            template_extensions = ["html", "HBS"]
            "#,
        )
        .unwrap();
        assert_eq!(config.unscoped_fields, UnscopedFieldPolicy::General);
        assert_eq!(config.field_failures, FieldFailurePolicy::Abort);
        assert!(config.is_template_extension("hbs"));
        assert_eq!(config.components_dir, "components");
    }

    #[test]
    fn test_invalid_value() {
        let result = EngineConfig::from_toml_str("unscoped_fields = \"ignore\"");
        assert!(matches!(result, Err(TesseraError::ConfigError { .. })));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "general_section = \"site\"").unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.general_section, "site");
    }

    #[test]
    fn test_load_missing_file() {
        let result = EngineConfig::load("/definitely/not/here.toml");
        assert!(matches!(result, Err(TesseraError::IoError(_))));
    }
}
