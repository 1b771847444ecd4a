//! Error types for the Tessera engine.

use thiserror::Error;

// Re-export Location from tessera-ast
pub use tessera_ast::Location;
use tessera_ast::ParseError;

/// All errors that can occur in Tessera
#[derive(Error, Debug)]
pub enum TesseraError {
    #[error("Syntax error at line {}, column {}: {message}", location.line, location.column)]
    SyntaxError { message: String, location: Location },

    #[error("Operator '{operator}' requires the '{argument}' argument")]
    MissingOperatorArgument { operator: String, argument: String },

    #[error("Invalid argument for operator '{operator}': {message}")]
    InvalidOperatorArgument { operator: String, message: String },

    #[error("Unknown operator '{name}' at line {}, column {}", location.line, location.column)]
    UnknownOperator { name: String, location: Location },

    #[error("{feature} is not supported (line {}, column {})", location.line, location.column)]
    UnsupportedFeature {
        feature: String,
        location: Location,
    },

    #[error("Failed to render field '{field}': {message}")]
    FieldRenderFailure { field: String, message: String },

    #[error("Field '{key}' at line {}, column {} has no enclosing section", location.line, location.column)]
    UnscopedField { key: String, location: Location },

    #[error("Component cycle detected: {}", chain.join(" -> "))]
    ComponentCycle { chain: Vec<String> },

    #[error("Attribute '{name}' on <{tag}> at line {}, column {} must be quoted", location.line, location.column)]
    InvalidAttribute {
        tag: String,
        name: String,
        location: Location,
    },

    #[error("Record '{record}' references unknown template '{template}'")]
    MissingTemplate { record: String, template: String },

    #[error("Type error: {message}")]
    TypeError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<ParseError> for TesseraError {
    fn from(err: ParseError) -> Self {
        TesseraError::SyntaxError {
            location: err.location(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for Tessera operations
pub type Result<T> = std::result::Result<T, TesseraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_conversion_keeps_location() {
        let err: TesseraError = tessera_ast::parse("{{#if a}}").unwrap_err().into();
        match err {
            TesseraError::SyntaxError { location, .. } => {
                assert_eq!(location.line, 1);
                assert_eq!(location.column, 1);
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_cycle_message() {
        let err = TesseraError::ComponentCycle {
            chain: vec!["Card".to_string(), "Badge".to_string(), "Card".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Component cycle detected: Card -> Badge -> Card"
        );
    }
}
