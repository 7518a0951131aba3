//! Structural parsers
//!
//! The store treats structural parsing as a collaborator behind
//! [`StructureParser`]. Two implementations are provided:
//! - [`YamlStructure`] (default): YAML is a superset of JSON, so it accepts both
//! - [`JsonStructure`]: strict JSON
//!
//! Parsed trees are represented as [`serde_json::Value`].

use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;

/// Structural parse failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Malformed input
    #[error("{format} syntax error: {message}")]
    Syntax {
        format: &'static str,
        message: String,
    },

    /// Value cannot be represented as structured text
    #[error("cannot stringify value: {0}")]
    Unsupported(String),
}

/// Parser trait turning raw text into a navigable tree
pub trait StructureParser: Send + Sync + Debug + 'static {
    /// Format name, for diagnostics
    fn format(&self) -> &'static str;

    /// Parse text into a tree
    ///
    /// # Errors
    /// Returns [`ParseError::Syntax`] on malformed input
    fn parse(&self, text: &str) -> Result<Value, ParseError>;
}

/// YAML (and therefore JSON) parser
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlStructure;

impl StructureParser for YamlStructure {
    fn format(&self) -> &'static str {
        "yaml"
    }

    fn parse(&self, text: &str) -> Result<Value, ParseError> {
        serde_yaml::from_str(text).map_err(|e| ParseError::Syntax {
            format: self.format(),
            message: e.to_string(),
        })
    }
}

/// Strict JSON parser
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonStructure;

impl StructureParser for JsonStructure {
    fn format(&self) -> &'static str {
        "json"
    }

    fn parse(&self, text: &str) -> Result<Value, ParseError> {
        serde_json::from_str(text).map_err(|e| ParseError::Syntax {
            format: self.format(),
            message: e.to_string(),
        })
    }
}

/// Serialize a structured value to pretty JSON text
///
/// # Errors
/// Returns [`ParseError::Unsupported`] if the value has no JSON form
/// (e.g. a map with non-string keys)
pub fn stringify<T: Serialize + ?Sized>(value: &T) -> Result<String, ParseError> {
    serde_json::to_string_pretty(value).map_err(|e| ParseError::Unsupported(e.to_string()))
}
