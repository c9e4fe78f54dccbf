//! Error types for OpenChart
//!
//! This module provides unified error handling across the diagram model,
//! including schema resolution, structural invariant, import shape,
//! property, IO and serialization errors.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for OpenChart
#[derive(Debug, Error)]
pub enum ChartError {
    // ========================================================================
    // Schema / Template Errors
    // ========================================================================
    /// Template name not present in the loaded schema
    #[error("Cannot resolve template: '{0}'.")]
    TemplateNotFound(String),

    /// Export was produced for another schema
    #[error("Schema mismatch: expected '{expected}', found '{found}'")]
    SchemaMismatch { expected: String, found: String },

    // ========================================================================
    // Type Assertion Errors
    // ========================================================================
    /// Constructed object is not of the requested kind
    #[error("Expected '{name}' to be a {expected}.")]
    UnexpectedType { name: String, expected: String },

    /// Export record shape does not match its template's kind
    #[error("Cannot cast export to '{0}'.")]
    ExportCast(String),

    // ========================================================================
    // Structural Errors
    // ========================================================================
    /// Object is already owned by another parent
    #[error("'{child}' already parented to '{parent}'.")]
    AlreadyParented { child: String, parent: String },

    /// Block anchor position already holds an anchor
    #[error("'{current}' already located at '{position}'.")]
    SlotOccupied { current: String, position: String },

    /// Block template does not declare the anchor position
    #[error("Block '{block}' has no anchor position '{position}'.")]
    NoSuchSlot { block: String, position: String },

    /// Parent kind cannot hold the child kind
    #[error("'{parent}' cannot contain '{child}'.")]
    InvalidChild { parent: String, child: String },

    /// Object is not a child of the given parent
    #[error("'{child}' is not a child of '{parent}'.")]
    NotAChild { parent: String, child: String },

    /// Operation requires a parent
    #[error("Object '{0}' must have a parent.")]
    ObjectHasNoParent(String),

    /// Instance not present in the graph
    #[error("Object not found: '{0}'")]
    ObjectNotFound(String),

    /// Instance already present in the graph
    #[error("Duplicate instance: '{0}' already exists")]
    DuplicateInstance(String),

    /// Line has no latch at the requested end
    #[error("No {0} latch assigned.")]
    NoLatchAssigned(&'static str),

    // ========================================================================
    // Import Shape Errors
    // ========================================================================
    /// Collection property given something other than ordered entries
    #[error("Invalid JSON entries: '{0}'.")]
    InvalidJsonEntries(String),

    /// Atomic property given an array
    #[error("Invalid JSON primitive: '{0}'.")]
    InvalidJsonPrimitive(String),

    /// Export references an instance with no record
    #[error("Object '{0}' missing from export.")]
    MissingExportObject(String),

    /// Export does not resolve to exactly one canvas
    #[error("File export includes multiple root objects.")]
    MultipleRootObjects,

    // ========================================================================
    // Property Errors
    // ========================================================================
    /// Property id not present in a collection
    #[error("Property '{property}' not found in '{owner}'")]
    PropertyNotFound { owner: String, property: String },

    /// Tuple value not registered in the combination index
    #[error("Invalid combination: '{value}' is not a valid value for '{field}'")]
    InvalidCombination { field: String, value: String },

    /// Tuple fields must be atomic
    #[error("Tuples cannot contain collections ('{0}').")]
    UnsupportedTupleField(String),

    // ========================================================================
    // IO Errors
    // ========================================================================
    /// File IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File read error
    #[error("Failed to read file '{path}': {message}")]
    FileRead { path: PathBuf, message: String },

    /// File write error
    #[error("Failed to write file '{path}': {message}")]
    FileWrite { path: PathBuf, message: String },

    /// Directory creation failed
    #[error("Failed to create directory '{path}': {message}")]
    DirectoryCreate { path: PathBuf, message: String },

    // ========================================================================
    // Serialization Errors
    // ========================================================================
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// General validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Generic error with context
    #[error("{context}: {message}")]
    WithContext { context: String, message: String },
}

impl ChartError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        ChartError::Validation(msg.into())
    }

    /// Create an error with context
    pub fn with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        ChartError::WithContext {
            context: context.into(),
            message: msg.into(),
        }
    }

    /// Create an unexpected type error
    pub fn unexpected_type(name: impl Into<String>, expected: impl std::fmt::Display) -> Self {
        ChartError::UnexpectedType {
            name: name.into(),
            expected: expected.to_string(),
        }
    }

    /// Create an already-parented error
    pub fn already_parented(child: impl Into<String>, parent: impl Into<String>) -> Self {
        ChartError::AlreadyParented {
            child: child.into(),
            parent: parent.into(),
        }
    }

    /// Create an invalid child error
    pub fn invalid_child(parent: impl Into<String>, child: impl Into<String>) -> Self {
        ChartError::InvalidChild {
            parent: parent.into(),
            child: child.into(),
        }
    }

    /// Create a not-a-child error
    pub fn not_a_child(parent: impl Into<String>, child: impl Into<String>) -> Self {
        ChartError::NotAChild {
            parent: parent.into(),
            child: child.into(),
        }
    }

    /// Check if this error is a structural invariant error
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ChartError::AlreadyParented { .. }
                | ChartError::SlotOccupied { .. }
                | ChartError::NoSuchSlot { .. }
                | ChartError::InvalidChild { .. }
                | ChartError::NotAChild { .. }
                | ChartError::ObjectHasNoParent(_)
                | ChartError::DuplicateInstance(_)
                | ChartError::NoLatchAssigned(_)
        )
    }

    /// Check if this error is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ChartError::TemplateNotFound(_)
                | ChartError::ObjectNotFound(_)
                | ChartError::MissingExportObject(_)
                | ChartError::PropertyNotFound { .. }
        )
    }

    /// Check if this error comes from malformed import data
    pub fn is_import_shape(&self) -> bool {
        matches!(
            self,
            ChartError::InvalidJsonEntries(_)
                | ChartError::InvalidJsonPrimitive(_)
                | ChartError::MissingExportObject(_)
                | ChartError::MultipleRootObjects
                | ChartError::ExportCast(_)
        )
    }

    /// Check if this error is an IO error
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            ChartError::Io(_)
                | ChartError::FileRead { .. }
                | ChartError::FileWrite { .. }
                | ChartError::DirectoryCreate { .. }
        )
    }
}

/// Result type alias using ChartError
pub type ChartResult<T> = Result<T, ChartError>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<C: Into<String>>(self, context: C) -> ChartResult<T>;
}

impl<T, E: Into<ChartError>> ResultExt<T> for Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> ChartResult<T> {
        self.map_err(|e| {
            let err: ChartError = e.into();
            ChartError::WithContext {
                context: context.into(),
                message: err.to_string(),
            }
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_not_found_message() {
        let err = ChartError::TemplateNotFound("ghost_block".to_string());
        assert!(err.is_not_found());
        assert!(!err.is_structural());
        assert_eq!(err.to_string(), "Cannot resolve template: 'ghost_block'.");
    }

    #[test]
    fn test_structural_errors() {
        let err = ChartError::already_parented("latch-1", "line-1");
        assert!(err.is_structural());
        assert_eq!(err.to_string(), "'latch-1' already parented to 'line-1'.");

        let err = ChartError::SlotOccupied {
            current: "anchor-1".to_string(),
            position: "up".to_string(),
        };
        assert!(err.is_structural());
        assert_eq!(err.to_string(), "'anchor-1' already located at 'up'.");

        let err = ChartError::NoLatchAssigned("source");
        assert_eq!(err.to_string(), "No source latch assigned.");
    }

    #[test]
    fn test_unexpected_type() {
        let err = ChartError::unexpected_type("generic_anchor", "Block");
        assert_eq!(err.to_string(), "Expected 'generic_anchor' to be a Block.");
    }

    #[test]
    fn test_import_shape_errors() {
        assert!(ChartError::MultipleRootObjects.is_import_shape());
        assert!(ChartError::ExportCast("anchor".into()).is_import_shape());
        assert_eq!(
            ChartError::MultipleRootObjects.to_string(),
            "File export includes multiple root objects."
        );
        assert_eq!(
            ChartError::MissingExportObject("abc".into()).to_string(),
            "Object 'abc' missing from export."
        );
    }

    #[test]
    fn test_error_with_context() {
        let err = ChartError::with_context("Loading diagram", "Permission denied");
        assert_eq!(err.to_string(), "Loading diagram: Permission denied");
    }

    #[test]
    fn test_result_ext_wraps_message() {
        let result: Result<(), ChartError> = Err(ChartError::validation("bad state"));
        let err = result.with_context("Checking").unwrap_err();
        assert_eq!(err.to_string(), "Checking: Validation error: bad state");
    }

    #[test]
    fn test_io_error_classification() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ChartError = io_err.into();
        assert!(err.is_io());
    }
}
