//! # OpenChart Model
//!
//! This crate provides the diagram object model for OpenChart. It turns a
//! declarative schema into typed diagram objects, keeps their structural
//! relations consistent, and moves diagrams to and from their export form.
//!
//! ## Core Concepts
//!
//! - **Property**: A typed value container (string, int, float, date, enum, list, dictionary, tuple)
//! - **DiagramObject**: One canvas, group, block, anchor, latch, line or handle
//! - **DiagramGraph**: The arena that owns every object and all of their relations
//! - **Template / DiagramSchema**: The declarative description objects are built from
//! - **DiagramObjectFactory**: Builds objects and properties from a schema
//! - **Serializer**: Flat, instance-keyed export records and their import
//! - **SemanticAnalyzer**: Reads a diagram as a directed graph of nodes and edges
//!

// Module declarations
pub mod diagram;
pub mod factory;
pub mod file;
pub mod object;
pub mod persistence;
pub mod property;
pub mod semantic;
pub mod serializer;
pub mod template;
pub mod validation;

#[cfg(test)]
pub(crate) mod fixtures;

// Re-export commonly used types at crate root
pub use diagram::{DiagramGraph, Subtree};
pub use factory::DiagramObjectFactory;
pub use file::{DiagramFile, DiagramModelExport};
pub use object::{DiagramObject, ObjectData};
pub use persistence::{
    DIAGRAM_EXTENSION, SCHEMA_EXTENSION, backup_file, default_file_name, ensure_extension,
    load_diagram, load_schema, save_diagram,
};
pub use property::{
    CombinationIndex, DictionaryProperty, ListProperty, Property, PropertyDescriptor,
    PropertyMeta, RootProperty, TupleProperty,
};
pub use semantic::{Direction, SemanticAnalyzer, SemanticEdge, SemanticGraph, SemanticNode};
pub use serializer::{DiagramObjectExport, assert_export_type, export_objects, import_objects};
pub use template::{DiagramSchema, LatchTemplates, Template};
pub use validation::{ValidationResult, ValidationRule, Validator};

// Re-export core types that are commonly used with the model
pub use openchart_core::{
    ChartError, ChartResult, DiagramObjectType, InstanceId, Persistable, Position, Positioned,
    SemanticRole, Validatable,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Prelude Module
// ============================================================================

/// Convenient re-exports for common usage
pub mod prelude {
    pub use crate::{
        ChartError,
        ChartResult,
        DiagramFile,
        DiagramGraph,
        DiagramModelExport,
        DiagramObject,
        DiagramObjectFactory,
        DiagramObjectType,
        DiagramSchema,
        InstanceId,
        Persistable,
        SemanticAnalyzer,
        SemanticRole,
        Validatable,
        Validator,
    };
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_extensions() {
        assert_eq!(DIAGRAM_EXTENSION, DiagramModelExport::file_extension());
        assert_eq!(SCHEMA_EXTENSION, DiagramSchema::file_extension());
    }
}
