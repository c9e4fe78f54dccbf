//! Validation rules for diagram graphs
//!
//! The graph's mutation methods keep its invariants, so these rules matter
//! most for graphs that were edited through lower-level access or loaded
//! from hand-written exports. Structural problems are errors; property
//! content problems are warnings.

use crate::diagram::DiagramGraph;
use crate::object::{DiagramObject, ObjectData};
use crate::property::Property;
use openchart_core::{ChartError, ChartResult, DiagramObjectType, InstanceId, Validatable};

// ============================================================================
// ValidationResult
// ============================================================================

/// Result of a validation operation
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether the validation passed
    pub valid: bool,

    /// List of errors (empty if valid)
    pub errors: Vec<ValidationError>,

    /// List of warnings (non-fatal issues)
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    /// Create a successful validation result
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Create a failed validation result with an error
    pub fn error(error: ValidationError) -> Self {
        Self {
            valid: false,
            errors: vec![error],
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Merge another validation result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        if !other.valid {
            self.valid = false;
        }
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Convert to ChartResult (fails if any errors)
    pub fn to_result(self) -> ChartResult<()> {
        if self.valid {
            Ok(())
        } else {
            let msg = self
                .errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            Err(ChartError::validation(msg))
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::ok()
    }
}

// ============================================================================
// ValidationError
// ============================================================================

/// A validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Error code for programmatic handling
    pub code: ValidationErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Path to the problematic element (e.g., "objects.<instance>.source")
    pub path: Option<String>,

    /// Suggested fix
    pub suggestion: Option<String>,
}

impl ValidationError {
    pub fn new(code: ValidationErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
            suggestion: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "[{}] {}", path, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

/// Error codes for validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorCode {
    // Structure
    MissingObject,
    ParentMismatch,
    InvalidChildKind,
    IncompleteLine,

    // Attachment
    BrokenAttachment,
    DuplicateAttachment,

    Custom,
}

// ============================================================================
// ValidationWarning
// ============================================================================

/// A validation warning (non-fatal issue)
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub code: ValidationWarningCode,
    pub message: String,
    pub path: Option<String>,
}

impl ValidationWarning {
    pub fn new(code: ValidationWarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "[{}] Warning: {}", path, self.message)
        } else {
            write!(f, "Warning: {}", self.message)
        }
    }
}

/// Warning codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationWarningCode {
    MissingRequiredProperty,
    TooFewItems,
    OrphanLatch,
    Custom,
}

// ============================================================================
// ValidationRule Trait
// ============================================================================

/// Trait for validation rules
pub trait ValidationRule {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn validate(&self, graph: &DiagramGraph) -> ValidationResult;
}

// ============================================================================
// Validator
// ============================================================================

/// Graph validator that runs multiple validation rules
#[derive(Default)]
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Create a validator with the structure, attachment and property rules
    pub fn with_default_rules() -> Self {
        let mut validator = Self::new();
        validator.add_rule(Box::new(StructureRule));
        validator.add_rule(Box::new(AttachmentRule));
        validator.add_rule(Box::new(RequiredPropertiesRule));
        validator
    }

    pub fn add_rule(&mut self, rule: Box<dyn ValidationRule>) {
        self.rules.push(rule);
    }

    /// Names of the registered rules, in run order
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Validate a graph with all rules
    pub fn validate(&self, graph: &DiagramGraph) -> ValidationResult {
        let mut result = ValidationResult::ok();
        for rule in &self.rules {
            result.merge(rule.validate(graph));
        }
        result
    }

    /// Validate and return Result
    pub fn validate_result(&self, graph: &DiagramGraph) -> ChartResult<()> {
        self.validate(graph).to_result()
    }
}

impl Validatable for DiagramGraph {
    fn validate(&self) -> ChartResult<()> {
        Validator::with_default_rules().validate_result(self)
    }

    fn validation_errors(&self) -> Vec<String> {
        Validator::with_default_rules()
            .validate(self)
            .errors
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}

// ============================================================================
// Built-in Validation Rules
// ============================================================================

fn object_path(instance: &InstanceId) -> String {
    format!("objects.{}", instance)
}

/// Rule: parent links and child lists agree, and children have allowed kinds
pub struct StructureRule;

impl StructureRule {
    fn allowed(parent: &ObjectData, child: DiagramObjectType) -> bool {
        use DiagramObjectType as T;
        match parent {
            ObjectData::Canvas { .. } | ObjectData::Group { .. } => {
                matches!(child, T::Group | T::Block | T::Line)
            }
            ObjectData::Block { .. } => child == T::Anchor,
            ObjectData::Line { .. } => matches!(child, T::Latch | T::Handle),
            _ => false,
        }
    }

    fn check_children(graph: &DiagramGraph, object: &DiagramObject, result: &mut ValidationResult) {
        let path = object_path(object.instance());
        for child in object.structural_children() {
            let Some(child_object) = graph.get(&child) else {
                result.add_error(
                    ValidationError::new(
                        ValidationErrorCode::MissingObject,
                        format!("Child '{}' does not exist", child),
                    )
                    .with_path(&path),
                );
                continue;
            };
            if child_object.parent() != Some(object.instance()) {
                result.add_error(
                    ValidationError::new(
                        ValidationErrorCode::ParentMismatch,
                        format!("Child '{}' does not point back at its parent", child),
                    )
                    .with_path(&path),
                );
            }
            if !Self::allowed(object.data(), child_object.object_type()) {
                result.add_error(
                    ValidationError::new(
                        ValidationErrorCode::InvalidChildKind,
                        format!(
                            "A {} cannot contain a {}",
                            object.object_type(),
                            child_object.object_type()
                        ),
                    )
                    .with_path(&path),
                );
            }
        }
    }
}

impl ValidationRule for StructureRule {
    fn name(&self) -> &'static str {
        "structure"
    }

    fn description(&self) -> &'static str {
        "Validates parent links, child kinds and line endpoints"
    }

    fn validate(&self, graph: &DiagramGraph) -> ValidationResult {
        let mut result = ValidationResult::ok();

        for object in graph.objects() {
            let path = object_path(object.instance());
            Self::check_children(graph, object, &mut result);

            if let Some(parent) = object.parent() {
                let listed = graph
                    .get(parent)
                    .is_some_and(|p| p.structural_children().contains(object.instance()));
                if !listed {
                    result.add_error(
                        ValidationError::new(
                            ValidationErrorCode::ParentMismatch,
                            format!("Parent '{}' does not list this object", parent),
                        )
                        .with_path(&path),
                    );
                }
            }

            if let ObjectData::Line { source, target, .. } = object.data() {
                for (end, latch) in [("source", source), ("target", target)] {
                    if latch.is_none() {
                        result.add_error(
                            ValidationError::new(
                                ValidationErrorCode::IncompleteLine,
                                format!("Line has no {} latch", end),
                            )
                            .with_path(format!("{}.{}", path, end))
                            .with_suggestion("Assign a latch created from the line's latch template"),
                        );
                    }
                }
            }
        }

        result
    }
}

/// Rule: anchors and latches point at each other
pub struct AttachmentRule;

impl ValidationRule for AttachmentRule {
    fn name(&self) -> &'static str {
        "attachment"
    }

    fn description(&self) -> &'static str {
        "Validates that anchor and latch links agree on both sides"
    }

    fn validate(&self, graph: &DiagramGraph) -> ValidationResult {
        let mut result = ValidationResult::ok();

        for object in graph.objects() {
            let path = object_path(object.instance());
            match object.data() {
                ObjectData::Anchor { latches } => {
                    for (i, latch) in latches.iter().enumerate() {
                        if latches[..i].contains(latch) {
                            result.add_error(
                                ValidationError::new(
                                    ValidationErrorCode::DuplicateAttachment,
                                    format!("Latch '{}' is listed more than once", latch),
                                )
                                .with_path(&path),
                            );
                            continue;
                        }
                        let points_back = graph
                            .get(latch)
                            .is_some_and(|l| matches!(l.data(), ObjectData::Latch { anchor: Some(a) } if a == object.instance()));
                        if !points_back {
                            result.add_error(
                                ValidationError::new(
                                    ValidationErrorCode::BrokenAttachment,
                                    format!("Latch '{}' is not attached to this anchor", latch),
                                )
                                .with_path(&path),
                            );
                        }
                    }
                }
                ObjectData::Latch { anchor } => {
                    if let Some(anchor) = anchor {
                        let listed = graph.get(anchor).is_some_and(|a| {
                            matches!(a.data(), ObjectData::Anchor { latches } if latches.contains(object.instance()))
                        });
                        if !listed {
                            result.add_error(
                                ValidationError::new(
                                    ValidationErrorCode::BrokenAttachment,
                                    format!("Anchor '{}' does not list this latch", anchor),
                                )
                                .with_path(&path),
                            );
                        }
                        if object.parent().is_none() {
                            result.add_warning(
                                ValidationWarning::new(
                                    ValidationWarningCode::OrphanLatch,
                                    "Attached latch does not belong to a line",
                                )
                                .with_path(&path),
                            );
                        }
                    }
                }
                _ => {}
            }
        }

        result
    }
}

/// Rule: required properties are set and lists are long enough
pub struct RequiredPropertiesRule;

impl RequiredPropertiesRule {
    fn check(property: &Property, path: &str, result: &mut ValidationResult) {
        let path = format!("{}.{}", path, property.id());
        let meta = property.meta();
        if meta.required && !property.is_defined() {
            result.add_warning(
                ValidationWarning::new(
                    ValidationWarningCode::MissingRequiredProperty,
                    format!("Required property '{}' is not set", meta.name.as_deref().unwrap_or(&meta.id)),
                )
                .with_path(&path),
            );
        }
        match property {
            Property::List(list) => {
                if let Some(min) = list.min_items.filter(|min| list.len() < *min) {
                    result.add_warning(
                        ValidationWarning::new(
                            ValidationWarningCode::TooFewItems,
                            format!("List has {} items, expected at least {}", list.len(), min),
                        )
                        .with_path(&path),
                    );
                }
                for (_, item) in list.iter() {
                    Self::check(item, &path, result);
                }
            }
            Property::Dictionary(dictionary) => {
                for (_, field) in dictionary.iter() {
                    Self::check(field, &path, result);
                }
            }
            Property::Tuple(tuple) => {
                for (_, field) in tuple.iter() {
                    Self::check(field, &path, result);
                }
            }
            _ => {}
        }
    }
}

impl ValidationRule for RequiredPropertiesRule {
    fn name(&self) -> &'static str {
        "required_properties"
    }

    fn description(&self) -> &'static str {
        "Warns about unset required properties and short lists"
    }

    fn validate(&self, graph: &DiagramGraph) -> ValidationResult {
        let mut result = ValidationResult::ok();
        for object in graph.objects() {
            let path = format!("{}.properties", object_path(object.instance()));
            for (_, property) in object.properties().iter() {
                Self::check(property, &path, &mut result);
            }
        }
        result
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::DiagramObjectFactory;
    use crate::fixtures::sample_factory;
    use crate::property::PropertyDescriptor;
    use crate::template::{DiagramSchema, Template};

    fn sample_graph(factory: &DiagramObjectFactory) -> (DiagramGraph, InstanceId, InstanceId) {
        let mut graph = DiagramGraph::new();
        let canvas = factory.create_new_object(&mut graph, "generic_canvas", None).unwrap();
        let block = factory.create_new_object(&mut graph, "generic_block", None).unwrap();
        let line = factory.create_new_object(&mut graph, "dynamic_line", None).unwrap();
        graph.add_child(&canvas, &block, None).unwrap();
        graph.add_child(&canvas, &line, None).unwrap();
        let up = graph.anchor_at(&block, "up").unwrap().unwrap().clone();
        let source = graph.source(&line).unwrap().clone();
        graph.link(&up, &source).unwrap();
        (graph, block, line)
    }

    #[test]
    fn test_validation_result_merge() {
        let mut result = ValidationResult::ok();
        result.merge(ValidationResult::error(ValidationError::new(
            ValidationErrorCode::Custom,
            "Error",
        )));
        assert!(!result.valid);
        assert!(result.has_errors());
        assert!(result.to_result().is_err());
    }

    #[test]
    fn test_validation_error_display() {
        let error = ValidationError::new(ValidationErrorCode::IncompleteLine, "Line has no target latch")
            .with_path("objects.l1.target");
        assert_eq!(error.to_string(), "[objects.l1.target] Line has no target latch");
    }

    #[test]
    fn test_factory_graph_is_valid() {
        let factory = sample_factory();
        let (graph, _, _) = sample_graph(&factory);
        let validator = Validator::with_default_rules();
        assert_eq!(
            validator.rule_names(),
            vec!["structure", "attachment", "required_properties"]
        );
        let result = validator.validate(&graph);
        assert!(result.valid, "{:?}", result.errors);
        assert!(graph.is_valid());
    }

    #[test]
    fn test_incomplete_line() {
        let factory = sample_factory();
        let (mut graph, _, line) = sample_graph(&factory);
        graph.set_target(&line, None).unwrap();

        let result = StructureRule.validate(&graph);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, ValidationErrorCode::IncompleteLine);
        assert_eq!(graph.validation_errors().len(), 1);
    }

    #[test]
    fn test_one_sided_attachment() {
        let factory = sample_factory();
        let (mut graph, block, _) = sample_graph(&factory);
        let up = graph.anchor_at(&block, "up").unwrap().unwrap().clone();
        graph.object_mut(&up).unwrap().data = ObjectData::Anchor { latches: Vec::new() };

        let result = AttachmentRule.validate(&graph);
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .all(|e| e.code == ValidationErrorCode::BrokenAttachment));
    }

    #[test]
    fn test_parent_mismatch() {
        let factory = sample_factory();
        let (mut graph, block, _) = sample_graph(&factory);
        graph.object_mut(&block).unwrap().set_parent(None);

        let result = StructureRule.validate(&graph);
        assert!(result
            .errors
            .iter()
            .any(|e| e.code == ValidationErrorCode::ParentMismatch));
    }

    #[test]
    fn test_required_properties_are_warnings() {
        let schema = DiagramSchema::new("req", Template::new("canvas", DiagramObjectType::Canvas))
            .with_template(
                Template::new("step", DiagramObjectType::Block)
                    .with_property("name", PropertyDescriptor::string().required()),
            );
        let factory = DiagramObjectFactory::new(schema);
        let mut graph = DiagramGraph::new();
        factory.create_new_object(&mut graph, "step", None).unwrap();

        let result = Validator::with_default_rules().validate(&graph);
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(
            result.warnings[0].code,
            ValidationWarningCode::MissingRequiredProperty
        );
    }
}
