//! Templates and diagram schemas
//!
//! A schema is the declarative description of every object kind a diagram
//! may contain. Schemas are loaded once and never change afterwards.

use crate::property::{PropertyDescriptor, RootDescriptor};
use indexmap::IndexMap;
use openchart_core::{
    ChartError, ChartResult, DiagramObjectType, Persistable, SemanticRole, Validatable,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

// ============================================================================
// Template
// ============================================================================

/// Latch templates used for a line's two endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatchTemplates {
    pub source: String,
    pub target: String,
}

/// Description of one object kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Template name, unique within the schema
    pub name: String,

    /// Optional grouping path, used by editors to build menus
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<Vec<String>>,

    /// Object kind created from this template
    #[serde(rename = "type")]
    pub object_type: DiagramObjectType,

    /// Semantic role bits given to created objects
    #[serde(default, skip_serializing_if = "SemanticRole::is_empty")]
    pub role: SemanticRole,

    /// Property descriptors, in declaration order
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: RootDescriptor,

    /// Block only: anchor position to anchor template name
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub anchors: IndexMap<String, String>,

    /// Line only: latch templates for the endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latch_template: Option<LatchTemplates>,

    /// Line only: template for bend points
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle_template: Option<String>,
}

impl Template {
    /// Create a template with no properties
    pub fn new(name: impl Into<String>, object_type: DiagramObjectType) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            object_type,
            role: SemanticRole::NONE,
            properties: IndexMap::new(),
            anchors: IndexMap::new(),
            latch_template: None,
            handle_template: None,
        }
    }

    pub fn with_role(mut self, role: SemanticRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_namespace(mut self, namespace: &[&str]) -> Self {
        self.namespace = Some(namespace.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_property(mut self, id: impl Into<String>, descriptor: PropertyDescriptor) -> Self {
        self.properties.insert(id.into(), Arc::new(descriptor));
        self
    }

    pub fn with_anchor(mut self, position: impl Into<String>, template: impl Into<String>) -> Self {
        self.anchors.insert(position.into(), template.into());
        self
    }

    pub fn with_latches(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.latch_template = Some(LatchTemplates {
            source: source.into(),
            target: target.into(),
        });
        self
    }

    pub fn with_handle(mut self, template: impl Into<String>) -> Self {
        self.handle_template = Some(template.into());
        self
    }

    /// Key of the representative property, if one is declared
    pub fn representative_key(&self) -> Option<&str> {
        self.properties
            .iter()
            .find(|(_, d)| d.is_representative())
            .map(|(k, _)| k.as_str())
    }
}

// ============================================================================
// DiagramSchema
// ============================================================================

/// A complete set of templates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramSchema {
    /// Schema identifier, recorded in every export made with it
    pub id: String,

    /// Template of the diagram root
    pub canvas: Template,

    /// Every other template
    #[serde(default)]
    pub templates: Vec<Template>,
}

impl DiagramSchema {
    pub fn new(id: impl Into<String>, canvas: Template) -> Self {
        Self {
            id: id.into(),
            canvas,
            templates: Vec::new(),
        }
    }

    pub fn with_template(mut self, template: Template) -> Self {
        self.templates.push(template);
        self
    }

    /// Canvas first, then the other templates in declaration order
    pub fn all_templates(&self) -> impl Iterator<Item = &Template> {
        std::iter::once(&self.canvas).chain(self.templates.iter())
    }

    /// Find a template by name
    pub fn template(&self, name: &str) -> Option<&Template> {
        self.all_templates().find(|t| t.name == name)
    }

    fn expect_reference(
        &self,
        owner: &str,
        name: &str,
        kind: DiagramObjectType,
    ) -> ChartResult<()> {
        match self.template(name) {
            None => Err(ChartError::validation(format!(
                "Template '{}' references unknown template '{}'",
                owner, name
            ))),
            Some(t) if t.object_type != kind => Err(ChartError::validation(format!(
                "Template '{}' references '{}', which is not a {}",
                owner, name, kind
            ))),
            Some(_) => Ok(()),
        }
    }
}

impl Persistable for DiagramSchema {
    fn file_extension() -> &'static str {
        "ocs"
    }
}

impl Validatable for DiagramSchema {
    fn validate(&self) -> ChartResult<()> {
        if self.id.trim().is_empty() {
            return Err(ChartError::validation("Schema id cannot be empty"));
        }
        if self.canvas.object_type != DiagramObjectType::Canvas {
            return Err(ChartError::unexpected_type(
                &self.canvas.name,
                DiagramObjectType::Canvas,
            ));
        }

        let mut names = HashSet::new();
        for template in self.all_templates() {
            if !names.insert(template.name.as_str()) {
                return Err(ChartError::validation(format!(
                    "Duplicate template name '{}'",
                    template.name
                )));
            }
        }

        for template in &self.templates {
            if template.object_type == DiagramObjectType::Canvas {
                return Err(ChartError::validation(format!(
                    "Template '{}' declares a second canvas",
                    template.name
                )));
            }
            for anchor in template.anchors.values() {
                self.expect_reference(&template.name, anchor, DiagramObjectType::Anchor)?;
            }
            if let Some(latches) = &template.latch_template {
                self.expect_reference(&template.name, &latches.source, DiagramObjectType::Latch)?;
                self.expect_reference(&template.name, &latches.target, DiagramObjectType::Latch)?;
            }
            if let Some(handle) = &template.handle_template {
                self.expect_reference(&template.name, handle, DiagramObjectType::Handle)?;
            }
            if template.object_type == DiagramObjectType::Line && template.latch_template.is_none()
            {
                return Err(ChartError::validation(format!(
                    "Line template '{}' has no latch templates",
                    template.name
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_schema;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_schema_json() {
        let schema: DiagramSchema = serde_json::from_value(json!({
            "id": "flow",
            "canvas": {"name": "canvas", "type": "canvas"},
            "templates": [
                {
                    "name": "step",
                    "type": "block",
                    "role": 1,
                    "namespace": ["steps"],
                    "properties": {"name": {"type": "string", "is_representative": true}},
                    "anchors": {"out": "port"}
                },
                {"name": "port", "type": "anchor"}
            ]
        }))
        .unwrap();

        let step = schema.template("step").unwrap();
        assert_eq!(step.role, SemanticRole::NODE);
        assert_eq!(step.anchors["out"], "port");
        assert_eq!(step.representative_key(), Some("name"));
        assert!(schema.template("missing").is_none());
        schema.validate().unwrap();
    }

    #[test]
    fn test_sample_schema_is_valid() {
        let schema = sample_schema();
        assert!(schema.is_valid());
        assert_eq!(schema.all_templates().count(), 8);
        assert_eq!(schema.all_templates().next().unwrap().name, "generic_canvas");
    }

    #[test]
    fn test_schema_rejects_dangling_reference() {
        let schema = DiagramSchema::new(
            "broken",
            Template::new("canvas", DiagramObjectType::Canvas),
        )
        .with_template(
            Template::new("box", DiagramObjectType::Block).with_anchor("up", "nowhere"),
        );
        let errors = schema.validation_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("nowhere"));
    }

    #[test]
    fn test_schema_rejects_duplicate_names() {
        let schema = DiagramSchema::new("dup", Template::new("canvas", DiagramObjectType::Canvas))
            .with_template(Template::new("canvas", DiagramObjectType::Group));
        assert!(!schema.is_valid());
    }

    #[test]
    fn test_schema_json_round_trip() {
        let schema = sample_schema();
        let json = schema.to_json().unwrap();
        let parsed = DiagramSchema::from_json(&json).unwrap();
        assert_eq!(parsed, schema);
    }
}
