//! Object factory
//!
//! Builds diagram objects and their properties from a schema. Shared
//! sub-structures (enum option lists and tuple combination indices) are
//! cached per factory, keyed by the identity of the descriptor they come
//! from. Descriptors that are equal but separately allocated do not share a
//! cache entry.

use crate::diagram::DiagramGraph;
use crate::object::{DiagramObject, ObjectData};
use crate::property::descriptor::{
    DictionaryDescriptor, ListDescriptor, TupleDescriptor,
};
use crate::property::{
    CombinationIndex, DateProperty, DictionaryProperty, EnumProperty, FloatProperty,
    IntProperty, ListProperty, Property, PropertyDescriptor, PropertyMeta, RootDescriptor,
    RootProperty, StringProperty, TupleProperty, ValueCombination, parse_entries,
};
use crate::template::{DiagramSchema, Template};
use indexmap::IndexMap;
use openchart_core::{ChartError, ChartResult, DiagramObjectType, InstanceId};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

type OptionCache = HashMap<usize, (Arc<ListDescriptor>, Arc<ListProperty>)>;
type CombinationCache = HashMap<usize, (Arc<Vec<ValueCombination>>, Arc<CombinationIndex>)>;

// ============================================================================
// DiagramObjectFactory
// ============================================================================

/// Creates diagram objects from a schema's templates
#[derive(Debug)]
pub struct DiagramObjectFactory {
    schema: DiagramSchema,
    templates: IndexMap<String, Template>,
    option_cache: RefCell<OptionCache>,
    combination_cache: RefCell<CombinationCache>,
}

impl DiagramObjectFactory {
    /// Index a schema's templates, canvas included
    pub fn new(schema: DiagramSchema) -> Self {
        let templates: IndexMap<String, Template> = schema
            .all_templates()
            .map(|t| (t.name.clone(), t.clone()))
            .collect();
        info!(
            "Loaded schema '{}' with {} templates",
            schema.id,
            templates.len()
        );
        Self {
            schema,
            templates,
            option_cache: RefCell::new(HashMap::new()),
            combination_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Identifier of the schema this factory was built from
    pub fn id(&self) -> &str {
        &self.schema.id
    }

    pub fn schema(&self) -> &DiagramSchema {
        &self.schema
    }

    pub fn canvas_template(&self) -> &Template {
        &self.schema.canvas
    }

    /// All templates, canvas first
    pub fn templates(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    /// Look up a template by name
    pub fn resolve_template(&self, name: &str) -> ChartResult<&Template> {
        self.templates
            .get(name)
            .ok_or_else(|| ChartError::TemplateNotFound(name.to_string()))
    }

    /// Number of option lists built so far
    pub fn cached_option_lists(&self) -> usize {
        self.option_cache.borrow().len()
    }

    /// Number of combination indices built so far
    pub fn cached_combination_indices(&self) -> usize {
        self.combination_cache.borrow().len()
    }

    fn expect_type(template: &Template, expected: Option<DiagramObjectType>) -> ChartResult<()> {
        match expected {
            Some(kind) if kind != template.object_type => {
                Err(ChartError::unexpected_type(&template.name, kind))
            }
            _ => Ok(()),
        }
    }

    // ========================================================================
    // Object Creation
    // ========================================================================

    /// Create a fully wired object from a template name
    ///
    /// Blocks get a fresh anchor in every declared position. Lines get fresh
    /// source and target latches, and one handle when the template declares
    /// a handle template.
    pub fn create_new_object(
        &self,
        graph: &mut DiagramGraph,
        name: &str,
        expected: Option<DiagramObjectType>,
    ) -> ChartResult<InstanceId> {
        let template = self.resolve_template(name)?;
        self.create_new_from_template(graph, template, expected)
    }

    /// Create a fully wired object from a template
    ///
    /// When a child cannot be created or attached, everything created so far
    /// is removed from the graph again.
    pub fn create_new_from_template(
        &self,
        graph: &mut DiagramGraph,
        template: &Template,
        expected: Option<DiagramObjectType>,
    ) -> ChartResult<InstanceId> {
        Self::expect_type(template, expected)?;
        let instance = self.create_base_from_template(graph, template, None, None)?;
        let mut created = vec![instance.clone()];
        if let Err(e) = self.wire_new(graph, template, &instance, &mut created) {
            graph.discard(&created);
            return Err(e);
        }
        debug!("Created new '{}' ({})", template.name, instance);
        Ok(instance)
    }

    fn wire_new(
        &self,
        graph: &mut DiagramGraph,
        template: &Template,
        instance: &InstanceId,
        created: &mut Vec<InstanceId>,
    ) -> ChartResult<()> {
        match template.object_type {
            DiagramObjectType::Block => {
                for (position, anchor_template) in &template.anchors {
                    let anchor = self.create_new_object(
                        graph,
                        anchor_template,
                        Some(DiagramObjectType::Anchor),
                    )?;
                    created.push(anchor.clone());
                    graph.add_anchor(instance, position, &anchor)?;
                }
            }
            DiagramObjectType::Line => {
                match &template.latch_template {
                    Some(latches) => {
                        let source = self.create_new_object(
                            graph,
                            &latches.source,
                            Some(DiagramObjectType::Latch),
                        )?;
                        created.push(source.clone());
                        let target = self.create_new_object(
                            graph,
                            &latches.target,
                            Some(DiagramObjectType::Latch),
                        )?;
                        created.push(target.clone());
                        graph.set_source(instance, Some(&source))?;
                        graph.set_target(instance, Some(&target))?;
                    }
                    None => warn!("Line template '{}' declares no latches", template.name),
                }
                if let Some(handle_template) = &template.handle_template {
                    let handle = self.create_new_object(
                        graph,
                        handle_template,
                        Some(DiagramObjectType::Handle),
                    )?;
                    created.push(handle.clone());
                    graph.add_handle(instance, &handle, None)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Create only the object itself
    ///
    /// Block anchor positions are declared but left empty and lines have no
    /// latches, so that imported children can be attached afterwards.
    pub fn create_base_object(
        &self,
        graph: &mut DiagramGraph,
        name: &str,
        instance: Option<InstanceId>,
        values: Option<&[(String, Value)]>,
        expected: Option<DiagramObjectType>,
    ) -> ChartResult<InstanceId> {
        let template = self.resolve_template(name)?;
        Self::expect_type(template, expected)?;
        self.create_base_from_template(graph, template, instance, values)
    }

    fn create_base_from_template(
        &self,
        graph: &mut DiagramGraph,
        template: &Template,
        instance: Option<InstanceId>,
        values: Option<&[(String, Value)]>,
    ) -> ChartResult<InstanceId> {
        let properties = self.create_root_property(&template.properties, values)?;
        let data = match template.object_type {
            DiagramObjectType::Block => ObjectData::Block {
                anchors: template.anchors.keys().map(|p| (p.clone(), None)).collect(),
            },
            kind => ObjectData::empty(kind),
        };
        let object = DiagramObject::new(
            template.name.clone(),
            instance.unwrap_or_else(InstanceId::generate),
            template.role,
            properties,
            data,
        );
        graph.insert(object)
    }

    // ========================================================================
    // Property Creation
    // ========================================================================

    /// Build an object's root property from its template's descriptors
    ///
    /// Values for ids the template does not declare are ignored.
    pub fn create_root_property(
        &self,
        descriptors: &RootDescriptor,
        values: Option<&[(String, Value)]>,
    ) -> ChartResult<RootProperty> {
        let values: HashMap<&str, &Value> = values
            .unwrap_or_default()
            .iter()
            .map(|(id, v)| (id.as_str(), v))
            .collect();
        let mut root = DictionaryProperty::new(PropertyMeta::new("root"));
        for (id, descriptor) in descriptors {
            let property = self.create_property(id, descriptor, values.get(id.as_str()).copied())?;
            root.insert_field(id, property, descriptor.is_representative());
        }
        Ok(RootProperty::new(root))
    }

    /// Build a property from its descriptor
    ///
    /// A missing value falls back to the descriptor's default. Collections
    /// require `[[id, value], ...]` entries and atomics reject arrays.
    pub fn create_property(
        &self,
        id: &str,
        descriptor: &PropertyDescriptor,
        value: Option<&Value>,
    ) -> ChartResult<Property> {
        match descriptor {
            PropertyDescriptor::List(d) => {
                Ok(Property::List(self.create_list_property(id, d, value)?))
            }
            PropertyDescriptor::Dictionary(d) => Ok(Property::Dictionary(
                self.create_dictionary_property(id, d, value)?,
            )),
            PropertyDescriptor::Tuple(d) => {
                Ok(Property::Tuple(self.create_tuple_property(id, d, value)?))
            }
            _ => {
                if let Some(v) = value.filter(|v| v.is_array()) {
                    return Err(ChartError::InvalidJsonPrimitive(v.to_string()));
                }
                self.create_atomic_property(id, descriptor, value)
            }
        }
    }

    /// Build a list; without a value the descriptor's default entries are used
    pub fn create_list_property(
        &self,
        id: &str,
        descriptor: &ListDescriptor,
        value: Option<&Value>,
    ) -> ChartResult<ListProperty> {
        let prototype = self.create_property(id, &descriptor.form, None)?;
        let mut list = ListProperty::new(PropertyMeta::from_base(id, &descriptor.base), prototype);
        list.min_items = descriptor.min_items;
        match value {
            Some(value) => {
                for (item_id, v) in parse_entries(value)? {
                    list.insert_json(item_id, v)?;
                }
            }
            None => {
                for (item_id, v) in descriptor.default.iter().flatten() {
                    list.insert_json(item_id, v)?;
                }
            }
        }
        Ok(list)
    }

    /// Build a dictionary; fields without a value take their own defaults
    pub fn create_dictionary_property(
        &self,
        id: &str,
        descriptor: &DictionaryDescriptor,
        value: Option<&Value>,
    ) -> ChartResult<DictionaryProperty> {
        let entries: HashMap<&str, &Value> = match value {
            Some(value) => parse_entries(value)?.into_iter().collect(),
            None => HashMap::new(),
        };
        let mut dictionary = DictionaryProperty::new(PropertyMeta::from_base(id, &descriptor.base));
        for (field_id, field) in &descriptor.form {
            let property = self.create_property(field_id, field, entries.get(field_id.as_str()).copied())?;
            dictionary.insert_field(field_id, property, field.is_representative());
        }
        Ok(dictionary)
    }

    /// Build a tuple, sharing the combination index of its descriptor
    pub fn create_tuple_property(
        &self,
        id: &str,
        descriptor: &TupleDescriptor,
        value: Option<&Value>,
    ) -> ChartResult<TupleProperty> {
        let combinations = descriptor
            .combinations
            .as_ref()
            .map(|c| self.combination_index(c));
        let mut tuple = TupleProperty::new(PropertyMeta::from_base(id, &descriptor.base), combinations);
        for (field_id, field) in &descriptor.form {
            let property = self.create_property(field_id, field, None)?;
            tuple.insert_field(field_id, property, field.is_representative())?;
        }
        if let Some(value) = value {
            parse_entries(value)?;
            tuple.set_json(value)?;
        }
        Ok(tuple)
    }

    /// Build an atomic property; an explicit `null` leaves it undefined
    pub fn create_atomic_property(
        &self,
        id: &str,
        descriptor: &PropertyDescriptor,
        value: Option<&Value>,
    ) -> ChartResult<Property> {
        let meta = PropertyMeta::from_base(id, descriptor.base());
        let resolve = |default: &Option<Value>| value.cloned().or_else(|| default.clone());
        let property = match descriptor {
            PropertyDescriptor::String(d) => {
                let mut p = StringProperty::new(meta, d.suggestions.clone());
                if let Some(v) = resolve(&d.default) {
                    p.set_json(&v);
                }
                Property::String(p)
            }
            PropertyDescriptor::Int(d) => {
                let mut p = IntProperty::new(meta, d.min, d.max);
                if let Some(v) = resolve(&d.default) {
                    p.set_json(&v);
                }
                Property::Int(p)
            }
            PropertyDescriptor::Float(d) => {
                let mut p = FloatProperty::new(meta, d.min, d.max);
                if let Some(v) = resolve(&d.default) {
                    p.set_json(&v);
                }
                Property::Float(p)
            }
            PropertyDescriptor::Date(d) => {
                let mut p = DateProperty::new(meta);
                if let Some(v) = resolve(&d.default) {
                    p.set_json(&v);
                }
                Property::Date(p)
            }
            PropertyDescriptor::Enum(d) => {
                let options = self.enum_options(id, &d.options)?;
                let mut p = EnumProperty::new(meta, options);
                if let Some(v) = resolve(&d.default) {
                    p.set_json(&v);
                }
                Property::Enum(p)
            }
            other => return Err(ChartError::unexpected_type(id, other.kind_name())),
        };
        Ok(property)
    }

    /// Option list for an enum descriptor, built once per descriptor
    fn enum_options(&self, id: &str, descriptor: &Arc<ListDescriptor>) -> ChartResult<Arc<ListProperty>> {
        let key = Arc::as_ptr(descriptor) as usize;
        if let Some((_, options)) = self.option_cache.borrow().get(&key) {
            return Ok(Arc::clone(options));
        }
        let options = Arc::new(self.create_list_property(&format!("{}.options", id), descriptor, None)?);
        self.option_cache
            .borrow_mut()
            .insert(key, (Arc::clone(descriptor), Arc::clone(&options)));
        Ok(options)
    }

    /// Combination index for a tuple descriptor, built once per descriptor
    fn combination_index(&self, combinations: &Arc<Vec<ValueCombination>>) -> Arc<CombinationIndex> {
        let key = Arc::as_ptr(combinations) as usize;
        if let Some((_, index)) = self.combination_cache.borrow().get(&key) {
            return Arc::clone(index);
        }
        let index = Arc::new(CombinationIndex::new(combinations));
        self.combination_cache
            .borrow_mut()
            .insert(key, (Arc::clone(combinations), Arc::clone(&index)));
        index
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_factory;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn descriptor(value: Value) -> PropertyDescriptor {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_new_block_has_declared_anchors() {
        let factory = sample_factory();
        let mut graph = DiagramGraph::new();
        let block = factory
            .create_new_object(&mut graph, "generic_block", Some(DiagramObjectType::Block))
            .unwrap();

        let anchors = graph.anchors(&block).unwrap();
        let positions: Vec<&str> = anchors.keys().map(String::as_str).collect();
        assert_eq!(positions, vec!["up", "left", "down", "right"]);
        for anchor in anchors.values() {
            let anchor = graph.object(anchor.as_ref().unwrap()).unwrap();
            assert_eq!(anchor.id(), "generic_anchor");
            assert_eq!(anchor.parent(), Some(&block));
        }

        let properties = graph.object(&block).unwrap().properties();
        assert_eq!(properties.get("size").unwrap().to_string(), "10");
        assert!(!properties.get("name").unwrap().is_defined());
        assert_eq!(properties.representative_key(), Some("name"));
    }

    #[test]
    fn test_new_line_has_latches_and_handle() {
        let factory = sample_factory();
        let mut graph = DiagramGraph::new();
        let line = factory.create_new_object(&mut graph, "dynamic_line", None).unwrap();

        let source = graph.source(&line).unwrap();
        let target = graph.target(&line).unwrap();
        assert_ne!(source, target);
        assert_eq!(graph.object(source).unwrap().id(), "generic_latch");
        assert_eq!(graph.handles(&line).unwrap().len(), 1);
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn test_resolve_unknown_template() {
        let factory = sample_factory();
        let mut graph = DiagramGraph::new();
        let err = factory.create_new_object(&mut graph, "nope", None).unwrap_err();
        assert_eq!(err.to_string(), "Cannot resolve template: 'nope'.");
    }

    #[test]
    fn test_unexpected_type_creates_nothing() {
        let factory = sample_factory();
        let mut graph = DiagramGraph::new();
        let err = factory
            .create_new_object(&mut graph, "generic_block", Some(DiagramObjectType::Line))
            .unwrap_err();
        assert_eq!(err.to_string(), "Expected 'generic_block' to be a Line.");
        assert!(graph.is_empty());
    }

    #[test]
    fn test_failed_children_leave_no_objects() {
        let schema = DiagramSchema::new("broken", Template::new("canvas", DiagramObjectType::Canvas))
            .with_template(
                Template::new("half_block", DiagramObjectType::Block)
                    .with_anchor("left", "port")
                    .with_anchor("right", "missing_port"),
            )
            .with_template(
                Template::new("bad_line", DiagramObjectType::Line)
                    .with_latches("end", "half_block")
                    .with_handle("bend"),
            )
            .with_template(Template::new("port", DiagramObjectType::Anchor))
            .with_template(Template::new("end", DiagramObjectType::Latch))
            .with_template(Template::new("bend", DiagramObjectType::Handle));
        let factory = DiagramObjectFactory::new(schema);
        let mut graph = DiagramGraph::new();

        let err = factory.create_new_object(&mut graph, "half_block", None).unwrap_err();
        assert_eq!(err.to_string(), "Cannot resolve template: 'missing_port'.");
        assert!(graph.is_empty());

        let err = factory.create_new_object(&mut graph, "bad_line", None).unwrap_err();
        assert!(matches!(err, ChartError::UnexpectedType { .. }));
        assert!(graph.is_empty());

        // The graph stays usable afterwards
        factory.create_new_object(&mut graph, "canvas", None).unwrap();
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_base_object_keeps_instance_and_values() {
        let factory = sample_factory();
        let mut graph = DiagramGraph::new();
        let values = vec![
            ("name".to_string(), json!("Small Block")),
            ("size".to_string(), json!(5)),
            ("unknown".to_string(), json!(true)),
        ];
        let block = factory
            .create_base_object(
                &mut graph,
                "generic_block",
                Some(InstanceId::from("b1")),
                Some(&values),
                None,
            )
            .unwrap();
        assert_eq!(block.as_str(), "b1");
        assert!(graph.anchors(&block).unwrap().values().all(Option::is_none));

        let object = graph.object(&block).unwrap();
        assert_eq!(object.label(), "Small Block");
        assert_eq!(
            object.properties().to_entries(),
            vec![
                ("name".to_string(), json!("Small Block")),
                ("size".to_string(), json!(5)),
            ]
        );
    }

    #[test]
    fn test_missing_and_null_values() {
        let factory = sample_factory();
        let desc = descriptor(json!({"type": "int", "default": 3}));
        let missing = factory.create_property("n", &desc, None).unwrap();
        assert_eq!(missing.to_json(), json!(3));
        let null = factory.create_property("n", &desc, Some(&Value::Null)).unwrap();
        assert!(!null.is_defined());
    }

    #[test]
    fn test_collection_and_primitive_shapes() {
        let factory = sample_factory();
        let list = descriptor(json!({"type": "list", "form": {"type": "string"}}));
        let err = factory
            .create_property("l", &list, Some(&json!({"a": 1})))
            .unwrap_err();
        assert!(matches!(err, ChartError::InvalidJsonEntries(_)));

        let string = PropertyDescriptor::string();
        let err = factory
            .create_property("s", &string, Some(&json!(["a"])))
            .unwrap_err();
        assert!(matches!(err, ChartError::InvalidJsonPrimitive(_)));
    }

    #[test]
    fn test_list_and_dictionary_defaults() {
        let factory = sample_factory();
        let list = descriptor(json!({
            "type": "list",
            "form": {
                "type": "dictionary",
                "form": {
                    "key": {"type": "string", "is_representative": true},
                    "weight": {"type": "float", "default": 1.5}
                }
            },
            "default": [["a", [["key", "alpha"]]]]
        }));
        let property = factory.create_property("entries", &list, None).unwrap();
        assert_eq!(
            property.to_json(),
            json!([["a", [["key", "alpha"], ["weight", 1.5]]]])
        );
        assert_eq!(property.to_string(), "alpha");

        let explicit = factory
            .create_property("entries", &list, Some(&json!([])))
            .unwrap();
        assert!(!explicit.is_defined());
    }

    #[test]
    fn test_enum_options_cached_by_identity() {
        let factory = sample_factory();
        let desc = descriptor(json!({
            "type": "enum",
            "options": {
                "type": "list",
                "form": {"type": "string"},
                "default": [["low", "Low"], ["high", "High"]]
            },
            "default": "low"
        }));
        let a = factory.create_property("level", &desc, None).unwrap();
        let b = factory.create_property("level", &desc, Some(&json!("high"))).unwrap();
        let (a, b) = (a.as_enum().unwrap(), b.as_enum().unwrap());
        assert!(Arc::ptr_eq(a.options(), b.options()));
        assert_eq!(a.options().meta.id, "level.options");
        assert_eq!(a.to_string(), "Low");
        assert_eq!(b.to_string(), "High");

        // Equal but separately allocated descriptors are not shared
        let separate = descriptor(json!({
            "type": "enum",
            "options": {"type": "list", "form": {"type": "string"}, "default": [["low", "Low"]]}
        }));
        let c = factory.create_property("level", &separate, None).unwrap();
        assert!(!Arc::ptr_eq(a.options(), c.as_enum().unwrap().options()));
        assert_eq!(factory.cached_option_lists(), 2);

        // Caches belong to the factory instance
        let other = sample_factory();
        assert_eq!(other.cached_option_lists(), 0);
    }

    #[test]
    fn test_tuple_combinations_shared() {
        let factory = sample_factory();
        let desc = descriptor(json!({
            "type": "tuple",
            "form": {
                "tactic": {"type": "string"},
                "technique": {"type": "string"}
            },
            "combinations": [
                ["tactic", "TA0002", "technique", "T1059"],
                ["tactic", "TA0001", "technique", "T1566"]
            ]
        }));
        let a = factory
            .create_property("attack", &desc, Some(&json!([["tactic", "TA0002"]])))
            .unwrap();
        let b = factory.create_property("attack", &desc, None).unwrap();
        // Stored values are taken as given, only the valid values follow them
        assert_eq!(a.to_json(), json!([["tactic", "TA0002"], ["technique", null]]));
        let (a, b) = (a.as_tuple().unwrap(), b.as_tuple().unwrap());
        let technique: Vec<String> = a.valid_values().unwrap()["technique"].iter().cloned().collect();
        assert_eq!(technique, vec!["T1059".to_string()]);
        assert!(Arc::ptr_eq(a.combinations().unwrap(), b.combinations().unwrap()));
        assert_eq!(factory.cached_combination_indices(), 1);
    }

    #[test]
    fn test_templates_include_canvas() {
        let factory = sample_factory();
        assert_eq!(factory.id(), "sample_schema");
        assert_eq!(factory.templates().next().unwrap().name, "generic_canvas");
        assert_eq!(
            factory.resolve_template("generic_canvas").unwrap().object_type,
            DiagramObjectType::Canvas
        );
    }
}
