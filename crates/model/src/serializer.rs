//! Export and import of diagram objects
//!
//! An export is a flat list of records, one per object, that reference each
//! other by instance. Records are emitted depth-first with each object
//! before its children, and each instance appears once.
//!
//! Import runs in two passes. The first builds every record's object from
//! its template; the second wires containment, anchor slots, latch links
//! and line endpoints. References are checked against the records, so a
//! dangling reference fails instead of being guessed at.

use crate::diagram::DiagramGraph;
use crate::factory::DiagramObjectFactory;
use crate::object::{DiagramObject, ObjectData};
use crate::property::JsonEntries;
use crate::template::Template;
use indexmap::IndexMap;
use openchart_core::{ChartError, ChartResult, DiagramObjectType, InstanceId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

// ============================================================================
// Export Records
// ============================================================================

/// Export record of one diagram object
///
/// Only the fields of the object's kind are present:
/// - canvas and group: `objects`
/// - block: `anchors`
/// - anchor: `latches`
/// - line: `source`, `target`, `handles`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagramObjectExport {
    /// Template name
    pub id: String,

    pub instance: InstanceId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<InstanceId>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<InstanceId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<InstanceId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handles: Option<Vec<InstanceId>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchors: Option<IndexMap<String, InstanceId>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latches: Option<Vec<InstanceId>>,

    /// Root property entries; absent when the template declares none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<JsonEntries>,
}

impl DiagramObjectExport {
    /// Build the record of a single object
    pub fn from_object(object: &DiagramObject) -> Self {
        let properties = object.properties().to_entries();
        let mut record = Self {
            id: object.id().to_string(),
            instance: object.instance().clone(),
            properties: (!properties.is_empty()).then_some(properties),
            ..Default::default()
        };
        match object.data() {
            ObjectData::Canvas { objects } | ObjectData::Group { objects } => {
                record.objects = Some(objects.clone());
            }
            ObjectData::Block { anchors } => {
                record.anchors = Some(
                    anchors
                        .iter()
                        .filter_map(|(p, a)| a.as_ref().map(|a| (p.clone(), a.clone())))
                        .collect(),
                );
            }
            ObjectData::Anchor { latches } => record.latches = Some(latches.clone()),
            ObjectData::Line {
                source,
                target,
                handles,
            } => {
                record.source = source.clone();
                record.target = target.clone();
                record.handles = Some(handles.clone());
            }
            ObjectData::Latch { .. } | ObjectData::Handle => {}
        }
        record
    }

    /// Property values to build the object with
    pub fn property_values(&self) -> Option<&[(String, serde_json::Value)]> {
        self.properties.as_deref()
    }
}

/// Check that a record carries the fields its template kind requires
pub fn assert_export_type(
    record: &DiagramObjectExport,
    kind: DiagramObjectType,
) -> ChartResult<()> {
    let fits = match kind {
        DiagramObjectType::Anchor => record.latches.is_some(),
        DiagramObjectType::Block => record.anchors.is_some(),
        DiagramObjectType::Canvas | DiagramObjectType::Group => record.objects.is_some(),
        DiagramObjectType::Line => record.handles.is_some(),
        DiagramObjectType::Latch | DiagramObjectType::Handle => true,
    };
    if fits {
        Ok(())
    } else {
        Err(ChartError::ExportCast(kind.as_str().to_string()))
    }
}

// ============================================================================
// Export
// ============================================================================

/// Export the given roots and everything they structurally own
pub fn export_objects(
    graph: &DiagramGraph,
    roots: &[InstanceId],
) -> ChartResult<Vec<DiagramObjectExport>> {
    let mut seen = HashSet::new();
    let mut records = Vec::new();
    for root in roots {
        graph.object(root)?;
        for object in graph.subtree(root) {
            if seen.insert(object.instance().clone()) {
                records.push(DiagramObjectExport::from_object(object));
            }
        }
    }
    debug!("Exported {} objects from {} roots", records.len(), roots.len());
    Ok(records)
}

// ============================================================================
// Import
// ============================================================================

/// Import records into `graph`, returning the unparented objects
///
/// Roots come back in record order. Block slots and line endpoints that a
/// record leaves out are created fresh from the template.
pub fn import_objects(
    factory: &DiagramObjectFactory,
    graph: &mut DiagramGraph,
    records: &[DiagramObjectExport],
) -> ChartResult<Vec<InstanceId>> {
    let mut seen = HashSet::new();
    for record in records {
        if !seen.insert(&record.instance) {
            return Err(ChartError::DuplicateInstance(record.instance.to_string()));
        }
    }

    // Objects first
    let mut imported = HashSet::new();
    for record in records {
        let template = factory.resolve_template(&record.id)?;
        assert_export_type(record, template.object_type)?;
        let instance = factory.create_base_object(
            graph,
            &record.id,
            Some(record.instance.clone()),
            record.property_values(),
            None,
        )?;
        imported.insert(instance);
    }

    // Then relations
    let mut importer = Importer {
        factory,
        graph: &mut *graph,
        imported: &imported,
    };
    for record in records {
        let template = factory.resolve_template(&record.id)?;
        importer.wire(record, template)?;
    }

    let roots: Vec<InstanceId> = records
        .iter()
        .filter(|r| matches!(graph.parent_of(&r.instance), Ok(None)))
        .map(|r| r.instance.clone())
        .collect();
    info!(
        "Imported {} records with {} root objects",
        records.len(),
        roots.len()
    );
    Ok(roots)
}

struct Importer<'a> {
    factory: &'a DiagramObjectFactory,
    graph: &'a mut DiagramGraph,
    imported: &'a HashSet<InstanceId>,
}

impl Importer<'_> {
    fn require<'r>(&self, instance: &'r InstanceId) -> ChartResult<&'r InstanceId> {
        if self.imported.contains(instance) {
            Ok(instance)
        } else {
            Err(ChartError::MissingExportObject(instance.to_string()))
        }
    }

    fn synthesize(
        &mut self,
        owner: &DiagramObjectExport,
        template: &str,
        kind: DiagramObjectType,
    ) -> ChartResult<InstanceId> {
        warn!(
            "Export of '{}' is missing a {}, creating one from '{}'",
            owner.instance, kind, template
        );
        self.factory
            .create_new_object(self.graph, template, Some(kind))
    }

    fn wire(&mut self, record: &DiagramObjectExport, template: &Template) -> ChartResult<()> {
        let instance = &record.instance;
        match template.object_type {
            DiagramObjectType::Canvas | DiagramObjectType::Group => {
                for child in record.objects.iter().flatten() {
                    let child = self.require(child)?;
                    self.graph.add_child(instance, child, None)?;
                }
            }
            DiagramObjectType::Block => {
                let exported = record.anchors.as_ref();
                for (position, anchor_template) in &template.anchors {
                    let anchor = match exported.and_then(|a| a.get(position)) {
                        Some(anchor) => self.require(anchor)?.clone(),
                        None => self.synthesize(record, anchor_template, DiagramObjectType::Anchor)?,
                    };
                    self.graph.add_anchor(instance, position, &anchor)?;
                }
                for position in exported.into_iter().flat_map(|a| a.keys()) {
                    if !template.anchors.contains_key(position) {
                        warn!(
                            "Ignoring undeclared anchor position '{}' on '{}'",
                            position, instance
                        );
                    }
                }
            }
            DiagramObjectType::Anchor => {
                for latch in record.latches.iter().flatten() {
                    let latch = self.require(latch)?;
                    self.graph.link(instance, latch)?;
                }
            }
            DiagramObjectType::Line => {
                let latches = template.latch_template.as_ref();
                let source = match &record.source {
                    Some(latch) => Some(self.require(latch)?.clone()),
                    None => match latches {
                        Some(l) => Some(self.synthesize(record, &l.source, DiagramObjectType::Latch)?),
                        None => None,
                    },
                };
                let target = match &record.target {
                    Some(latch) => Some(self.require(latch)?.clone()),
                    None => match latches {
                        Some(l) => Some(self.synthesize(record, &l.target, DiagramObjectType::Latch)?),
                        None => None,
                    },
                };
                self.graph.set_source(instance, source.as_ref())?;
                self.graph.set_target(instance, target.as_ref())?;
                for handle in record.handles.iter().flatten() {
                    let handle = self.require(handle)?;
                    self.graph.add_handle(instance, handle, None)?;
                }
            }
            DiagramObjectType::Latch | DiagramObjectType::Handle => {}
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
