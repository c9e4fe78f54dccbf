//! Diagram objects
//!
//! A `DiagramObject` is one node of the editable graph. Objects never hold
//! references to each other; every relation is an `InstanceId` owned by the
//! `DiagramGraph` arena and changed only through its methods.

use crate::property::RootProperty;
use indexmap::IndexMap;
use openchart_core::{DiagramObjectType, InstanceId, Position, Positioned, SemanticRole};

// ============================================================================
// ObjectData
// ============================================================================

/// Kind-specific relations of a diagram object
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectData {
    /// The diagram root; owns an ordered list of objects
    Canvas { objects: Vec<InstanceId> },

    /// A nested container of groups, blocks and lines
    Group { objects: Vec<InstanceId> },

    /// Declared anchor positions; a slot is empty until an anchor is added
    Block {
        anchors: IndexMap<String, Option<InstanceId>>,
    },

    /// Latches currently attached to this anchor, in attachment order
    Anchor { latches: Vec<InstanceId> },

    /// The anchor this latch is attached to
    Latch { anchor: Option<InstanceId> },

    /// Structural endpoints and bend points of a line
    Line {
        source: Option<InstanceId>,
        target: Option<InstanceId>,
        handles: Vec<InstanceId>,
    },

    /// A line bend point
    Handle,
}

impl ObjectData {
    /// Empty relations for an object of the given kind
    pub fn empty(kind: DiagramObjectType) -> Self {
        match kind {
            DiagramObjectType::Canvas => ObjectData::Canvas { objects: Vec::new() },
            DiagramObjectType::Group => ObjectData::Group { objects: Vec::new() },
            DiagramObjectType::Block => ObjectData::Block {
                anchors: IndexMap::new(),
            },
            DiagramObjectType::Anchor => ObjectData::Anchor { latches: Vec::new() },
            DiagramObjectType::Latch => ObjectData::Latch { anchor: None },
            DiagramObjectType::Line => ObjectData::Line {
                source: None,
                target: None,
                handles: Vec::new(),
            },
            DiagramObjectType::Handle => ObjectData::Handle,
        }
    }

    /// The object kind these relations belong to
    pub fn kind(&self) -> DiagramObjectType {
        match self {
            ObjectData::Canvas { .. } => DiagramObjectType::Canvas,
            ObjectData::Group { .. } => DiagramObjectType::Group,
            ObjectData::Block { .. } => DiagramObjectType::Block,
            ObjectData::Anchor { .. } => DiagramObjectType::Anchor,
            ObjectData::Latch { .. } => DiagramObjectType::Latch,
            ObjectData::Line { .. } => DiagramObjectType::Line,
            ObjectData::Handle => DiagramObjectType::Handle,
        }
    }
}

// ============================================================================
// DiagramObject
// ============================================================================

/// One object of a diagram
#[derive(Debug, Clone, PartialEq)]
pub struct DiagramObject {
    id: String,
    instance: InstanceId,
    role: SemanticRole,
    properties: RootProperty,
    parent: Option<InstanceId>,
    position: Position,
    pub(crate) data: ObjectData,
}

impl DiagramObject {
    pub(crate) fn new(
        id: impl Into<String>,
        instance: InstanceId,
        role: SemanticRole,
        properties: RootProperty,
        data: ObjectData,
    ) -> Self {
        Self {
            id: id.into(),
            instance,
            role,
            properties,
            parent: None,
            position: Position::zero(),
            data,
        }
    }

    /// Copy of this object under a new instance, with no parent
    pub(crate) fn duplicate(&self, instance: InstanceId, data: ObjectData) -> Self {
        Self {
            id: self.id.clone(),
            instance,
            role: self.role,
            properties: self.properties.clone(),
            parent: None,
            position: self.position,
            data,
        }
    }

    /// Name of the template this object was created from
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Unique instance identifier
    pub fn instance(&self) -> &InstanceId {
        &self.instance
    }

    pub fn object_type(&self) -> DiagramObjectType {
        self.data.kind()
    }

    pub fn semantic_role(&self) -> SemanticRole {
        self.role
    }

    /// Check if any of the bits in `role` are set
    pub fn has_role(&self, role: SemanticRole) -> bool {
        self.role.intersects(role)
    }

    /// Replace the bits selected by `mask` with those of `role`
    pub fn set_role(&mut self, mask: SemanticRole, role: SemanticRole) {
        self.role = (self.role - mask) | (role & mask);
    }

    pub fn properties(&self) -> &RootProperty {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut RootProperty {
        &mut self.properties
    }

    /// Structural parent, if any
    pub fn parent(&self) -> Option<&InstanceId> {
        self.parent.as_ref()
    }

    pub(crate) fn set_parent(&mut self, parent: Option<InstanceId>) {
        self.parent = parent;
    }

    /// Kind-specific relations
    pub fn data(&self) -> &ObjectData {
        &self.data
    }

    /// Structural children in export order
    ///
    /// Anchors list their attached latches here even though they do not own
    /// them; `structural_children` leaves those out.
    pub fn children(&self) -> Vec<InstanceId> {
        match &self.data {
            ObjectData::Anchor { latches } => latches.clone(),
            _ => self.structural_children(),
        }
    }

    /// Children owned by this object
    pub fn structural_children(&self) -> Vec<InstanceId> {
        match &self.data {
            ObjectData::Canvas { objects } | ObjectData::Group { objects } => objects.clone(),
            ObjectData::Block { anchors } => anchors.values().flatten().cloned().collect(),
            ObjectData::Line {
                source,
                target,
                handles,
            } => source
                .iter()
                .chain(target.iter())
                .chain(handles.iter())
                .cloned()
                .collect(),
            ObjectData::Anchor { .. } | ObjectData::Latch { .. } | ObjectData::Handle => {
                Vec::new()
            }
        }
    }

    /// Display label from the representative property
    pub fn label(&self) -> String {
        match self.properties.representative() {
            Some(p) if p.is_defined() => p.to_string(),
            _ => self.id.clone(),
        }
    }
}

impl Positioned for DiagramObject {
    fn position(&self) -> Position {
        self.position
    }

    fn set_position(&mut self, position: Position) {
        self.position = position;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn object(kind: DiagramObjectType) -> DiagramObject {
        DiagramObject::new(
            "test_object",
            InstanceId::from("a"),
            SemanticRole::NONE,
            RootProperty::default(),
            ObjectData::empty(kind),
        )
    }

    #[test]
    fn test_empty_data_matches_kind() {
        for kind in DiagramObjectType::all() {
            assert_eq!(ObjectData::empty(*kind).kind(), *kind);
        }
    }

    #[test]
    fn test_role_bits() {
        let mut obj = object(DiagramObjectType::Block);
        assert!(!obj.has_role(SemanticRole::NODE));

        obj.set_role(SemanticRole::NODE, SemanticRole::NODE);
        assert!(obj.has_role(SemanticRole::NODE));
        assert!(!obj.has_role(SemanticRole::EDGE));

        obj.set_role(SemanticRole::NODE | SemanticRole::EDGE, SemanticRole::EDGE);
        assert_eq!(obj.semantic_role(), SemanticRole::EDGE);
    }

    #[test]
    fn test_line_children_order() {
        let mut obj = object(DiagramObjectType::Line);
        obj.data = ObjectData::Line {
            source: Some("s".into()),
            target: None,
            handles: vec!["h1".into(), "h2".into()],
        };
        let children: Vec<String> = obj.children().iter().map(|c| c.to_string()).collect();
        assert_eq!(children, vec!["s", "h1", "h2"]);
    }

    #[test]
    fn test_anchor_latches_are_not_structural() {
        let mut obj = object(DiagramObjectType::Anchor);
        obj.data = ObjectData::Anchor {
            latches: vec!["l".into()],
        };
        assert_eq!(obj.children().len(), 1);
        assert!(obj.structural_children().is_empty());
    }

    #[test]
    fn test_position_bookkeeping() {
        let mut obj = object(DiagramObjectType::Handle);
        obj.translate(3.0, 4.0);
        assert_eq!(obj.position(), Position::new(3.0, 4.0));
        assert_eq!(obj.label(), "test_object");
    }
}
