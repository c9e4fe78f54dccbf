//! Diagram graph arena
//!
//! `DiagramGraph` owns every object of a loaded diagram, keyed by instance.
//! It is the only place where containment and anchor/latch relations are
//! changed, which keeps both sides of every relation in step:
//!
//! - every non-root object has exactly one structural parent
//! - an anchor lists a latch exactly when the latch points back at it
//! - instance identifiers are unique

use crate::object::{DiagramObject, ObjectData};
use indexmap::IndexMap;
use openchart_core::{
    ChartError, ChartResult, DiagramObjectType, InstanceId, Position, Positioned, SemanticRole,
};
use std::collections::{HashMap, HashSet};

/// Line endpoint selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Source,
    Target,
}

impl Endpoint {
    fn name(self) -> &'static str {
        match self {
            Endpoint::Source => "source",
            Endpoint::Target => "target",
        }
    }
}

// ============================================================================
// DiagramGraph
// ============================================================================

/// Arena of diagram objects
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagramGraph {
    objects: IndexMap<InstanceId, DiagramObject>,
}

impl DiagramGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects in the graph
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, instance: &InstanceId) -> bool {
        self.objects.contains_key(instance)
    }

    /// Add an unattached object to the arena
    pub fn insert(&mut self, object: DiagramObject) -> ChartResult<InstanceId> {
        let instance = object.instance().clone();
        if self.objects.contains_key(&instance) {
            return Err(ChartError::DuplicateInstance(instance.to_string()));
        }
        self.objects.insert(instance.clone(), object);
        Ok(instance)
    }

    pub fn get(&self, instance: &InstanceId) -> Option<&DiagramObject> {
        self.objects.get(instance)
    }

    /// Look up an object, failing if it is not in the graph
    pub fn object(&self, instance: &InstanceId) -> ChartResult<&DiagramObject> {
        self.objects
            .get(instance)
            .ok_or_else(|| ChartError::ObjectNotFound(instance.to_string()))
    }

    /// Mutable access for properties, roles and position
    pub fn object_mut(&mut self, instance: &InstanceId) -> ChartResult<&mut DiagramObject> {
        self.objects
            .get_mut(instance)
            .ok_or_else(|| ChartError::ObjectNotFound(instance.to_string()))
    }

    /// Iterate over all objects in insertion order
    pub fn objects(&self) -> impl Iterator<Item = &DiagramObject> {
        self.objects.values()
    }

    /// Objects without a structural parent
    pub fn roots(&self) -> Vec<&InstanceId> {
        self.objects
            .values()
            .filter(|o| o.parent().is_none())
            .map(|o| o.instance())
            .collect()
    }

    /// The first unparented canvas, if any
    pub fn canvas(&self) -> Option<&InstanceId> {
        self.objects
            .values()
            .find(|o| o.parent().is_none() && o.object_type() == DiagramObjectType::Canvas)
            .map(|o| o.instance())
    }

    pub fn object_type(&self, instance: &InstanceId) -> ChartResult<DiagramObjectType> {
        Ok(self.object(instance)?.object_type())
    }

    /// Structural parent of an object
    pub fn parent_of(&self, instance: &InstanceId) -> ChartResult<Option<&InstanceId>> {
        Ok(self.object(instance)?.parent())
    }

    fn expect_kind(
        &self,
        instance: &InstanceId,
        kind: DiagramObjectType,
    ) -> ChartResult<&DiagramObject> {
        let object = self.object(instance)?;
        if object.object_type() != kind {
            return Err(ChartError::unexpected_type(instance.as_str(), kind));
        }
        Ok(object)
    }

    fn data_mut(&mut self, instance: &InstanceId) -> ChartResult<&mut ObjectData> {
        Ok(&mut self.object_mut(instance)?.data)
    }

    fn set_parent(&mut self, child: &InstanceId, parent: Option<&InstanceId>) -> ChartResult<()> {
        self.object_mut(child)?.set_parent(parent.cloned());
        Ok(())
    }

    /// Whether `ancestor` is `instance` or one of its structural parents
    fn is_ancestor(&self, ancestor: &InstanceId, instance: &InstanceId) -> bool {
        let mut current = Some(instance);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.get(id).and_then(|o| o.parent());
        }
        false
    }

    // ========================================================================
    // Containment
    // ========================================================================

    /// Attach `child` to `parent`
    ///
    /// Canvases and groups accept groups, blocks and lines, and re-adding an
    /// existing child moves it to `index`. Anchors link latches and lines
    /// take handles. Anchors are added to blocks with `add_anchor`, and
    /// latches to lines with `set_source`/`set_target`.
    pub fn add_child(
        &mut self,
        parent: &InstanceId,
        child: &InstanceId,
        index: Option<usize>,
    ) -> ChartResult<()> {
        use DiagramObjectType as T;
        let parent_kind = self.object_type(parent)?;
        let child_kind = self.object_type(child)?;
        match (parent_kind, child_kind) {
            (T::Canvas | T::Group, T::Group | T::Block | T::Line) => {
                if self.is_ancestor(child, parent) {
                    return Err(ChartError::invalid_child(parent.as_str(), child.as_str()));
                }
                self.add_object(parent, child, index)
            }
            (T::Anchor, T::Latch) => self.link(parent, child),
            (T::Line, T::Handle) => self.add_handle(parent, child, index),
            _ => Err(ChartError::invalid_child(parent.as_str(), child.as_str())),
        }
    }

    fn add_object(
        &mut self,
        parent: &InstanceId,
        child: &InstanceId,
        index: Option<usize>,
    ) -> ChartResult<()> {
        match self.object(child)?.parent().cloned() {
            Some(current) if &current == parent => {
                self.container_mut(parent)?.retain(|o| o != child);
            }
            Some(current) => {
                return Err(ChartError::already_parented(child.as_str(), current.as_str()));
            }
            None => {}
        }
        let objects = self.container_mut(parent)?;
        let index = index.unwrap_or(objects.len()).min(objects.len());
        objects.insert(index, child.clone());
        self.set_parent(child, Some(parent))
    }

    fn container_mut(&mut self, instance: &InstanceId) -> ChartResult<&mut Vec<InstanceId>> {
        match self.data_mut(instance)? {
            ObjectData::Canvas { objects } | ObjectData::Group { objects } => Ok(objects),
            _ => Err(ChartError::unexpected_type(instance.as_str(), "Group")),
        }
    }

    /// Ordered children of a canvas or group
    pub fn container_objects(&self, instance: &InstanceId) -> ChartResult<&[InstanceId]> {
        match self.object(instance)?.data() {
            ObjectData::Canvas { objects } | ObjectData::Group { objects } => Ok(objects),
            _ => Err(ChartError::unexpected_type(instance.as_str(), "Group")),
        }
    }

    /// Detach `child` from `parent`, returning its former index
    ///
    /// With `detach_descendants`, every anchor/latch link crossing the
    /// boundary of the removed subtree is unlinked. With `cascade`, the
    /// subtree is also dropped from the graph.
    pub fn remove_child(
        &mut self,
        parent: &InstanceId,
        child: &InstanceId,
        detach_descendants: bool,
        cascade: bool,
    ) -> ChartResult<usize> {
        let not_a_child = || ChartError::not_a_child(parent.as_str(), child.as_str());

        // Latches are listed by anchors without being owned by them
        let latch_index = match self.object(parent)?.data() {
            ObjectData::Anchor { latches } => Some(latches.iter().position(|l| l == child)),
            _ => None,
        };
        if let Some(index) = latch_index {
            let index = index.ok_or_else(not_a_child)?;
            self.unlink(child)?;
            return Ok(index);
        }

        if self.object(child)?.parent() != Some(parent) {
            return Err(not_a_child());
        }
        let index = match self.data_mut(parent)? {
            ObjectData::Canvas { objects } | ObjectData::Group { objects } => {
                let index = objects
                    .iter()
                    .position(|o| o == child)
                    .ok_or_else(not_a_child)?;
                objects.remove(index);
                index
            }
            ObjectData::Block { anchors } => {
                let index = anchors
                    .values()
                    .position(|a| a.as_ref() == Some(child))
                    .ok_or_else(not_a_child)?;
                if let Some((_, slot)) = anchors.get_index_mut(index) {
                    *slot = None;
                }
                index
            }
            ObjectData::Line {
                source,
                target,
                handles,
            } => {
                if source.as_ref() == Some(child) {
                    *source = None;
                    0
                } else if target.as_ref() == Some(child) {
                    *target = None;
                    1
                } else {
                    let index = handles
                        .iter()
                        .position(|h| h == child)
                        .ok_or_else(not_a_child)?;
                    handles.remove(index);
                    index
                }
            }
            _ => return Err(not_a_child()),
        };
        self.set_parent(child, None)?;

        if cascade {
            self.drop_subtree(child)?;
        } else if detach_descendants {
            self.detach_subtree(child)?;
        }
        Ok(index)
    }

    /// Move `child` to `index` within its parent's list
    pub fn reorder_child(&mut self, child: &InstanceId, index: usize) -> ChartResult<()> {
        let parent = self
            .object(child)?
            .parent()
            .cloned()
            .ok_or_else(|| ChartError::ObjectHasNoParent(child.to_string()))?;
        let list = match self.data_mut(&parent)? {
            ObjectData::Canvas { objects } | ObjectData::Group { objects } => objects,
            ObjectData::Line { handles, .. } if handles.contains(child) => handles,
            _ => return Err(ChartError::invalid_child(parent.as_str(), child.as_str())),
        };
        if let Some(from) = list.iter().position(|o| o == child) {
            let item = list.remove(from);
            let to = index.min(list.len());
            list.insert(to, item);
        }
        Ok(())
    }

    /// Index of `child` within its parent
    ///
    /// This is the position in the parent's object or handle list, the slot
    /// index for anchors, and 0 or 1 for a line's source and target.
    pub fn index_in_parent(&self, child: &InstanceId) -> ChartResult<usize> {
        let parent = self
            .object(child)?
            .parent()
            .ok_or_else(|| ChartError::ObjectHasNoParent(child.to_string()))?;
        let not_a_child = || ChartError::not_a_child(parent.as_str(), child.as_str());
        match self.object(parent)?.data() {
            ObjectData::Canvas { objects } | ObjectData::Group { objects } => {
                objects.iter().position(|o| o == child).ok_or_else(not_a_child)
            }
            ObjectData::Block { anchors } => anchors
                .values()
                .position(|a| a.as_ref() == Some(child))
                .ok_or_else(not_a_child),
            ObjectData::Line {
                source,
                target,
                handles,
            } => {
                if source.as_ref() == Some(child) {
                    Ok(0)
                } else if target.as_ref() == Some(child) {
                    Ok(1)
                } else {
                    handles.iter().position(|h| h == child).ok_or_else(not_a_child)
                }
            }
            _ => Err(not_a_child()),
        }
    }

    // ========================================================================
    // Blocks and Anchors
    // ========================================================================

    /// Place `anchor` in one of the block's declared positions
    ///
    /// A position emptied by [`DiagramGraph::remove_child`] can be filled
    /// again. Positions themselves are fixed by the block's template.
    pub fn add_anchor(
        &mut self,
        block: &InstanceId,
        position: &str,
        anchor: &InstanceId,
    ) -> ChartResult<()> {
        self.expect_kind(block, DiagramObjectType::Block)?;
        let anchor_object = self.expect_kind(anchor, DiagramObjectType::Anchor)?;
        if let Some(parent) = anchor_object.parent() {
            return Err(ChartError::already_parented(anchor.as_str(), parent.as_str()));
        }
        let ObjectData::Block { anchors } = self.data_mut(block)? else {
            return Err(ChartError::unexpected_type(block.as_str(), DiagramObjectType::Block));
        };
        match anchors.get_mut(position) {
            None => {
                return Err(ChartError::NoSuchSlot {
                    block: block.to_string(),
                    position: position.to_string(),
                });
            }
            Some(Some(current)) => {
                return Err(ChartError::SlotOccupied {
                    current: current.to_string(),
                    position: position.to_string(),
                });
            }
            Some(slot) => *slot = Some(anchor.clone()),
        }
        self.set_parent(anchor, Some(block))
    }

    /// Declared anchor positions of a block and the anchors placed in them
    pub fn anchors(&self, block: &InstanceId) -> ChartResult<&IndexMap<String, Option<InstanceId>>> {
        match self.object(block)?.data() {
            ObjectData::Block { anchors } => Ok(anchors),
            _ => Err(ChartError::unexpected_type(block.as_str(), DiagramObjectType::Block)),
        }
    }

    /// The anchor at `position`, if the block has one there
    pub fn anchor_at(&self, block: &InstanceId, position: &str) -> ChartResult<Option<&InstanceId>> {
        Ok(self.anchors(block)?.get(position).and_then(Option::as_ref))
    }

    /// Latches attached to an anchor, in attachment order
    pub fn latches(&self, anchor: &InstanceId) -> ChartResult<&[InstanceId]> {
        match self.object(anchor)?.data() {
            ObjectData::Anchor { latches } => Ok(latches),
            _ => Err(ChartError::unexpected_type(anchor.as_str(), DiagramObjectType::Anchor)),
        }
    }

    /// Attach `latch` to `anchor`, detaching it from its previous anchor
    pub fn link(&mut self, anchor: &InstanceId, latch: &InstanceId) -> ChartResult<()> {
        self.expect_kind(anchor, DiagramObjectType::Anchor)?;
        if self.anchor_of(latch)? == Some(anchor) {
            return Ok(());
        }
        self.unlink(latch)?;
        if let ObjectData::Anchor { latches } = self.data_mut(anchor)? {
            latches.push(latch.clone());
        }
        if let ObjectData::Latch { anchor: slot } = self.data_mut(latch)? {
            *slot = Some(anchor.clone());
        }
        Ok(())
    }

    /// Detach `latch` from its anchor, returning the anchor it was attached to
    pub fn unlink(&mut self, latch: &InstanceId) -> ChartResult<Option<InstanceId>> {
        let previous = match self.data_mut(latch)? {
            ObjectData::Latch { anchor } => anchor.take(),
            _ => {
                return Err(ChartError::unexpected_type(latch.as_str(), DiagramObjectType::Latch));
            }
        };
        if let Some(anchor) = &previous {
            if let Some(ObjectData::Anchor { latches }) =
                self.objects.get_mut(anchor).map(|o| &mut o.data)
            {
                latches.retain(|l| l != latch);
            }
        }
        Ok(previous)
    }

    /// The anchor a latch is attached to
    pub fn anchor_of(&self, latch: &InstanceId) -> ChartResult<Option<&InstanceId>> {
        match self.object(latch)?.data() {
            ObjectData::Latch { anchor } => Ok(anchor.as_ref()),
            _ => Err(ChartError::unexpected_type(latch.as_str(), DiagramObjectType::Latch)),
        }
    }

    pub fn is_attached(&self, latch: &InstanceId) -> ChartResult<bool> {
        Ok(self.anchor_of(latch)?.is_some())
    }

    /// Whether the latch is attached, to `anchor` when given or to any anchor
    pub fn is_linked(&self, latch: &InstanceId, anchor: Option<&InstanceId>) -> ChartResult<bool> {
        let current = self.anchor_of(latch)?;
        Ok(match anchor {
            Some(anchor) => current == Some(anchor),
            None => current.is_some(),
        })
    }

    // ========================================================================
    // Lines
    // ========================================================================

    fn line_parts(
        &self,
        line: &InstanceId,
    ) -> ChartResult<(Option<&InstanceId>, Option<&InstanceId>, &[InstanceId])> {
        match self.object(line)?.data() {
            ObjectData::Line {
                source,
                target,
                handles,
            } => Ok((source.as_ref(), target.as_ref(), handles)),
            _ => Err(ChartError::unexpected_type(line.as_str(), DiagramObjectType::Line)),
        }
    }

    fn endpoint(&self, line: &InstanceId, endpoint: Endpoint) -> ChartResult<Option<&InstanceId>> {
        let (source, target, _) = self.line_parts(line)?;
        Ok(match endpoint {
            Endpoint::Source => source,
            Endpoint::Target => target,
        })
    }

    fn set_endpoint(
        &mut self,
        line: &InstanceId,
        latch: Option<&InstanceId>,
        endpoint: Endpoint,
    ) -> ChartResult<Option<InstanceId>> {
        let current = self.endpoint(line, endpoint)?.cloned();
        if let Some(latch) = latch {
            let latch_object = self.expect_kind(latch, DiagramObjectType::Latch)?;
            if current.as_ref() == Some(latch) {
                return Ok(None);
            }
            if let Some(parent) = latch_object.parent() {
                return Err(ChartError::already_parented(latch.as_str(), parent.as_str()));
            }
        }
        if let ObjectData::Line { source, target, .. } = self.data_mut(line)? {
            let slot = match endpoint {
                Endpoint::Source => source,
                Endpoint::Target => target,
            };
            *slot = latch.cloned();
        }
        if let Some(previous) = &current {
            self.set_parent(previous, None)?;
        }
        if let Some(latch) = latch {
            self.set_parent(latch, Some(line))?;
        }
        Ok(current)
    }

    /// Replace the line's source latch, returning the previous one
    ///
    /// The previous latch keeps its anchor link; unlinking it is left to
    /// the caller.
    pub fn set_source(
        &mut self,
        line: &InstanceId,
        latch: Option<&InstanceId>,
    ) -> ChartResult<Option<InstanceId>> {
        self.set_endpoint(line, latch, Endpoint::Source)
    }

    /// Replace the line's target latch, returning the previous one
    pub fn set_target(
        &mut self,
        line: &InstanceId,
        latch: Option<&InstanceId>,
    ) -> ChartResult<Option<InstanceId>> {
        self.set_endpoint(line, latch, Endpoint::Target)
    }

    /// The line's source latch, failing when none is assigned
    pub fn source(&self, line: &InstanceId) -> ChartResult<&InstanceId> {
        self.endpoint(line, Endpoint::Source)?
            .ok_or(ChartError::NoLatchAssigned(Endpoint::Source.name()))
    }

    /// The line's target latch, failing when none is assigned
    pub fn target(&self, line: &InstanceId) -> ChartResult<&InstanceId> {
        self.endpoint(line, Endpoint::Target)?
            .ok_or(ChartError::NoLatchAssigned(Endpoint::Target.name()))
    }

    pub fn raw_source_latch(&self, line: &InstanceId) -> ChartResult<Option<&InstanceId>> {
        self.endpoint(line, Endpoint::Source)
    }

    pub fn raw_target_latch(&self, line: &InstanceId) -> ChartResult<Option<&InstanceId>> {
        self.endpoint(line, Endpoint::Target)
    }

    fn endpoint_object(&self, line: &InstanceId, endpoint: Endpoint) -> ChartResult<Option<&InstanceId>> {
        let Some(latch) = self.endpoint(line, endpoint)? else {
            return Ok(None);
        };
        let Some(anchor) = self.anchor_of(latch)? else {
            return Ok(None);
        };
        Ok(self.object(anchor)?.parent())
    }

    /// The object the source latch is attached to through an anchor
    pub fn source_object(&self, line: &InstanceId) -> ChartResult<Option<&InstanceId>> {
        self.endpoint_object(line, Endpoint::Source)
    }

    /// The object the target latch is attached to through an anchor
    pub fn target_object(&self, line: &InstanceId) -> ChartResult<Option<&InstanceId>> {
        self.endpoint_object(line, Endpoint::Target)
    }

    /// Handles of a line, in order
    pub fn handles(&self, line: &InstanceId) -> ChartResult<&[InstanceId]> {
        Ok(self.line_parts(line)?.2)
    }

    /// Insert a handle at `index`, or append it
    pub fn add_handle(
        &mut self,
        line: &InstanceId,
        handle: &InstanceId,
        index: Option<usize>,
    ) -> ChartResult<()> {
        self.expect_kind(line, DiagramObjectType::Line)?;
        let handle_object = self.expect_kind(handle, DiagramObjectType::Handle)?;
        match handle_object.parent().cloned() {
            Some(current) if &current == line => {
                self.handles_mut(line)?.retain(|h| h != handle);
            }
            Some(current) => {
                return Err(ChartError::already_parented(handle.as_str(), current.as_str()));
            }
            None => {}
        }
        let handles = self.handles_mut(line)?;
        let index = index.unwrap_or(handles.len()).min(handles.len());
        handles.insert(index, handle.clone());
        self.set_parent(handle, Some(line))
    }

    /// Remove a handle, returning its former index
    pub fn delete_handle(&mut self, line: &InstanceId, handle: &InstanceId) -> ChartResult<usize> {
        let handles = self.handles_mut(line)?;
        let index = handles
            .iter()
            .position(|h| h == handle)
            .ok_or_else(|| ChartError::not_a_child(line.as_str(), handle.as_str()))?;
        handles.remove(index);
        self.set_parent(handle, None)?;
        Ok(index)
    }

    /// Remove every handle from `from` onward, returning them
    pub fn drop_handles(&mut self, line: &InstanceId, from: usize) -> ChartResult<Vec<InstanceId>> {
        let handles = self.handles_mut(line)?;
        let from = from.min(handles.len());
        let dropped = handles.split_off(from);
        for handle in &dropped {
            self.set_parent(handle, None)?;
        }
        Ok(dropped)
    }

    fn handles_mut(&mut self, line: &InstanceId) -> ChartResult<&mut Vec<InstanceId>> {
        match self.data_mut(line)? {
            ObjectData::Line { handles, .. } => Ok(handles),
            _ => Err(ChartError::unexpected_type(line.as_str(), DiagramObjectType::Line)),
        }
    }

    // ========================================================================
    // Semantic Roles
    // ========================================================================

    /// Whether the object exists and carries any of the bits in `role`
    pub fn has_role(&self, instance: &InstanceId, role: SemanticRole) -> bool {
        self.get(instance).is_some_and(|o| o.has_role(role))
    }

    pub fn semantic_role(&self, instance: &InstanceId) -> ChartResult<SemanticRole> {
        Ok(self.object(instance)?.semantic_role())
    }

    pub fn set_role(
        &mut self,
        instance: &InstanceId,
        mask: SemanticRole,
        role: SemanticRole,
    ) -> ChartResult<()> {
        self.object_mut(instance)?.set_role(mask, role);
        Ok(())
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Lazy depth-first walk over an object and its structural descendants
    ///
    /// Latches attached to an anchor are not part of the anchor's subtree.
    pub fn subtree(&self, instance: &InstanceId) -> Subtree<'_> {
        Subtree {
            graph: self,
            stack: vec![instance.clone()],
            visited: HashSet::new(),
        }
    }

    /// `subtree` restricted to the objects matching `predicate`
    pub fn subtree_matching<'a, P>(
        &'a self,
        instance: &InstanceId,
        predicate: P,
    ) -> impl Iterator<Item = &'a DiagramObject> + use<'a, P>
    where
        P: Fn(&DiagramObject) -> bool + 'a,
    {
        self.subtree(instance).filter(move |o| predicate(o))
    }

    /// Move an object and its structural descendants by an offset
    pub fn move_by(&mut self, instance: &InstanceId, dx: f32, dy: f32) -> ChartResult<()> {
        self.object(instance)?;
        let ids: Vec<InstanceId> = self.subtree(instance).map(|o| o.instance().clone()).collect();
        for id in &ids {
            self.object_mut(id)?.translate(dx, dy);
        }
        Ok(())
    }

    /// Move an object to a position, carrying its descendants along
    pub fn move_to(&mut self, instance: &InstanceId, x: f32, y: f32) -> ChartResult<()> {
        let delta = Position::new(x, y) - self.object(instance)?.position();
        self.move_by(instance, delta.x, delta.y)
    }

    // ========================================================================
    // Cloning and Removal
    // ========================================================================

    /// Copy an object and its structural descendants under fresh instances
    ///
    /// Descendants rejected by `predicate` are left out together with their
    /// own subtrees. Anchor/latch links inside the copied set are recreated
    /// between the copies; links to objects outside it are not. The copy is
    /// attached to `parent` when one is given. Returns the copy's instance and
    /// the old-to-new instance map.
    pub fn clone_object(
        &mut self,
        instance: &InstanceId,
        parent: Option<&InstanceId>,
        predicate: Option<&dyn Fn(&DiagramObject) -> bool>,
    ) -> ChartResult<(InstanceId, HashMap<InstanceId, InstanceId>)> {
        self.object(instance)?;

        let mut included = Vec::new();
        let mut stack = vec![instance.clone()];
        while let Some(id) = stack.pop() {
            let object = self.object(&id)?;
            for child in object.structural_children().into_iter().rev() {
                let keep = match (predicate, self.get(&child)) {
                    (Some(pred), Some(c)) => pred(c),
                    (None, Some(_)) => true,
                    (_, None) => false,
                };
                if keep {
                    stack.push(child);
                }
            }
            included.push(id);
        }

        let map: HashMap<InstanceId, InstanceId> = included
            .iter()
            .map(|id| (id.clone(), InstanceId::generate()))
            .collect();

        for id in &included {
            let object = self.object(id)?;
            let data = remap_data(object.data(), &map);
            let mut copy = object.duplicate(map[id].clone(), data);
            if id != instance {
                copy.set_parent(object.parent().and_then(|p| map.get(p)).cloned());
            }
            self.insert(copy)?;
        }

        let root = map[instance].clone();
        if let Some(parent) = parent {
            self.add_child(parent, &root, None)?;
        }
        Ok((root, map))
    }

    /// Unlink every anchor/latch link crossing the boundary of a subtree
    pub fn detach_subtree(&mut self, instance: &InstanceId) -> ChartResult<()> {
        let members: HashSet<InstanceId> =
            self.subtree(instance).map(|o| o.instance().clone()).collect();
        let mut crossing = Vec::new();
        for id in &members {
            match self.object(id)?.data() {
                ObjectData::Anchor { latches } => crossing.extend(
                    latches.iter().filter(|l| !members.contains(*l)).cloned(),
                ),
                ObjectData::Latch { anchor: Some(anchor) } if !members.contains(anchor) => {
                    crossing.push(id.clone());
                }
                _ => {}
            }
        }
        for latch in &crossing {
            self.unlink(latch)?;
        }
        Ok(())
    }

    /// Detach a subtree and remove its objects from the graph
    fn drop_subtree(&mut self, instance: &InstanceId) -> ChartResult<()> {
        self.detach_subtree(instance)?;
        let members: Vec<InstanceId> =
            self.subtree(instance).map(|o| o.instance().clone()).collect();
        for id in &members {
            self.objects.shift_remove(id);
        }
        tracing::debug!("Dropped {} objects under '{}'", members.len(), instance);
        Ok(())
    }

    /// Remove freshly created objects that were never attached elsewhere
    pub(crate) fn discard(&mut self, instances: &[InstanceId]) {
        for id in instances {
            self.objects.shift_remove(id);
        }
        tracing::debug!("Discarded {} unfinished objects", instances.len());
    }
}

/// Rewrite relations through an instance map, dropping those outside it
fn remap_data(data: &ObjectData, map: &HashMap<InstanceId, InstanceId>) -> ObjectData {
    let one = |id: &Option<InstanceId>| id.as_ref().and_then(|i| map.get(i)).cloned();
    let many = |ids: &[InstanceId]| ids.iter().filter_map(|i| map.get(i)).cloned().collect();
    match data {
        ObjectData::Canvas { objects } => ObjectData::Canvas {
            objects: many(objects),
        },
        ObjectData::Group { objects } => ObjectData::Group {
            objects: many(objects),
        },
        ObjectData::Block { anchors } => ObjectData::Block {
            anchors: anchors
                .iter()
                .map(|(position, anchor)| (position.clone(), one(anchor)))
                .collect(),
        },
        ObjectData::Anchor { latches } => ObjectData::Anchor {
            latches: many(latches),
        },
        ObjectData::Latch { anchor } => ObjectData::Latch {
            anchor: one(anchor),
        },
        ObjectData::Line {
            source,
            target,
            handles,
        } => ObjectData::Line {
            source: one(source),
            target: one(target),
            handles: many(handles),
        },
        ObjectData::Handle => ObjectData::Handle,
    }
}

// ============================================================================
// Subtree
// ============================================================================

/// Depth-first iterator over a structural subtree
pub struct Subtree<'a> {
    graph: &'a DiagramGraph,
    stack: Vec<InstanceId>,
    visited: HashSet<InstanceId>,
}

impl<'a> Iterator for Subtree<'a> {
    type Item = &'a DiagramObject;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            if !self.visited.insert(id.clone()) {
                continue;
            }
            let Some(object) = self.graph.get(&id) else {
                continue;
            };
            for child in object.structural_children().into_iter().rev() {
                if !self.visited.contains(&child) {
                    self.stack.push(child);
                }
            }
            return Some(object);
        }
        None
    }
}

// ============================================================================
// Tests
// ============================================================================
