//! Semantic analysis
//!
//! Reads the structural graph as a directed graph of nodes and edges. Blocks
//! and groups become nodes and lines become edges; a line's direction comes
//! from which of its latches is attached to a block's anchor.
//!
//! Role-driven links (`next_links` / `prev_links`) follow the semantic role
//! bits of templates instead of object kinds, so a schema can mark which
//! latches lead out of and into an object.

use crate::diagram::DiagramGraph;
use crate::object::DiagramObject;
use crate::property::RootProperty;
use indexmap::{IndexMap, IndexSet};
use openchart_core::{ChartResult, DiagramObjectType, InstanceId, SemanticRole};
use tracing::debug;

/// Traversal direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Source to target
    Next,
    /// Target to source
    Prev,
}

// ============================================================================
// Semantic Graph
// ============================================================================

/// A block or group seen as a graph node
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticNode {
    /// Template name
    pub id: String,
    pub instance: InstanceId,
    pub properties: RootProperty,
    /// Outgoing edges per anchor position
    pub next: IndexMap<String, Vec<InstanceId>>,
    /// Incoming edges per anchor position
    pub prev: IndexMap<String, Vec<InstanceId>>,
}

impl SemanticNode {
    fn new(object: &DiagramObject) -> Self {
        Self {
            id: object.id().to_string(),
            instance: object.instance().clone(),
            properties: object.properties().clone(),
            next: IndexMap::new(),
            prev: IndexMap::new(),
        }
    }

    pub fn next_edges(&self) -> impl Iterator<Item = &InstanceId> {
        self.next.values().flatten()
    }

    pub fn prev_edges(&self) -> impl Iterator<Item = &InstanceId> {
        self.prev.values().flatten()
    }
}

/// A line seen as a graph edge
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticEdge {
    /// Template name
    pub id: String,
    pub instance: InstanceId,
    pub properties: RootProperty,
    source: Option<InstanceId>,
    source_via: Option<String>,
    target: Option<InstanceId>,
    target_via: Option<String>,
}

impl SemanticEdge {
    fn new(object: &DiagramObject) -> Self {
        Self {
            id: object.id().to_string(),
            instance: object.instance().clone(),
            properties: object.properties().clone(),
            source: None,
            source_via: None,
            target: None,
            target_via: None,
        }
    }

    /// Node the edge leaves from
    pub fn source(&self) -> Option<&InstanceId> {
        self.source.as_ref()
    }

    /// Anchor position the edge leaves through
    pub fn source_via(&self) -> Option<&str> {
        self.source_via.as_deref()
    }

    /// Node the edge arrives at
    pub fn target(&self) -> Option<&InstanceId> {
        self.target.as_ref()
    }

    /// Anchor position the edge arrives through
    pub fn target_via(&self) -> Option<&str> {
        self.target_via.as_deref()
    }
}

/// Directed view of a diagram
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SemanticGraph {
    nodes: IndexMap<InstanceId, SemanticNode>,
    edges: IndexMap<InstanceId, SemanticEdge>,
}

impl SemanticGraph {
    pub fn nodes(&self) -> impl Iterator<Item = &SemanticNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &SemanticEdge> {
        self.edges.values()
    }

    pub fn node(&self, instance: &InstanceId) -> Option<&SemanticNode> {
        self.nodes.get(instance)
    }

    pub fn edge(&self, instance: &InstanceId) -> Option<&SemanticEdge> {
        self.edges.get(instance)
    }

    /// Edges leaving `node`
    pub fn next_edges(&self, node: &InstanceId) -> Vec<&SemanticEdge> {
        self.nodes
            .get(node)
            .into_iter()
            .flat_map(SemanticNode::next_edges)
            .filter_map(|e| self.edges.get(e))
            .collect()
    }

    /// Edges arriving at `node`
    pub fn prev_edges(&self, node: &InstanceId) -> Vec<&SemanticEdge> {
        self.nodes
            .get(node)
            .into_iter()
            .flat_map(SemanticNode::prev_edges)
            .filter_map(|e| self.edges.get(e))
            .collect()
    }

    /// Targets of the edges leaving `node`
    pub fn next_nodes(&self, node: &InstanceId) -> Vec<&SemanticNode> {
        self.next_edges(node)
            .into_iter()
            .filter_map(|e| e.target())
            .filter_map(|n| self.nodes.get(n))
            .collect()
    }

    /// Sources of the edges arriving at `node`
    pub fn prev_nodes(&self, node: &InstanceId) -> Vec<&SemanticNode> {
        self.prev_edges(node)
            .into_iter()
            .filter_map(|e| e.source())
            .filter_map(|n| self.nodes.get(n))
            .collect()
    }
}

// ============================================================================
// Semantic Analyzer
// ============================================================================

/// Builds semantic views of a diagram
pub struct SemanticAnalyzer;

impl SemanticAnalyzer {
    /// Build the node/edge graph of everything below `canvas`
    pub fn to_graph(graph: &DiagramGraph, canvas: &InstanceId) -> ChartResult<SemanticGraph> {
        graph.object(canvas)?;
        let mut semantic = SemanticGraph::default();
        let descendants = graph.subtree(canvas).filter(|o| o.instance() != canvas);
        for object in descendants {
            match object.object_type() {
                DiagramObjectType::Block | DiagramObjectType::Group => {
                    semantic
                        .nodes
                        .insert(object.instance().clone(), SemanticNode::new(object));
                }
                DiagramObjectType::Line => {
                    semantic
                        .edges
                        .insert(object.instance().clone(), SemanticEdge::new(object));
                }
                _ => {}
            }
        }

        let blocks = graph
            .subtree_matching(canvas, |o| o.object_type() == DiagramObjectType::Block)
            .map(|o| o.instance().clone());
        for block in blocks {
            for (position, anchor) in graph.anchors(&block)? {
                let Some(anchor) = anchor else { continue };
                for latch in graph.latches(anchor)? {
                    let Some(line) = graph.parent_of(latch)? else {
                        continue;
                    };
                    let Some(edge) = semantic.edges.get_mut(line) else {
                        continue;
                    };
                    let source = graph.raw_source_latch(line)?;
                    let target = graph.raw_target_latch(line)?;
                    let attached = |latch: Option<&InstanceId>| {
                        latch.is_some_and(|l| matches!(graph.anchor_of(l), Ok(Some(a)) if a == anchor))
                    };
                    let Some(node) = semantic.nodes.get_mut(&block) else {
                        continue;
                    };
                    if attached(source) {
                        node.next.entry(position.clone()).or_default().push(line.clone());
                        edge.source = Some(block.clone());
                        edge.source_via = Some(position.clone());
                    }
                    if attached(target) {
                        node.prev.entry(position.clone()).or_default().push(line.clone());
                        edge.target = Some(block.clone());
                        edge.target_via = Some(position.clone());
                    }
                }
            }
        }
        debug!(
            "Semantic graph has {} nodes and {} edges",
            semantic.nodes.len(),
            semantic.edges.len()
        );
        Ok(semantic)
    }

    /// Blocks one line away, downstream of `object`
    ///
    /// `object` may be a block or a line; anything else has no adjacency.
    pub fn child_blocks(graph: &DiagramGraph, object: &InstanceId) -> Vec<InstanceId> {
        Self::adjacent_blocks(graph, object, Direction::Next)
    }

    /// Blocks one line away, upstream of `object`
    pub fn parent_blocks(graph: &DiagramGraph, object: &InstanceId) -> Vec<InstanceId> {
        Self::adjacent_blocks(graph, object, Direction::Prev)
    }

    fn adjacent_blocks(
        graph: &DiagramGraph,
        object: &InstanceId,
        direction: Direction,
    ) -> Vec<InstanceId> {
        let near = |line: &InstanceId| match direction {
            Direction::Next => graph.raw_source_latch(line).ok().flatten(),
            Direction::Prev => graph.raw_target_latch(line).ok().flatten(),
        };
        let far = |line: &InstanceId| match direction {
            Direction::Next => graph.raw_target_latch(line).ok().flatten(),
            Direction::Prev => graph.raw_source_latch(line).ok().flatten(),
        };

        let lines: Vec<InstanceId> = match graph.object_type(object) {
            Ok(DiagramObjectType::Block) => graph
                .anchors(object)
                .into_iter()
                .flat_map(|anchors| anchors.values().flatten())
                .flat_map(|anchor| graph.latches(anchor).unwrap_or_default())
                .filter_map(|latch| {
                    let line = graph.parent_of(latch).ok().flatten()?;
                    (near(line) == Some(latch)).then(|| line.clone())
                })
                .collect(),
            Ok(DiagramObjectType::Line) => vec![object.clone()],
            _ => return Vec::new(),
        };

        let mut blocks = IndexSet::new();
        for line in &lines {
            let block = far(line)
                .and_then(|latch| graph.anchor_of(latch).ok().flatten())
                .and_then(|anchor| graph.parent_of(anchor).ok().flatten());
            if let Some(block) = block {
                if matches!(graph.object_type(block), Ok(DiagramObjectType::Block)) {
                    blocks.insert(block.clone());
                }
            }
        }
        blocks.into_iter().collect()
    }

    // ========================================================================
    // Role-driven Links
    // ========================================================================

    /// Node and edge objects reached downstream, keyed by anchor template
    pub fn next_links(graph: &DiagramGraph, object: &InstanceId) -> IndexMap<String, Vec<InstanceId>> {
        Self::links(graph, object, Direction::Next)
    }

    /// Node and edge objects reached upstream, keyed by anchor template
    pub fn prev_links(graph: &DiagramGraph, object: &InstanceId) -> IndexMap<String, Vec<InstanceId>> {
        Self::links(graph, object, Direction::Prev)
    }

    /// Walk from a node or edge object through its anchors and latches
    ///
    /// Nested node and edge objects are not entered. Latches whose anchor
    /// is unknown are keyed by `"undefined"`.
    pub fn links(
        graph: &DiagramGraph,
        object: &InstanceId,
        direction: Direction,
    ) -> IndexMap<String, Vec<InstanceId>> {
        let mut links: IndexMap<String, Vec<InstanceId>> = IndexMap::new();
        let node_or_edge = SemanticRole::NODE | SemanticRole::EDGE;
        let Some(root) = graph.get(object).filter(|o| o.has_role(node_or_edge)) else {
            return links;
        };

        let mut stack: Vec<InstanceId> = root.children().into_iter().rev().collect();
        while let Some(current) = stack.pop() {
            let Some(obj) = graph.get(&current) else {
                continue;
            };
            match obj.object_type() {
                DiagramObjectType::Anchor => {
                    for latch in graph.latches(&current).unwrap_or_default() {
                        if let Some(found) = Self::traverse_latch(graph, latch, &current, direction) {
                            links.entry(obj.id().to_string()).or_default().push(found);
                        }
                    }
                }
                DiagramObjectType::Latch => {
                    let anchor = graph.anchor_of(&current).ok().flatten();
                    let via = anchor
                        .and_then(|a| graph.get(a))
                        .map_or_else(|| "undefined".to_string(), |a| a.id().to_string());
                    let found = obj
                        .parent()
                        .and_then(|line| Self::traverse_latch(graph, &current, line, direction));
                    if let Some(found) = found {
                        links.entry(via).or_default().push(found);
                    }
                }
                _ if obj.has_role(node_or_edge) => {}
                _ => stack.extend(obj.children().into_iter().rev()),
            }
        }
        links
    }

    /// Follow a latch away from `from` and climb to the nearest node or edge
    fn traverse_latch(
        graph: &DiagramGraph,
        latch: &InstanceId,
        from: &InstanceId,
        direction: Direction,
    ) -> Option<InstanceId> {
        let (outward, inward) = match direction {
            Direction::Next => (SemanticRole::LINK_SOURCE, SemanticRole::LINK_TARGET),
            Direction::Prev => (SemanticRole::LINK_TARGET, SemanticRole::LINK_SOURCE),
        };
        let object = graph.get(latch)?;
        let anchor = graph.anchor_of(latch).ok().flatten();
        let mut next = None;
        if anchor == Some(from) && object.has_role(outward) {
            next = object.parent();
        }
        if object.parent() == Some(from) && object.has_role(inward) {
            next = anchor;
        }
        while let Some(current) = next {
            let current = graph.get(current)?;
            if current.has_role(SemanticRole::NODE | SemanticRole::EDGE) {
                return Some(current.instance().clone());
            }
            next = current.parent();
        }
        None
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
    use crate::template::{DiagramSchema, Template};
    use pretty_assertions::assert_eq;

    struct Flow {
        graph: DiagramGraph,
        canvas: InstanceId,
        a: InstanceId,
        b: InstanceId,
        line: InstanceId,
    }

    /// A's right anchor holds the line's source, B's left anchor its target
    fn connect(factory: &DiagramObjectFactory, line_template: &str) -> Flow {
        let mut graph = DiagramGraph::new();
        let canvas = factory
            .create_new_object(&mut graph, factory.canvas_template().name.as_str(), None)
            .unwrap();
        let a = factory.create_new_object(&mut graph, "generic_block", None).unwrap();
        let b = factory.create_new_object(&mut graph, "generic_block", None).unwrap();
        let line = factory.create_new_object(&mut graph, line_template, None).unwrap();
        for object in [&a, &b, &line] {
            graph.add_child(&canvas, object, None).unwrap();
        }
        let right = graph.anchor_at(&a, "right").unwrap().unwrap().clone();
        let left = graph.anchor_at(&b, "left").unwrap().unwrap().clone();
        let source = graph.source(&line).unwrap().clone();
        let target = graph.target(&line).unwrap().clone();
        graph.link(&right, &source).unwrap();
        graph.link(&left, &target).unwrap();
        Flow {
            graph,
            canvas,
            a,
            b,
            line,
        }
    }

    fn role_factory() -> DiagramObjectFactory {
        let schema = DiagramSchema::new("roles", Template::new("canvas", DiagramObjectType::Canvas))
            .with_template(
                Template::new("generic_block", DiagramObjectType::Block)
                    .with_role(SemanticRole::NODE)
                    .with_anchor("left", "port")
                    .with_anchor("right", "port"),
            )
            .with_template(Template::new("port", DiagramObjectType::Anchor))
            .with_template(
                Template::new("arrow", DiagramObjectType::Line)
                    .with_role(SemanticRole::EDGE)
                    .with_latches("tail", "head"),
            )
            .with_template(
                Template::new("tail", DiagramObjectType::Latch).with_role(SemanticRole::LINK_SOURCE),
            )
            .with_template(
                Template::new("head", DiagramObjectType::Latch).with_role(SemanticRole::LINK_TARGET),
            );
        DiagramObjectFactory::new(schema)
    }

    #[test]
    fn test_semantic_direction() {
        let factory = sample_factory();
        let flow = connect(&factory, "dynamic_line");
        let semantic = SemanticAnalyzer::to_graph(&flow.graph, &flow.canvas).unwrap();

        assert_eq!(semantic.nodes().count(), 2);
        assert_eq!(semantic.edges().count(), 1);
        assert!(semantic.node(&flow.canvas).is_none());

        let a = semantic.node(&flow.a).unwrap();
        assert_eq!(a.next["right"], vec![flow.line.clone()]);
        assert!(a.prev.is_empty());

        let edge = semantic.edge(&flow.line).unwrap();
        assert_eq!(edge.source(), Some(&flow.a));
        assert_eq!(edge.source_via(), Some("right"));
        assert_eq!(edge.target(), Some(&flow.b));
        assert_eq!(edge.target_via(), Some("left"));

        let b = semantic.node(&flow.b).unwrap();
        assert_eq!(b.prev["left"], vec![flow.line.clone()]);
        let next: Vec<&InstanceId> = semantic.next_nodes(&flow.a).iter().map(|n| &n.instance).collect();
        assert_eq!(next, vec![&flow.b]);
        let prev: Vec<&InstanceId> = semantic.prev_nodes(&flow.b).iter().map(|n| &n.instance).collect();
        assert_eq!(prev, vec![&flow.a]);
        assert!(semantic.prev_nodes(&flow.a).is_empty());
    }

    #[test]
    fn test_unattached_line_has_no_endpoints() {
        let factory = sample_factory();
        let mut flow = connect(&factory, "dynamic_line");
        let target = flow.graph.target(&flow.line).unwrap().clone();
        flow.graph.unlink(&target).unwrap();

        let semantic = SemanticAnalyzer::to_graph(&flow.graph, &flow.canvas).unwrap();
        let edge = semantic.edge(&flow.line).unwrap();
        assert_eq!(edge.source(), Some(&flow.a));
        assert_eq!(edge.target(), None);
        assert!(semantic.next_nodes(&flow.a).is_empty());
    }

    #[test]
    fn test_child_and_parent_blocks() {
        let factory = sample_factory();
        let flow = connect(&factory, "dynamic_line");
        let g = &flow.graph;

        assert_eq!(SemanticAnalyzer::child_blocks(g, &flow.a), vec![flow.b.clone()]);
        assert!(SemanticAnalyzer::parent_blocks(g, &flow.a).is_empty());
        assert_eq!(SemanticAnalyzer::parent_blocks(g, &flow.b), vec![flow.a.clone()]);
        assert_eq!(SemanticAnalyzer::child_blocks(g, &flow.line), vec![flow.b.clone()]);
        assert_eq!(SemanticAnalyzer::parent_blocks(g, &flow.line), vec![flow.a.clone()]);
        assert!(SemanticAnalyzer::child_blocks(g, &flow.canvas).is_empty());
        assert!(SemanticAnalyzer::child_blocks(g, &InstanceId::from("missing")).is_empty());
    }

    #[test]
    fn test_role_driven_links() {
        let factory = role_factory();
        let flow = connect(&factory, "arrow");
        let g = &flow.graph;

        let next = SemanticAnalyzer::next_links(g, &flow.a);
        assert_eq!(next.len(), 1);
        assert_eq!(next["port"], vec![flow.line.clone()]);
        assert!(SemanticAnalyzer::prev_links(g, &flow.a).is_empty());

        let from_line = SemanticAnalyzer::next_links(g, &flow.line);
        assert_eq!(from_line["port"], vec![flow.b.clone()]);
        let back = SemanticAnalyzer::prev_links(g, &flow.line);
        assert_eq!(back["port"], vec![flow.a.clone()]);

        assert_eq!(SemanticAnalyzer::prev_links(g, &flow.b)["port"], vec![flow.line.clone()]);
        assert!(SemanticAnalyzer::next_links(g, &flow.canvas).is_empty());
    }

    #[test]
    fn test_role_links_for_detached_latch() {
        let factory = role_factory();
        let mut flow = connect(&factory, "arrow");
        let target = flow.graph.target(&flow.line).unwrap().clone();
        flow.graph.unlink(&target).unwrap();

        let next = SemanticAnalyzer::next_links(&flow.graph, &flow.line);
        assert!(next.is_empty());
        let prev = SemanticAnalyzer::prev_links(&flow.graph, &flow.line);
        assert_eq!(prev.keys().collect::<Vec<_>>(), vec!["port"]);
    }
}
