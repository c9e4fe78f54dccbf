//! Diagram files
//!
//! A `DiagramFile` is one canvas and everything under it, bound to the
//! factory of the schema it was made with.

use crate::diagram::DiagramGraph;
use crate::factory::DiagramObjectFactory;
use crate::semantic::{SemanticAnalyzer, SemanticGraph};
use crate::serializer::{DiagramObjectExport, export_objects, import_objects};
use openchart_core::{ChartError, ChartResult, DiagramObjectType, InstanceId, Persistable};
use serde::{Deserialize, Serialize};
use tracing::info;

/// On-disk form of a diagram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramModelExport {
    /// Identifier of the schema the diagram was made with
    pub schema: String,
    pub objects: Vec<DiagramObjectExport>,
}

impl Persistable for DiagramModelExport {
    fn file_extension() -> &'static str {
        "ocd"
    }
}

/// A canvas and its objects
#[derive(Debug)]
pub struct DiagramFile<'f> {
    factory: &'f DiagramObjectFactory,
    graph: DiagramGraph,
    canvas: InstanceId,
}

impl<'f> DiagramFile<'f> {
    /// Create an empty diagram from the factory's canvas template
    pub fn new(factory: &'f DiagramObjectFactory) -> ChartResult<Self> {
        let mut graph = DiagramGraph::new();
        let canvas = factory.create_new_from_template(
            &mut graph,
            factory.canvas_template(),
            Some(DiagramObjectType::Canvas),
        )?;
        info!("Created new diagram with schema '{}'", factory.id());
        Ok(Self {
            factory,
            graph,
            canvas,
        })
    }

    /// Load a diagram from its export
    ///
    /// The export must name the factory's schema and resolve to exactly one
    /// root, which must be a canvas.
    pub fn from_export(
        factory: &'f DiagramObjectFactory,
        export: &DiagramModelExport,
    ) -> ChartResult<Self> {
        if export.schema != factory.id() {
            return Err(ChartError::SchemaMismatch {
                expected: factory.id().to_string(),
                found: export.schema.clone(),
            });
        }
        let mut graph = DiagramGraph::new();
        let roots = import_objects(factory, &mut graph, &export.objects)?;
        let canvas = match roots.as_slice() {
            [root] if graph.object_type(root)? == DiagramObjectType::Canvas => root.clone(),
            _ => return Err(ChartError::MultipleRootObjects),
        };
        Ok(Self {
            factory,
            graph,
            canvas,
        })
    }

    /// Export the canvas and everything under it
    pub fn to_export(&self) -> ChartResult<DiagramModelExport> {
        Ok(DiagramModelExport {
            schema: self.factory.id().to_string(),
            objects: export_objects(&self.graph, std::slice::from_ref(&self.canvas))?,
        })
    }

    pub fn factory(&self) -> &'f DiagramObjectFactory {
        self.factory
    }

    pub fn canvas(&self) -> &InstanceId {
        &self.canvas
    }

    pub fn graph(&self) -> &DiagramGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut DiagramGraph {
        &mut self.graph
    }

    /// Create an object and add it to `parent`, or to the canvas
    pub fn add_object(
        &mut self,
        template: &str,
        parent: Option<&InstanceId>,
    ) -> ChartResult<InstanceId> {
        let object = self
            .factory
            .create_new_object(&mut self.graph, template, None)?;
        let parent = parent.unwrap_or(&self.canvas).clone();
        self.graph.add_child(&parent, &object, None)?;
        Ok(object)
    }

    /// Directed view of the diagram
    pub fn semantic_graph(&self) -> ChartResult<SemanticGraph> {
        SemanticAnalyzer::to_graph(&self.graph, &self.canvas)
    }
}

// ============================================================================
// Tests
// ============================================================================
