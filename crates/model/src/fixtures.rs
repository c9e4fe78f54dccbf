//! Shared test fixtures

use crate::factory::DiagramObjectFactory;
use crate::template::DiagramSchema;
use openchart_core::Persistable;

/// Sample schema: a canvas, a group, a four-anchor block, a block with
/// every property kind and a line
pub(crate) const SAMPLE_SCHEMA: &str = include_str!("../tests/fixtures/sample_schema.json");

/// Export of one block whose up and down anchors are joined by a line
pub(crate) const SAMPLE_DIAGRAM: &str = include_str!("../tests/fixtures/sample_diagram.json");

pub(crate) fn sample_schema() -> DiagramSchema {
    DiagramSchema::from_json(SAMPLE_SCHEMA).expect("sample schema should parse")
}

pub(crate) fn sample_factory() -> DiagramObjectFactory {
    DiagramObjectFactory::new(sample_schema())
}
