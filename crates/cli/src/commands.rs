//! Subcommand implementations

use crate::args::{DiagramArgs, SchemaArgs};
use crate::config::CliConfig;
use crate::schema::{resolve_schema, schema_path};
use anyhow::Context;
use colored::Colorize;
use openchart_model::{
    DIAGRAM_EXTENSION, DiagramFile, DiagramGraph, DiagramModelExport, DiagramObjectFactory,
    DiagramObjectType, InstanceId, Persistable, SemanticEdge, Validator, backup_file,
    default_file_name, ensure_extension, save_diagram,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};

/// A diagram file read from disk together with the factory for its schema
struct LoadedDiagram {
    text: String,
    export: DiagramModelExport,
    factory: DiagramObjectFactory,
}

impl LoadedDiagram {
    fn open(args: &DiagramArgs, config: &CliConfig) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(&args.file)
            .with_context(|| format!("Failed to read {}", args.file.display()))?;
        let export = DiagramModelExport::from_json(&text)
            .with_context(|| format!("Invalid diagram file {}", args.file.display()))?;
        let path = schema_path(args.schema.schema.as_deref(), config)?;
        let schema = resolve_schema(path, Some(&export.schema))
            .with_context(|| format!("Failed to load schema from {}", path.display()))?;
        debug!("Opened {} with schema '{}'", args.file.display(), schema.id);
        Ok(Self {
            text,
            export,
            factory: DiagramObjectFactory::new(schema),
        })
    }

    fn file(&self, path: &Path) -> anyhow::Result<DiagramFile<'_>> {
        DiagramFile::from_export(&self.factory, &self.export)
            .with_context(|| format!("Failed to import {}", path.display()))
    }
}

fn write_export(export: &DiagramModelExport, path: &Path, config: &CliConfig) -> anyhow::Result<()> {
    if config.backup {
        if let Some(backup) = backup_file(path)? {
            info!("Previous file kept at {}", backup.display());
        }
    }
    save_diagram(export, path, config.pretty)
        .with_context(|| format!("Failed to write {}", path.display()))
}

// ============================================================================
// new
// ============================================================================

pub fn new_diagram(
    schema: &SchemaArgs,
    output: Option<&Path>,
    config: &CliConfig,
) -> anyhow::Result<ExitCode> {
    let path = schema_path(schema.schema.as_deref(), config)?;
    let schema = resolve_schema(path, None)
        .with_context(|| format!("Failed to load schema from {}", path.display()))?;
    let output = match output {
        Some(output) => ensure_extension(output, DIAGRAM_EXTENSION),
        None => PathBuf::from(default_file_name(&schema.id)),
    };

    let factory = DiagramObjectFactory::new(schema);
    let file = DiagramFile::new(&factory)?;
    write_export(&file.to_export()?, &output, config)?;

    println!(
        "{} {} {}",
        "Created".green().bold(),
        output.display(),
        format!("(schema '{}')", factory.id()).dimmed()
    );
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// inspect
// ============================================================================

fn count_by_kind(graph: &DiagramGraph) -> Vec<(DiagramObjectType, usize)> {
    DiagramObjectType::all()
        .iter()
        .map(|kind| {
            let count = graph.objects().filter(|o| o.object_type() == *kind).count();
            (*kind, count)
        })
        .collect()
}

pub fn inspect(args: &DiagramArgs, config: &CliConfig) -> anyhow::Result<ExitCode> {
    let loaded = LoadedDiagram::open(args, config)?;
    let file = loaded.file(&args.file)?;
    let canvas = file.graph().object(file.canvas())?;

    println!("{}  {}", "Diagram:".bold(), args.file.display());
    println!("{}   {}", "Schema:".bold(), file.factory().id());
    println!("{}   {} ({})", "Canvas:".bold(), canvas.label(), canvas.instance());
    println!("{}  {}", "Objects:".bold(), file.graph().len());
    for (kind, count) in count_by_kind(file.graph()) {
        println!("  {:<8} {}", kind.as_str(), count);
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// graph
// ============================================================================

fn endpoint(graph: &DiagramGraph, node: Option<&InstanceId>, via: Option<&str>) -> String {
    match node.and_then(|n| graph.get(n)) {
        Some(object) => format!("{} [{}]", object.label(), via.unwrap_or("?")),
        None => "(unattached)".dimmed().to_string(),
    }
}

fn describe_edge(graph: &DiagramGraph, edge: &SemanticEdge) -> String {
    format!(
        "{} -> {}",
        endpoint(graph, edge.source(), edge.source_via()),
        endpoint(graph, edge.target(), edge.target_via())
    )
}

pub fn graph(args: &DiagramArgs, config: &CliConfig) -> anyhow::Result<ExitCode> {
    let loaded = LoadedDiagram::open(args, config)?;
    let file = loaded.file(&args.file)?;
    let semantic = file.semantic_graph()?;
    let graph = file.graph();

    let nodes: Vec<_> = semantic.nodes().collect();
    println!("{}", format!("Nodes ({}):", nodes.len()).bold());
    for node in nodes {
        let label = graph.get(&node.instance).map_or_else(|| node.id.clone(), |o| o.label());
        println!("  {} {} {}", label.cyan(), node.id, node.instance.as_str().dimmed());
    }

    let edges: Vec<_> = semantic.edges().collect();
    println!("{}", format!("Edges ({}):", edges.len()).bold());
    for edge in edges {
        println!(
            "  {} {}: {}",
            edge.id.cyan(),
            edge.instance.as_str().dimmed(),
            describe_edge(graph, edge)
        );
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// check
// ============================================================================

pub fn check(args: &DiagramArgs, strict: bool, config: &CliConfig) -> anyhow::Result<ExitCode> {
    let loaded = LoadedDiagram::open(args, config)?;
    let file = loaded.file(&args.file)?;
    let validator = Validator::with_default_rules();
    debug!("Running rules: {}", validator.rule_names().join(", "));
    let result = validator.validate(file.graph());

    for error in &result.errors {
        println!("{} {}", "error:".red().bold(), error);
        if let Some(suggestion) = &error.suggestion {
            println!("  {} {}", "hint:".cyan(), suggestion);
        }
    }
    for warning in &result.warnings {
        println!("{} {}", "warning:".yellow().bold(), warning);
    }

    let failed = result.has_errors() || (strict && result.has_warnings());
    let summary = format!(
        "{} errors, {} warnings",
        result.errors.len(),
        result.warnings.len()
    );
    if failed {
        println!("{} {}", "FAILED".red().bold(), summary);
        Ok(ExitCode::FAILURE)
    } else {
        println!("{} {}", "OK".green().bold(), summary);
        Ok(ExitCode::SUCCESS)
    }
}

// ============================================================================
// roundtrip
// ============================================================================

pub fn roundtrip(
    args: &DiagramArgs,
    output: Option<&Path>,
    config: &CliConfig,
) -> anyhow::Result<ExitCode> {
    let loaded = LoadedDiagram::open(args, config)?;
    let file = loaded.file(&args.file)?;
    let export = file.to_export()?;
    let json = export.to_json()?;

    if let Some(output) = output {
        write_export(&export, output, config)?;
        println!("{} {}", "Wrote".green().bold(), output.display());
    }

    if json == loaded.text.trim_end() {
        println!("{} re-export is byte-identical", "OK".green().bold());
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{} re-export differs from {}", "DIFF".yellow().bold(), args.file.display());
        Ok(ExitCode::FAILURE)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use openchart_model::DiagramSchema;
    use pretty_assertions::assert_eq;

    const SAMPLE_SCHEMA: &str = include_str!("../../model/tests/fixtures/sample_schema.json");
    const SAMPLE_DIAGRAM: &str = include_str!("../../model/tests/fixtures/sample_diagram.json");

    #[test]
    fn test_count_by_kind() {
        let factory = DiagramObjectFactory::new(DiagramSchema::from_json(SAMPLE_SCHEMA).unwrap());
        let export = DiagramModelExport::from_json(SAMPLE_DIAGRAM).unwrap();
        let file = DiagramFile::from_export(&factory, &export).unwrap();

        let counts = count_by_kind(file.graph());
        assert_eq!(
            counts,
            vec![
                (DiagramObjectType::Canvas, 1),
                (DiagramObjectType::Group, 0),
                (DiagramObjectType::Block, 1),
                (DiagramObjectType::Anchor, 4),
                (DiagramObjectType::Latch, 2),
                (DiagramObjectType::Line, 1),
                (DiagramObjectType::Handle, 1),
            ]
        );
    }

    #[test]
    fn test_describe_edge() {
        colored::control::set_override(false);
        let factory = DiagramObjectFactory::new(DiagramSchema::from_json(SAMPLE_SCHEMA).unwrap());
        let export = DiagramModelExport::from_json(SAMPLE_DIAGRAM).unwrap();
        let file = DiagramFile::from_export(&factory, &export).unwrap();
        let semantic = file.semantic_graph().unwrap();

        let edge = semantic.edges().next().unwrap();
        assert_eq!(
            describe_edge(file.graph(), edge),
            "Small Block [up] -> Small Block [down]"
        );
    }
}
