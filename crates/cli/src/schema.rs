//! Schema lookup
//!
//! `--schema` may name a schema file or a directory. Directories are walked
//! for `.ocs` files, and the one whose id matches the diagram is chosen.

use crate::config::CliConfig;
use openchart_model::{DiagramSchema, SCHEMA_EXTENSION, load_schema};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Failures to pick a schema
#[derive(Debug, Error)]
pub enum SchemaLookupError {
    #[error("No schema given; pass --schema or set default_schema in the configuration")]
    NoSchema,

    #[error("No schema with id '{id}' found under {}", dir.display())]
    NotFound { dir: PathBuf, id: String },

    #[error("No schema files found under {}", dir.display())]
    Empty { dir: PathBuf },

    #[error("{count} schemas found under {}; pass a schema file instead", dir.display())]
    Ambiguous { dir: PathBuf, count: usize },
}

/// Pick the schema path from the flag, falling back to the configuration
pub fn schema_path<'a>(
    flag: Option<&'a Path>,
    config: &'a CliConfig,
) -> Result<&'a Path, SchemaLookupError> {
    flag.or(config.default_schema.as_deref())
        .ok_or(SchemaLookupError::NoSchema)
}

/// Schema files below `dir`, sorted by path
pub fn find_schemas(dir: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|e| e == SCHEMA_EXTENSION))
        .collect();
    found.sort();
    found
}

/// Load the schema at `path`
///
/// When `path` is a directory, the schema with id `expected` is returned.
/// Without an expected id the directory must hold exactly one schema.
pub fn resolve_schema(path: &Path, expected: Option<&str>) -> anyhow::Result<DiagramSchema> {
    if !path.is_dir() {
        return Ok(load_schema(path)?);
    }

    let candidates = find_schemas(path);
    debug!("Found {} schema files under {}", candidates.len(), path.display());
    match expected {
        Some(id) => {
            for candidate in &candidates {
                match load_schema(candidate) {
                    Ok(schema) if schema.id == id => return Ok(schema),
                    Ok(_) => {}
                    Err(e) => warn!("Skipping {}: {}", candidate.display(), e),
                }
            }
            Err(SchemaLookupError::NotFound {
                dir: path.to_path_buf(),
                id: id.to_string(),
            }
            .into())
        }
        None => match candidates.as_slice() {
            [] => Err(SchemaLookupError::Empty {
                dir: path.to_path_buf(),
            }
            .into()),
            [only] => Ok(load_schema(only)?),
            many => Err(SchemaLookupError::Ambiguous {
                dir: path.to_path_buf(),
                count: many.len(),
            }
            .into()),
        },
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn schema_json(id: &str) -> String {
        format!(r#"{{"id": "{}", "canvas": {{"name": "canvas", "type": "canvas"}}}}"#, id)
    }

    #[test]
    fn test_flag_wins_over_config() {
        let config = CliConfig {
            default_schema: Some(PathBuf::from("configured.ocs")),
            ..CliConfig::default()
        };
        let flag = PathBuf::from("flag.ocs");
        assert_eq!(schema_path(Some(flag.as_path()), &config).unwrap(), flag.as_path());
        assert_eq!(
            schema_path(None, &config).unwrap(),
            Path::new("configured.ocs")
        );
        assert!(matches!(
            schema_path(None, &CliConfig::default()),
            Err(SchemaLookupError::NoSchema)
        ));
    }

    #[test]
    fn test_directory_lookup_by_id() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("a.ocs"), schema_json("alpha")).unwrap();
        std::fs::write(dir.path().join("nested/b.ocs"), schema_json("beta")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a schema").unwrap();

        assert_eq!(find_schemas(dir.path()).len(), 2);
        let schema = resolve_schema(dir.path(), Some("beta")).unwrap();
        assert_eq!(schema.id, "beta");

        let err = resolve_schema(dir.path(), Some("gamma")).unwrap_err();
        assert!(err.to_string().contains("No schema with id 'gamma'"));

        let err = resolve_schema(dir.path(), None).unwrap_err();
        assert!(err.to_string().starts_with("2 schemas found"));
    }

    #[test]
    fn test_single_schema_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("only.ocs"), schema_json("only")).unwrap();
        assert_eq!(resolve_schema(dir.path(), None).unwrap().id, "only");

        let empty = tempdir().unwrap();
        let err = resolve_schema(empty.path(), None).unwrap_err();
        assert!(err.to_string().starts_with("No schema files found"));
    }
}
