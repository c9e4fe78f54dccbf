//! Saving and loading diagram and schema files

use crate::file::DiagramModelExport;
use crate::template::DiagramSchema;
use openchart_core::{ChartError, ChartResult, Persistable, Validatable};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// ============================================================================
// Constants
// ============================================================================

/// File extension for diagrams
pub const DIAGRAM_EXTENSION: &str = "ocd";

/// File extension for schemas
pub const SCHEMA_EXTENSION: &str = "ocs";

// ============================================================================
// Save Functions
// ============================================================================

/// Save a diagram export to a file
///
/// Parent directories are created as needed. With `pretty` unset the file
/// is written as compact JSON.
///
/// # Example
///
/// ```rust,ignore
/// use openchart_model::{DiagramFile, save_diagram};
///
/// let file = DiagramFile::new(&factory)?;
/// save_diagram(&file.to_export()?, "flow.ocd", true)?;
/// ```
pub fn save_diagram(
    export: &DiagramModelExport,
    path: impl AsRef<Path>,
    pretty: bool,
) -> ChartResult<()> {
    let path = path.as_ref();
    let json = if pretty {
        export.to_json()?
    } else {
        serde_json::to_string(export)?
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ChartError::DirectoryCreate {
                path: parent.to_path_buf(),
                message: e.to_string(),
            })?;
        }
    }

    std::fs::write(path, json).map_err(|e| ChartError::FileWrite {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    info!("Saved diagram with {} objects to {}", export.objects.len(), path.display());
    Ok(())
}

// ============================================================================
// Load Functions
// ============================================================================

fn read(path: &Path) -> ChartResult<String> {
    std::fs::read_to_string(path).map_err(|e| ChartError::FileRead {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load a diagram export from a file
pub fn load_diagram(path: impl AsRef<Path>) -> ChartResult<DiagramModelExport> {
    let path = path.as_ref();
    let json = read(path)?;
    let export = DiagramModelExport::from_json(&json).map_err(|e| match e {
        ChartError::Json(je) => ChartError::FileRead {
            path: path.to_path_buf(),
            message: format!("Invalid diagram file format: {}", je),
        },
        other => other,
    })?;
    debug!("Loaded {} records from {}", export.objects.len(), path.display());
    Ok(export)
}

/// Load a schema from a file and check it
pub fn load_schema(path: impl AsRef<Path>) -> ChartResult<DiagramSchema> {
    let path = path.as_ref();
    let json = read(path)?;
    let schema = DiagramSchema::from_json(&json).map_err(|e| match e {
        ChartError::Json(je) => ChartError::FileRead {
            path: path.to_path_buf(),
            message: format!("Invalid schema file format: {}", je),
        },
        other => other,
    })?;
    schema.validate()?;
    info!("Loaded schema '{}' from {}", schema.id, path.display());
    Ok(schema)
}

// ============================================================================
// Utility Functions
// ============================================================================

/// Get the default file name for a diagram
pub fn default_file_name(name: &str) -> String {
    let safe_name: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!("{}.{}", safe_name.to_lowercase(), DIAGRAM_EXTENSION)
}

/// Ensure a path has the given extension
pub fn ensure_extension(path: impl AsRef<Path>, extension: &str) -> PathBuf {
    let path = path.as_ref();

    if path.extension().is_none_or(|e| e != extension) {
        let mut new_path = path.to_path_buf();
        new_path.set_extension(extension);
        new_path
    } else {
        path.to_path_buf()
    }
}

/// Copy a file to `<name>.<ext>.backup` before it is overwritten
pub fn backup_file(path: impl AsRef<Path>) -> ChartResult<Option<PathBuf>> {
    let path = path.as_ref();

    if !path.exists() {
        return Ok(None);
    }

    let extension = path
        .extension()
        .map_or_else(|| "backup".to_string(), |e| format!("{}.backup", e.to_string_lossy()));
    let backup_path = path.with_extension(extension);

    std::fs::copy(path, &backup_path).map_err(|e| ChartError::FileWrite {
        path: backup_path.clone(),
        message: format!("Failed to create backup: {}", e),
    })?;
    debug!("Backed up {} to {}", path.display(), backup_path.display());

    Ok(Some(backup_path))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::DiagramFile;
    use crate::fixtures::{SAMPLE_SCHEMA, sample_factory};
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load_diagram() {
        let factory = sample_factory();
        let file = DiagramFile::new(&factory).unwrap();
        let export = file.to_export().unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("flow.ocd");
        save_diagram(&export, &path, true).unwrap();

        let loaded = load_diagram(&path).unwrap();
        assert_eq!(loaded, export);
    }

    #[test]
    fn test_compact_output() {
        let factory = sample_factory();
        let export = DiagramFile::new(&factory).unwrap().to_export().unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("flow.ocd");
        save_diagram(&export, &path, false).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains('\n'));
        assert_eq!(load_diagram(&path).unwrap(), export);
    }

    #[test]
    fn test_load_missing_and_invalid() {
        let dir = tempdir().unwrap();
        let missing = load_diagram(dir.path().join("missing.ocd")).unwrap_err();
        assert!(missing.is_io());

        let path = dir.path().join("broken.ocd");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_diagram(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid diagram file format"));
    }

    #[test]
    fn test_load_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.ocs");
        std::fs::write(&path, SAMPLE_SCHEMA).unwrap();
        let schema = load_schema(&path).unwrap();
        assert_eq!(schema.id, "sample_schema");

        std::fs::write(&path, r#"{"id": "", "canvas": {"name": "c", "type": "canvas"}}"#).unwrap();
        assert!(load_schema(&path).is_err());
    }

    #[test]
    fn test_default_file_name() {
        assert_eq!(default_file_name("Phishing Flow"), "phishing_flow.ocd");
        assert_eq!(default_file_name("flow-1"), "flow-1.ocd");
    }

    #[test]
    fn test_ensure_extension() {
        assert_eq!(ensure_extension("flow", "ocd"), PathBuf::from("flow.ocd"));
        assert_eq!(ensure_extension("flow.ocd", "ocd"), PathBuf::from("flow.ocd"));
        assert_eq!(ensure_extension("flow.json", "ocd"), PathBuf::from("flow.ocd"));
    }

    #[test]
    fn test_backup_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flow.ocd");
        assert_eq!(backup_file(&path).unwrap(), None);

        std::fs::write(&path, "{}").unwrap();
        let backup = backup_file(&path).unwrap().unwrap();
        assert_eq!(backup, dir.path().join("flow.ocd.backup"));
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "{}");
    }
}
