//! CLI configuration
//!
//! Settings come from an optional TOML file. Flags given on the command line
//! take precedence over anything configured here.

use openchart_core::{ChartError, ChartResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Settings read from the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// Schema file or directory used when `--schema` is not given
    pub default_schema: Option<PathBuf>,

    /// Pretty-print written diagrams
    pub pretty: bool,

    /// Keep a `.backup` copy of files before overwriting them
    pub backup: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            default_schema: None,
            pretty: true,
            backup: true,
        }
    }
}

impl CliConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml(text: &str) -> ChartResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Resolve a relative `default_schema` against `base`
    fn relative_to(mut self, base: &Path) -> Self {
        if let Some(schema) = self.default_schema.take() {
            self.default_schema = Some(if schema.is_relative() {
                base.join(schema)
            } else {
                schema
            });
        }
        self
    }
}

/// Load the configuration file, or the defaults when no path is given
///
/// A relative `default_schema` is taken relative to the directory holding
/// the configuration file.
pub fn load_config(path: Option<&Path>) -> ChartResult<CliConfig> {
    let Some(path) = path else {
        return Ok(CliConfig::default());
    };
    let text = std::fs::read_to_string(path).map_err(|e| ChartError::FileRead {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let config = CliConfig::from_toml(&text)
        .map_err(|e| ChartError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
    debug!("Loaded configuration from {}", path.display());

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    Ok(config.relative_to(base))
}

// ============================================================================
// Tests
// ============================================================================
