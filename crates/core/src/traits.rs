//! Core traits for OpenChart
//!
//! This module defines the fundamental traits that diagram types implement
//! to provide consistent behavior for validation, persistence and
//! positioning.

use crate::error::{ChartError, ChartResult};
use crate::types::Position;
use serde::{Serialize, de::DeserializeOwned};
use std::path::Path;

// ============================================================================
// Validatable Trait
// ============================================================================

/// Trait for types that can be validated
///
/// Types implementing this trait can check their internal consistency
/// and return validation errors if the state is invalid.
///
/// # Example
///
/// ```rust,ignore
/// use openchart_core::{Validatable, ChartResult, ChartError};
///
/// struct Slot {
///     position: String,
/// }
///
/// impl Validatable for Slot {
///     fn validate(&self) -> ChartResult<()> {
///         if self.position.is_empty() {
///             return Err(ChartError::validation("Position cannot be empty"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Validatable {
    /// Validate the current state of the object
    ///
    /// Returns `Ok(())` if valid, or a `ChartError` describing the problem.
    fn validate(&self) -> ChartResult<()>;

    /// Check if the object is valid without returning error details
    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Get all validation errors (for types that can have multiple errors)
    fn validation_errors(&self) -> Vec<String> {
        match self.validate() {
            Ok(()) => vec![],
            Err(e) => vec![e.to_string()],
        }
    }
}

// ============================================================================
// Persistable Trait
// ============================================================================

/// Trait for types that can be serialized to and deserialized from files
///
/// Schemas and diagram exports implement this so they can be saved to and
/// loaded from JSON files.
pub trait Persistable: Serialize + DeserializeOwned + Sized {
    /// Get the file extension for this type (without the dot)
    fn file_extension() -> &'static str;

    /// Save to a JSON string
    fn to_json(&self) -> ChartResult<String> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }

    /// Load from a JSON string
    fn from_json(json: &str) -> ChartResult<Self> {
        serde_json::from_str(json).map_err(Into::into)
    }

    /// Save to a file
    fn save_to_file(&self, path: &Path) -> ChartResult<()> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|e| ChartError::FileWrite {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load from a file
    fn load_from_file(path: &Path) -> ChartResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| ChartError::FileRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_json(&json)
    }
}

// ============================================================================
// Positioned Trait
// ============================================================================

/// Trait for types that have a position on the canvas
///
/// Position is bookkeeping only; layout is computed elsewhere.
pub trait Positioned {
    /// Get the current position
    fn position(&self) -> Position;

    /// Set the position
    fn set_position(&mut self, position: Position);

    /// Move by a relative offset
    fn translate(&mut self, dx: f32, dy: f32) {
        let pos = self.position();
        self.set_position(pos.offset(dx, dy));
    }
}

// ============================================================================
// Tests
// ============================================================================
