//! Core types used throughout OpenChart
//!
//! This module contains the identifiers, geometry, object kinds and
//! semantic roles shared by the diagram model and its consumers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// ============================================================================
// Unique Identifiers
// ============================================================================

/// Globally unique identifier of one diagram object instance
///
/// Freshly created objects receive a random v4 UUID; imported objects keep
/// the identifier recorded in the export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Generate a new random instance identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for InstanceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for InstanceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Geometry Types
// ============================================================================

/// Position on the 2D canvas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    /// Create a new position
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Create a position at the origin (0, 0)
    pub fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    /// Calculate the Euclidean distance to another position
    pub fn distance_to(&self, other: &Position) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Add an offset to this position
    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::ops::Add for Position {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl std::ops::Sub for Position {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

// ============================================================================
// Object Kinds
// ============================================================================

/// The closed set of diagram object kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagramObjectType {
    Canvas,
    Group,
    Block,
    Anchor,
    Latch,
    Line,
    Handle,
}

impl DiagramObjectType {
    /// Get all object kinds
    pub fn all() -> &'static [DiagramObjectType] {
        &[
            DiagramObjectType::Canvas,
            DiagramObjectType::Group,
            DiagramObjectType::Block,
            DiagramObjectType::Anchor,
            DiagramObjectType::Latch,
            DiagramObjectType::Line,
            DiagramObjectType::Handle,
        ]
    }

    /// Lower-case name as used in schema and export files
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagramObjectType::Canvas => "canvas",
            DiagramObjectType::Group => "group",
            DiagramObjectType::Block => "block",
            DiagramObjectType::Anchor => "anchor",
            DiagramObjectType::Latch => "latch",
            DiagramObjectType::Line => "line",
            DiagramObjectType::Handle => "handle",
        }
    }

    /// Check if objects of this kind hold an ordered list of child objects
    pub fn is_container(&self) -> bool {
        matches!(self, DiagramObjectType::Canvas | DiagramObjectType::Group)
    }
}

impl fmt::Display for DiagramObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagramObjectType::Canvas => "Canvas",
            DiagramObjectType::Group => "Group",
            DiagramObjectType::Block => "Block",
            DiagramObjectType::Anchor => "Anchor",
            DiagramObjectType::Latch => "Latch",
            DiagramObjectType::Line => "Line",
            DiagramObjectType::Handle => "Handle",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Semantic Roles
// ============================================================================

bitflags::bitflags! {
    /// Per-template classification used to read the structural graph as a
    /// directed graph
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SemanticRole: u32 {
        const NODE        = 1 << 0;
        const EDGE        = 1 << 1;
        const LINK_SOURCE = 1 << 2;
        const LINK_TARGET = 1 << 3;
    }
}

impl SemanticRole {
    /// No semantic role
    pub const NONE: SemanticRole = SemanticRole::empty();
}

// Roles are stored as plain numbers in schema files.
impl Serialize for SemanticRole {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for SemanticRole {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u32::deserialize(deserializer)?;
        Ok(SemanticRole::from_bits_truncate(bits))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_instance_id_generate_is_unique() {
        let a = InstanceId::generate();
        let b = InstanceId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_instance_id_serializes_as_string() {
        let id = InstanceId::from("9aee95bb-6c28-48ad-9ad1-1042ff3e0aaf");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"9aee95bb-6c28-48ad-9ad1-1042ff3e0aaf\"");
        let back: InstanceId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_position_offset_and_ops() {
        let pos = Position::new(10.0, 20.0).offset(5.0, -10.0);
        assert_eq!(pos, Position::new(15.0, 10.0));
        assert_eq!(pos - Position::new(5.0, 5.0), Position::new(10.0, 5.0));
        assert_eq!(pos + Position::zero(), pos);
    }

    #[test]
    fn test_position_distance() {
        let p1 = Position::new(0.0, 0.0);
        let p2 = Position::new(3.0, 4.0);
        assert!((p1.distance_to(&p2) - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_object_type_names() {
        assert_eq!(DiagramObjectType::Block.to_string(), "Block");
        assert_eq!(DiagramObjectType::Latch.as_str(), "latch");
        assert!(DiagramObjectType::Canvas.is_container());
        assert!(!DiagramObjectType::Line.is_container());
        let parsed: DiagramObjectType = serde_json::from_str("\"handle\"").unwrap();
        assert_eq!(parsed, DiagramObjectType::Handle);
    }

    #[test]
    fn test_semantic_role_bits() {
        let role = SemanticRole::NODE | SemanticRole::LINK_SOURCE;
        assert!(role.contains(SemanticRole::NODE));
        assert!(!role.contains(SemanticRole::EDGE));
        assert_eq!(serde_json::to_string(&role).unwrap(), "5");

        let parsed: SemanticRole = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, SemanticRole::EDGE);
        assert_eq!(SemanticRole::default(), SemanticRole::NONE);
    }
}
