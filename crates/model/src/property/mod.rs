//! Property model
//!
//! Typed value containers attached to diagram objects. Every property has a
//! fixed shape decided by its descriptor at creation; only leaf values and
//! collection contents change afterwards.
//!
//! All properties share one contract:
//!
//! - `is_defined()` - whether a value is present
//! - `to_json()` - the scalar or ordered-entries form, symmetric with creation
//! - `Display` - the human readable representative value
//! - `hash_value()` - a content hash for cheap change detection

pub mod atomic;
pub mod collection;
pub mod descriptor;
pub mod tuple;

pub use atomic::{DateProperty, EnumProperty, FloatProperty, IntProperty, StringProperty};
pub use collection::{DictionaryProperty, ListProperty, RootProperty};
pub use descriptor::{
    DescriptorBase, JsonEntries, PropertyDescriptor, RootDescriptor, ValueCombination,
};
pub use tuple::{CombinationIndex, TupleProperty};

use openchart_core::{ChartError, ChartResult};
use serde_json::Value;
use std::fmt;

// ============================================================================
// PropertyMeta
// ============================================================================

/// Identity and validation metadata shared by all property kinds
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyMeta {
    /// Property id, unique within its parent collection
    pub id: String,

    /// Display name
    pub name: Option<String>,

    /// Whether the property may be edited
    pub editable: bool,

    /// Whether validation should flag the property when undefined
    pub required: bool,
}

impl PropertyMeta {
    /// Create editable, optional metadata
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            editable: true,
            required: false,
        }
    }

    /// Create metadata from a descriptor's shared fields
    pub fn from_base(id: impl Into<String>, base: &DescriptorBase) -> Self {
        Self {
            id: id.into(),
            name: base.name.clone(),
            editable: base.is_editable,
            required: base.required,
        }
    }
}

// ============================================================================
// Property
// ============================================================================

/// A typed property value
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    String(StringProperty),
    Int(IntProperty),
    Float(FloatProperty),
    Date(DateProperty),
    Enum(EnumProperty),
    List(ListProperty),
    Dictionary(DictionaryProperty),
    Tuple(TupleProperty),
}

impl Property {
    /// Get the property's metadata
    pub fn meta(&self) -> &PropertyMeta {
        match self {
            Property::String(p) => &p.meta,
            Property::Int(p) => &p.meta,
            Property::Float(p) => &p.meta,
            Property::Date(p) => &p.meta,
            Property::Enum(p) => &p.meta,
            Property::List(p) => &p.meta,
            Property::Dictionary(p) => &p.meta,
            Property::Tuple(p) => &p.meta,
        }
    }

    pub(crate) fn meta_mut(&mut self) -> &mut PropertyMeta {
        match self {
            Property::String(p) => &mut p.meta,
            Property::Int(p) => &mut p.meta,
            Property::Float(p) => &mut p.meta,
            Property::Date(p) => &mut p.meta,
            Property::Enum(p) => &mut p.meta,
            Property::List(p) => &mut p.meta,
            Property::Dictionary(p) => &mut p.meta,
            Property::Tuple(p) => &mut p.meta,
        }
    }

    /// Get the property id
    pub fn id(&self) -> &str {
        &self.meta().id
    }

    /// Lower-case kind name, matching the descriptor tag
    pub fn kind_name(&self) -> &'static str {
        match self {
            Property::String(_) => "string",
            Property::Int(_) => "int",
            Property::Float(_) => "float",
            Property::Date(_) => "date",
            Property::Enum(_) => "enum",
            Property::List(_) => "list",
            Property::Dictionary(_) => "dictionary",
            Property::Tuple(_) => "tuple",
        }
    }

    /// Whether this property serializes as ordered entries
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            Property::List(_) | Property::Dictionary(_) | Property::Tuple(_)
        )
    }

    /// Whether the property holds a value
    pub fn is_defined(&self) -> bool {
        match self {
            Property::String(p) => p.is_defined(),
            Property::Int(p) => p.is_defined(),
            Property::Float(p) => p.is_defined(),
            Property::Date(p) => p.is_defined(),
            Property::Enum(p) => p.is_defined(),
            Property::List(p) => p.is_defined(),
            Property::Dictionary(p) => p.is_defined(),
            Property::Tuple(p) => p.is_defined(),
        }
    }

    /// Serialize to the scalar or ordered-entries form
    pub fn to_json(&self) -> Value {
        match self {
            Property::String(p) => p.to_json(),
            Property::Int(p) => p.to_json(),
            Property::Float(p) => p.to_json(),
            Property::Date(p) => p.to_json(),
            Property::Enum(p) => p.to_json(),
            Property::List(p) => p.to_json(),
            Property::Dictionary(p) => p.to_json(),
            Property::Tuple(p) => p.to_json(),
        }
    }

    /// Content hash used for change detection
    pub fn hash_value(&self) -> i32 {
        match self {
            Property::String(p) => p.hash_value(),
            Property::Int(p) => p.hash_value(),
            Property::Float(p) => p.hash_value(),
            Property::Date(p) => p.hash_value(),
            Property::Enum(p) => p.hash_value(),
            Property::List(p) => p.hash_value(),
            Property::Dictionary(p) => p.hash_value(),
            Property::Tuple(p) => p.hash_value(),
        }
    }

    /// Write a JSON value into the property
    ///
    /// Collections require ordered entries and fail with
    /// `InvalidJsonEntries` otherwise; atomics reject arrays with
    /// `InvalidJsonPrimitive`.
    pub fn apply_json(&mut self, value: &Value) -> ChartResult<()> {
        if !self.is_collection() && value.is_array() {
            return Err(ChartError::InvalidJsonPrimitive(value.to_string()));
        }
        match self {
            Property::String(p) => p.set_json(value),
            Property::Int(p) => p.set_json(value),
            Property::Float(p) => p.set_json(value),
            Property::Date(p) => p.set_json(value),
            Property::Enum(p) => p.set_json(value),
            Property::List(p) => p.set_json(value)?,
            Property::Dictionary(p) => p.set_json(value)?,
            Property::Tuple(p) => p.set_json(value)?,
        }
        Ok(())
    }

    pub fn as_string(&self) -> Option<&StringProperty> {
        match self {
            Property::String(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<&IntProperty> {
        match self {
            Property::Int(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumProperty> {
        match self {
            Property::Enum(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListProperty> {
        match self {
            Property::List(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut ListProperty> {
        match self {
            Property::List(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_dictionary(&self) -> Option<&DictionaryProperty> {
        match self {
            Property::Dictionary(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&TupleProperty> {
        match self {
            Property::Tuple(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_tuple_mut(&mut self) -> Option<&mut TupleProperty> {
        match self {
            Property::Tuple(p) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::String(p) => fmt::Display::fmt(p, f),
            Property::Int(p) => fmt::Display::fmt(p, f),
            Property::Float(p) => fmt::Display::fmt(p, f),
            Property::Date(p) => fmt::Display::fmt(p, f),
            Property::Enum(p) => fmt::Display::fmt(p, f),
            Property::List(p) => fmt::Display::fmt(p, f),
            Property::Dictionary(p) => fmt::Display::fmt(p, f),
            Property::Tuple(p) => fmt::Display::fmt(p, f),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// 32-bit string hash (`h * 31 + c` over UTF-16 code units, wrapping)
pub fn compute_hash(text: &str) -> i32 {
    text.encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(unit as i32))
}

/// Hash of a collection: the hash of its children's hashes joined by `.`
pub(crate) fn collection_hash<'a>(children: impl Iterator<Item = &'a Property>) -> i32 {
    let text = children
        .map(|p| p.hash_value().to_string())
        .collect::<Vec<_>>()
        .join(".");
    compute_hash(&text)
}

/// Read `[[id, value], ...]` entries from JSON
pub fn parse_entries(value: &Value) -> ChartResult<Vec<(&str, &Value)>> {
    let invalid = || ChartError::InvalidJsonEntries(value.to_string());
    let items = value.as_array().ok_or_else(invalid)?;
    items
        .iter()
        .map(|item| match item.as_array().map(Vec::as_slice) {
            Some([Value::String(id), v]) => Ok((id.as_str(), v)),
            _ => Err(invalid()),
        })
        .collect()
}

/// Build `[[id, value], ...]` JSON from ordered properties
pub(crate) fn entries_json<'a>(items: impl Iterator<Item = (&'a String, &'a Property)>) -> Value {
    Value::Array(
        items
            .map(|(id, p)| Value::Array(vec![Value::String(id.clone()), p.to_json()]))
            .collect(),
    )
}

// ============================================================================
// Tests
// ============================================================================
