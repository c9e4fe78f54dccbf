//! Property descriptors
//!
//! Descriptors are the schema-side description of a property: its kind,
//! defaults and validation metadata. They are immutable once loaded and
//! shared through `Arc`, which also gives the factory a stable identity to
//! key its caches on.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Ordered `[id, value]` pairs, the serialized form of every collection
pub type JsonEntries = Vec<(String, Value)>;

/// One valid tuple combination: `[field_1, value_1, field_2, value_2]`
pub type ValueCombination = [String; 4];

/// Descriptors of the properties attached to one template, keyed by id
pub type RootDescriptor = IndexMap<String, Arc<PropertyDescriptor>>;

fn default_true() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

// ============================================================================
// Descriptor Base
// ============================================================================

/// Metadata shared by every descriptor kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorBase {
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Whether this property is the owner's display value
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_representative: bool,

    /// Whether the property may be edited
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub is_editable: bool,

    /// Whether validation should flag the property when undefined
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
}

impl Default for DescriptorBase {
    fn default() -> Self {
        Self {
            name: None,
            is_representative: false,
            is_editable: true,
            required: false,
        }
    }
}

// ============================================================================
// Descriptor Kinds
// ============================================================================

/// String property descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StringDescriptor {
    #[serde(flatten)]
    pub base: DescriptorBase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

/// Int and float property descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumberDescriptor {
    #[serde(flatten)]
    pub base: DescriptorBase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// Date property descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateDescriptor {
    #[serde(flatten)]
    pub base: DescriptorBase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Enum property descriptor; `options` is a list of `[key, display]` entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDescriptor {
    #[serde(flatten)]
    pub base: DescriptorBase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub options: Arc<ListDescriptor>,
}

/// List property descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListDescriptor {
    #[serde(flatten)]
    pub base: DescriptorBase,
    /// Descriptor every element is built from
    pub form: Arc<PropertyDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonEntries>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
}

/// Dictionary property descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DictionaryDescriptor {
    #[serde(flatten)]
    pub base: DescriptorBase,
    pub form: IndexMap<String, Arc<PropertyDescriptor>>,
}

/// Tuple property descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TupleDescriptor {
    #[serde(flatten)]
    pub base: DescriptorBase,
    pub form: IndexMap<String, Arc<PropertyDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combinations: Option<Arc<Vec<ValueCombination>>>,
}

// ============================================================================
// PropertyDescriptor
// ============================================================================

/// A property descriptor, tagged by `type` in schema files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyDescriptor {
    String(StringDescriptor),
    Int(NumberDescriptor),
    Float(NumberDescriptor),
    Date(DateDescriptor),
    Enum(EnumDescriptor),
    List(ListDescriptor),
    Dictionary(DictionaryDescriptor),
    Tuple(TupleDescriptor),
}

impl PropertyDescriptor {
    /// Get the metadata shared by all kinds
    pub fn base(&self) -> &DescriptorBase {
        match self {
            PropertyDescriptor::String(d) => &d.base,
            PropertyDescriptor::Int(d) | PropertyDescriptor::Float(d) => &d.base,
            PropertyDescriptor::Date(d) => &d.base,
            PropertyDescriptor::Enum(d) => &d.base,
            PropertyDescriptor::List(d) => &d.base,
            PropertyDescriptor::Dictionary(d) => &d.base,
            PropertyDescriptor::Tuple(d) => &d.base,
        }
    }

    /// Whether the described property is the owner's display value
    pub fn is_representative(&self) -> bool {
        self.base().is_representative
    }

    /// Whether values of this kind are ordered entries rather than scalars
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            PropertyDescriptor::List(_)
                | PropertyDescriptor::Dictionary(_)
                | PropertyDescriptor::Tuple(_)
        )
    }

    /// Lower-case kind name, as written in schema files
    pub fn kind_name(&self) -> &'static str {
        match self {
            PropertyDescriptor::String(_) => "string",
            PropertyDescriptor::Int(_) => "int",
            PropertyDescriptor::Float(_) => "float",
            PropertyDescriptor::Date(_) => "date",
            PropertyDescriptor::Enum(_) => "enum",
            PropertyDescriptor::List(_) => "list",
            PropertyDescriptor::Dictionary(_) => "dictionary",
            PropertyDescriptor::Tuple(_) => "tuple",
        }
    }

    /// Shorthand for an editable string descriptor
    pub fn string() -> Self {
        PropertyDescriptor::String(StringDescriptor::default())
    }

    /// Shorthand for an int descriptor bounded by `min`/`max`
    pub fn int(min: Option<f64>, max: Option<f64>, default: Option<Value>) -> Self {
        PropertyDescriptor::Int(NumberDescriptor {
            base: DescriptorBase::default(),
            default,
            min,
            max,
        })
    }

    /// Mark the descriptor as the representative property
    pub fn representative(mut self) -> Self {
        self.base_mut().is_representative = true;
        self
    }

    /// Mark the descriptor as required
    pub fn required(mut self) -> Self {
        self.base_mut().required = true;
        self
    }

    fn base_mut(&mut self) -> &mut DescriptorBase {
        match self {
            PropertyDescriptor::String(d) => &mut d.base,
            PropertyDescriptor::Int(d) | PropertyDescriptor::Float(d) => &mut d.base,
            PropertyDescriptor::Date(d) => &mut d.base,
            PropertyDescriptor::Enum(d) => &mut d.base,
            PropertyDescriptor::List(d) => &mut d.base,
            PropertyDescriptor::Dictionary(d) => &mut d.base,
            PropertyDescriptor::Tuple(d) => &mut d.base,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_int_descriptor() {
        let desc: PropertyDescriptor =
            serde_json::from_value(json!({"type": "int", "min": 0, "max": 10, "default": 100}))
                .unwrap();
        match &desc {
            PropertyDescriptor::Int(d) => {
                assert_eq!(d.min, Some(0.0));
                assert_eq!(d.max, Some(10.0));
                assert_eq!(d.default, Some(json!(100)));
                assert!(d.base.is_editable);
            }
            other => panic!("unexpected descriptor: {:?}", other),
        }
        assert_eq!(desc.kind_name(), "int");
        assert!(!desc.is_collection());
    }

    #[test]
    fn test_parse_representative_flag() {
        let desc: PropertyDescriptor =
            serde_json::from_value(json!({"type": "string", "is_representative": true})).unwrap();
        assert!(desc.is_representative());
        assert_eq!(desc, PropertyDescriptor::string().representative());
    }

    #[test]
    fn test_parse_enum_with_options() {
        let desc: PropertyDescriptor = serde_json::from_value(json!({
            "type": "enum",
            "options": {
                "type": "list",
                "form": {"type": "string"},
                "default": [["low", "Low"], ["high", "High"]]
            },
            "default": "low"
        }))
        .unwrap();
        let PropertyDescriptor::Enum(e) = desc else {
            panic!("expected enum descriptor");
        };
        assert_eq!(e.options.default.as_ref().map(|d| d.len()), Some(2));
        assert_eq!(e.default, Some(json!("low")));
    }

    #[test]
    fn test_parse_nested_collections() {
        let desc: PropertyDescriptor = serde_json::from_value(json!({
            "type": "list",
            "min_items": 1,
            "form": {
                "type": "dictionary",
                "form": {
                    "key": {"type": "string", "is_representative": true},
                    "weight": {"type": "float", "min": 0.0}
                }
            }
        }))
        .unwrap();
        assert!(desc.is_collection());
        let PropertyDescriptor::List(list) = desc else {
            panic!("expected list descriptor");
        };
        assert_eq!(list.min_items, Some(1));
        let PropertyDescriptor::Dictionary(dict) = list.form.as_ref() else {
            panic!("expected dictionary form");
        };
        let keys: Vec<&str> = dict.form.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["key", "weight"]);
    }

    #[test]
    fn test_parse_tuple_combinations() {
        let desc: PropertyDescriptor = serde_json::from_value(json!({
            "type": "tuple",
            "form": {
                "tactic": {"type": "string"},
                "technique": {"type": "string"}
            },
            "combinations": [["tactic", "TA0001", "technique", "T1566"]]
        }))
        .unwrap();
        let PropertyDescriptor::Tuple(tuple) = desc else {
            panic!("expected tuple descriptor");
        };
        let combos = tuple.combinations.unwrap();
        assert_eq!(combos[0][3], "T1566");
    }

    #[test]
    fn test_serialize_skips_defaults() {
        let json = serde_json::to_value(PropertyDescriptor::string()).unwrap();
        assert_eq!(json, json!({"type": "string"}));
    }
}
