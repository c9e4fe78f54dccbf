//! Atomic properties: string, int, float, date and enum
//!
//! Atomic properties hold a single nullable value. Each kind coerces the
//! JSON it is given into its own domain (clamping numbers, rejecting enum
//! keys that are not options) rather than failing.

use super::collection::ListProperty;
use super::{PropertyMeta, compute_hash};
use chrono::{DateTime, SecondsFormat, SubsecRound, TimeZone, Utc};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// StringProperty
// ============================================================================

/// A nullable string with optional input suggestions
#[derive(Debug, Clone, PartialEq)]
pub struct StringProperty {
    pub meta: PropertyMeta,
    pub suggestions: Vec<String>,
    value: Option<String>,
}

impl StringProperty {
    /// Create an unset string property
    pub fn new(meta: PropertyMeta, suggestions: Vec<String>) -> Self {
        Self {
            meta,
            suggestions,
            value: None,
        }
    }

    /// Get the current value
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Set the current value
    pub fn set_value(&mut self, value: Option<&str>) {
        self.value = value.map(str::to_string);
    }

    /// Set the value from JSON; scalars are stringified
    pub fn set_json(&mut self, value: &Value) {
        self.value = match value {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        };
    }

    /// An empty string counts as undefined
    pub fn is_defined(&self) -> bool {
        self.value.as_ref().is_some_and(|v| !v.is_empty())
    }

    pub fn to_json(&self) -> Value {
        self.value.clone().map(Value::String).unwrap_or(Value::Null)
    }

    pub fn hash_value(&self) -> i32 {
        match &self.value {
            Some(v) => compute_hash(&format!("v:{}", v)),
            None => compute_hash(""),
        }
    }
}

impl fmt::Display for StringProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value.as_deref().unwrap_or("None"))
    }
}

// ============================================================================
// Numeric Properties
// ============================================================================

/// Clamp into `[min, max]` without panicking on inverted or infinite bounds
fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// A nullable integer, clamped to `[min, max]` and rounded on every write
#[derive(Debug, Clone, PartialEq)]
pub struct IntProperty {
    pub meta: PropertyMeta,
    pub min: f64,
    pub max: f64,
    value: Option<i64>,
}

impl IntProperty {
    /// Create an unset int property; absent bounds are unbounded
    pub fn new(meta: PropertyMeta, min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            meta,
            min: min.unwrap_or(f64::NEG_INFINITY),
            max: max.unwrap_or(f64::INFINITY),
            value: None,
        }
    }

    pub fn value(&self) -> Option<i64> {
        self.value
    }

    /// Set the value, clamping then rounding half up
    pub fn set_value(&mut self, value: Option<f64>) {
        self.value = value.map(|v| (clamp(v, self.min, self.max) + 0.5).floor() as i64);
    }

    /// Set the value from JSON; non-numeric input becomes zero
    pub fn set_json(&mut self, value: &Value) {
        match value {
            Value::Null => self.set_value(None),
            Value::Number(n) => self.set_value(n.as_f64()),
            _ => self.set_value(Some(0.0)),
        }
    }

    pub fn is_defined(&self) -> bool {
        self.value.is_some()
    }

    pub fn to_json(&self) -> Value {
        self.value.map(Value::from).unwrap_or(Value::Null)
    }

    pub fn hash_value(&self) -> i32 {
        compute_hash(&self.value.map(|v| v.to_string()).unwrap_or_default())
    }
}

impl fmt::Display for IntProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(v) => write!(f, "{}", v),
            None => f.write_str("None"),
        }
    }
}

/// A nullable float, clamped to `[min, max]` on every write
#[derive(Debug, Clone, PartialEq)]
pub struct FloatProperty {
    pub meta: PropertyMeta,
    pub min: f64,
    pub max: f64,
    value: Option<f64>,
}

impl FloatProperty {
    /// Create an unset float property; absent bounds are unbounded
    pub fn new(meta: PropertyMeta, min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            meta,
            min: min.unwrap_or(f64::NEG_INFINITY),
            max: max.unwrap_or(f64::INFINITY),
            value: None,
        }
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn set_value(&mut self, value: Option<f64>) {
        self.value = value.map(|v| clamp(v, self.min, self.max));
    }

    /// Set the value from JSON; non-numeric input becomes zero
    pub fn set_json(&mut self, value: &Value) {
        match value {
            Value::Null => self.set_value(None),
            Value::Number(n) => self.set_value(n.as_f64()),
            _ => self.set_value(Some(0.0)),
        }
    }

    pub fn is_defined(&self) -> bool {
        self.value.is_some()
    }

    pub fn to_json(&self) -> Value {
        self.value
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }

    pub fn hash_value(&self) -> i32 {
        compute_hash(&self.value.map(|v| v.to_string()).unwrap_or_default())
    }
}

impl fmt::Display for FloatProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(v) => write!(f, "{}", v),
            None => f.write_str("None"),
        }
    }
}

// ============================================================================
// DateProperty
// ============================================================================

/// A nullable UTC timestamp, serialized as RFC 3339 with milliseconds
///
/// Values are truncated to whole milliseconds when set.
#[derive(Debug, Clone, PartialEq)]
pub struct DateProperty {
    pub meta: PropertyMeta,
    value: Option<DateTime<Utc>>,
}

impl DateProperty {
    pub fn new(meta: PropertyMeta) -> Self {
        Self { meta, value: None }
    }

    pub fn value(&self) -> Option<DateTime<Utc>> {
        self.value
    }

    pub fn set_value(&mut self, value: Option<DateTime<Utc>>) {
        self.value = value.map(|v| v.trunc_subsecs(3));
    }

    /// Set the value from an RFC 3339 string or epoch milliseconds
    pub fn set_json(&mut self, value: &Value) {
        let parsed = match value {
            Value::String(s) => match DateTime::parse_from_rfc3339(s) {
                Ok(date) => Some(date.with_timezone(&Utc)),
                Err(e) => {
                    tracing::warn!("Ignoring invalid date '{}' for '{}': {}", s, self.meta.id, e);
                    None
                }
            },
            Value::Number(n) => n
                .as_i64()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            _ => None,
        };
        self.set_value(parsed);
    }

    pub fn is_defined(&self) -> bool {
        self.value.is_some()
    }

    fn iso(&self) -> Option<String> {
        self.value
            .map(|v| v.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn to_json(&self) -> Value {
        self.iso().map(Value::String).unwrap_or(Value::Null)
    }

    pub fn hash_value(&self) -> i32 {
        compute_hash(&self.iso().unwrap_or_default())
    }
}

impl fmt::Display for DateProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.iso() {
            Some(v) => f.write_str(&v),
            None => f.write_str("None"),
        }
    }
}

// ============================================================================
// EnumProperty
// ============================================================================

/// A nullable key into a shared list of options
///
/// Options are built once per descriptor by the factory and shared by every
/// enum created from that descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumProperty {
    pub meta: PropertyMeta,
    options: Arc<ListProperty>,
    value: Option<String>,
}

impl EnumProperty {
    pub fn new(meta: PropertyMeta, options: Arc<ListProperty>) -> Self {
        Self {
            meta,
            options,
            value: None,
        }
    }

    /// The shared option list
    pub fn options(&self) -> &Arc<ListProperty> {
        &self.options
    }

    /// The selected option key
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Select an option; keys that are not options clear the value
    pub fn set_value(&mut self, value: Option<&str>) {
        self.value = value
            .filter(|key| self.options.contains(key))
            .map(str::to_string);
    }

    pub fn set_json(&mut self, value: &Value) {
        self.set_value(value.as_str());
    }

    pub fn is_defined(&self) -> bool {
        self.value.is_some()
    }

    pub fn to_json(&self) -> Value {
        self.value.clone().map(Value::String).unwrap_or(Value::Null)
    }

    pub fn hash_value(&self) -> i32 {
        match &self.value {
            Some(v) => compute_hash(&format!("v:{}", v)),
            None => compute_hash(""),
        }
    }
}

impl fmt::Display for EnumProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value.as_deref().and_then(|key| self.options.get(key)) {
            Some(option) => write!(f, "{}", option),
            None => f.write_str("None"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
