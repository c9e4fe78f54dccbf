//! Collection properties: list, dictionary and root

use super::{Property, PropertyMeta, collection_hash, entries_json, parse_entries};
use indexmap::IndexMap;
use openchart_core::{ChartError, ChartResult};
use serde_json::Value;
use std::fmt;
use std::ops::{Deref, DerefMut};

// ============================================================================
// ListProperty
// ============================================================================

/// An ordered list of properties built from one shared prototype
///
/// Items are keyed by an id assigned at insertion, never by position, so
/// reordering does not re-key them.
#[derive(Debug, Clone, PartialEq)]
pub struct ListProperty {
    pub meta: PropertyMeta,
    /// Minimum number of items expected by validation
    pub min_items: Option<usize>,
    template: Box<Property>,
    items: IndexMap<String, Property>,
}

impl ListProperty {
    /// Create an empty list whose items are cloned from `template`
    pub fn new(meta: PropertyMeta, template: Property) -> Self {
        Self {
            meta,
            min_items: None,
            template: Box::new(template),
            items: IndexMap::new(),
        }
    }

    /// The prototype every item is cloned from
    pub fn template(&self) -> &Property {
        &self.template
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Property> {
        self.items.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Property> {
        self.items.get_mut(id)
    }

    /// Iterate over `(id, item)` pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Property)> {
        self.items.iter()
    }

    /// Position of an item
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.items.get_index_of(id)
    }

    /// Append a fresh item cloned from the template, returning its id
    pub fn add_item(&mut self) -> String {
        let id = self.next_id();
        let item = self.new_item(&id);
        self.items.insert(id.clone(), item);
        id
    }

    /// Insert a fresh item at `index`, returning its id
    pub fn insert_item(&mut self, index: usize) -> String {
        let id = self.next_id();
        let item = self.new_item(&id);
        let index = index.min(self.items.len());
        self.items.shift_insert(index, id.clone(), item);
        id
    }

    /// Append an item with a known id and value
    ///
    /// An existing item with the same id is replaced in place.
    pub fn insert_json(&mut self, id: &str, value: &Value) -> ChartResult<()> {
        let mut item = self.new_item(id);
        item.apply_json(value)?;
        self.items.insert(id.to_string(), item);
        Ok(())
    }

    /// Remove an item, returning it
    pub fn remove_item(&mut self, id: &str) -> Option<Property> {
        self.items.shift_remove(id)
    }

    /// Move an item to `index`
    pub fn move_item(&mut self, id: &str, index: usize) -> ChartResult<()> {
        let from = self
            .items
            .get_index_of(id)
            .ok_or_else(|| ChartError::PropertyNotFound {
                owner: self.meta.id.clone(),
                property: id.to_string(),
            })?;
        let to = index.min(self.items.len().saturating_sub(1));
        self.items.move_index(from, to);
        Ok(())
    }

    /// Generate an id not used by any item
    pub fn next_id(&self) -> String {
        loop {
            let id = uuid::Uuid::new_v4().simple().to_string();
            if !self.items.contains_key(&id) {
                return id;
            }
        }
    }

    fn new_item(&self, id: &str) -> Property {
        let mut item = (*self.template).clone();
        item.meta_mut().id = id.to_string();
        item
    }

    /// Replace all items with the given entries; `null` clears the list
    pub fn set_json(&mut self, value: &Value) -> ChartResult<()> {
        if value.is_null() {
            self.items.clear();
            return Ok(());
        }
        let entries = parse_entries(value)?;
        self.items.clear();
        for (id, v) in entries {
            self.insert_json(id, v)?;
        }
        Ok(())
    }

    pub fn is_defined(&self) -> bool {
        !self.items.is_empty()
    }

    pub fn to_json(&self) -> Value {
        entries_json(self.items.iter())
    }

    pub fn hash_value(&self) -> i32 {
        collection_hash(self.items.values())
    }
}

impl fmt::Display for ListProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.items.is_empty() {
            return f.write_str("None");
        }
        let text = self
            .items
            .values()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&text)
    }
}

// ============================================================================
// DictionaryProperty
// ============================================================================

/// A fixed set of named fields
///
/// Fields are decided by the descriptor when the dictionary is created;
/// only their values change afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct DictionaryProperty {
    pub meta: PropertyMeta,
    fields: IndexMap<String, Property>,
    representative_key: Option<String>,
}

impl DictionaryProperty {
    pub fn new(meta: PropertyMeta) -> Self {
        Self {
            meta,
            fields: IndexMap::new(),
            representative_key: None,
        }
    }

    /// Add a field while building the dictionary
    pub(crate) fn insert_field(&mut self, id: &str, property: Property, representative: bool) {
        if representative {
            self.representative_key = Some(id.to_string());
        }
        self.fields.insert(id.to_string(), property);
    }

    /// Key of the field used as the display value
    pub fn representative_key(&self) -> Option<&str> {
        self.representative_key.as_deref()
    }

    /// The field used as the display value
    pub fn representative(&self) -> Option<&Property> {
        self.representative_key
            .as_deref()
            .and_then(|key| self.fields.get(key))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Property> {
        self.fields.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Property> {
        self.fields.get_mut(id)
    }

    /// Iterate over `(id, field)` pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Property)> {
        self.fields.iter()
    }

    /// Field ids in declaration order
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    /// Set one field from JSON
    pub fn set(&mut self, id: &str, value: &Value) -> ChartResult<()> {
        let owner = self.meta.id.clone();
        let field = self
            .fields
            .get_mut(id)
            .ok_or_else(|| ChartError::PropertyNotFound {
                owner,
                property: id.to_string(),
            })?;
        field.apply_json(value)
    }

    /// Apply ordered entries; ids that are not fields are ignored
    pub fn set_json(&mut self, value: &Value) -> ChartResult<()> {
        if value.is_null() {
            return Ok(());
        }
        for (id, v) in parse_entries(value)? {
            match self.fields.get_mut(id) {
                Some(field) => field.apply_json(v)?,
                None => tracing::debug!("Ignoring unknown field '{}' in '{}'", id, self.meta.id),
            }
        }
        Ok(())
    }

    /// Defined when any field is defined
    pub fn is_defined(&self) -> bool {
        self.fields.values().any(Property::is_defined)
    }

    pub fn to_json(&self) -> Value {
        entries_json(self.fields.iter())
    }

    pub fn hash_value(&self) -> i32 {
        collection_hash(self.fields.values())
    }
}

impl fmt::Display for DictionaryProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.representative() {
            Some(p) => write!(f, "{}", p),
            None => f.write_str("None"),
        }
    }
}

// ============================================================================
// RootProperty
// ============================================================================

/// The top-level property container of a diagram object
///
/// Behaves like a dictionary whose fields exactly match the template's
/// descriptors. It is never nested inside another property.
#[derive(Debug, Clone, PartialEq)]
pub struct RootProperty(DictionaryProperty);

impl RootProperty {
    pub(crate) fn new(dictionary: DictionaryProperty) -> Self {
        Self(dictionary)
    }

    /// Ordered `[id, json]` entries, as written to exports
    pub fn to_entries(&self) -> Vec<(String, Value)> {
        self.0
            .iter()
            .map(|(id, p)| (id.clone(), p.to_json()))
            .collect()
    }
}

impl Default for RootProperty {
    fn default() -> Self {
        Self(DictionaryProperty::new(PropertyMeta::new("root")))
    }
}

impl Deref for RootProperty {
    type Target = DictionaryProperty;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for RootProperty {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl fmt::Display for RootProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{IntProperty, StringProperty};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn string_list() -> ListProperty {
        ListProperty::new(
            PropertyMeta::new("aliases"),
            Property::String(StringProperty::new(PropertyMeta::new("aliases"), vec![])),
        )
    }

    fn sample_dictionary() -> DictionaryProperty {
        let mut dict = DictionaryProperty::new(PropertyMeta::new("details"));
        dict.insert_field(
            "name",
            Property::String(StringProperty::new(PropertyMeta::new("name"), vec![])),
            true,
        );
        dict.insert_field(
            "size",
            Property::Int(IntProperty::new(PropertyMeta::new("size"), Some(0.0), Some(10.0))),
            false,
        );
        dict
    }

    #[test]
    fn test_list_items_are_independent_of_template() {
        let mut list = string_list();
        let first = list.add_item();
        let second = list.add_item();
        assert_eq!(list.len(), 2);
        assert_eq!(first.len(), 32);

        list.get_mut(&first)
            .unwrap()
            .apply_json(&json!("APT29"))
            .unwrap();

        assert!(list.get(&first).unwrap().is_defined());
        assert!(!list.get(&second).unwrap().is_defined());
        assert!(!list.template().is_defined());
        assert_eq!(list.get(&first).unwrap().id(), first);
    }

    #[test]
    fn test_list_json_round_trip_keeps_ids() {
        let mut list = string_list();
        let value = json!([["a1", "Cozy Bear"], ["b2", "The Dukes"]]);
        list.set_json(&value).unwrap();
        assert_eq!(list.to_json(), value);
        assert_eq!(list.to_string(), "Cozy Bear, The Dukes");
    }

    #[test]
    fn test_list_reorder_does_not_rekey() {
        let mut list = string_list();
        list.set_json(&json!([["a", "1"], ["b", "2"], ["c", "3"]]))
            .unwrap();
        list.move_item("c", 0).unwrap();
        assert_eq!(list.index_of("c"), Some(0));
        assert_eq!(list.to_json(), json!([["c", "3"], ["a", "1"], ["b", "2"]]));

        let inserted = list.insert_item(1);
        assert_eq!(list.index_of(&inserted), Some(1));
        assert!(list.remove_item("a").is_some());
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_list_rejects_non_entries() {
        let mut list = string_list();
        let err = list.set_json(&json!({"a": 1})).unwrap_err();
        assert!(matches!(err, ChartError::InvalidJsonEntries(_)));
    }

    #[test]
    fn test_empty_list_is_undefined() {
        let mut list = string_list();
        assert!(!list.is_defined());
        list.add_item();
        assert!(list.is_defined());
    }

    #[test]
    fn test_dictionary_representative_display() {
        let mut dict = sample_dictionary();
        assert_eq!(dict.to_string(), "None");
        dict.set_json(&json!([["name", "Small Block"], ["size", 5], ["ghost", 1]]))
            .unwrap();
        assert_eq!(dict.representative_key(), Some("name"));
        assert_eq!(dict.to_string(), "Small Block");
        assert_eq!(dict.to_json(), json!([["name", "Small Block"], ["size", 5]]));
    }

    #[test]
    fn test_dictionary_set_unknown_field() {
        let mut dict = sample_dictionary();
        let err = dict.set("ghost", &json!(1)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_dictionary_hash_tracks_content() {
        let mut dict = sample_dictionary();
        let before = dict.hash_value();
        dict.set("size", &json!(3)).unwrap();
        assert_ne!(before, dict.hash_value());
        dict.set("size", &Value::Null).unwrap();
        assert_eq!(before, dict.hash_value());
    }

    #[test]
    fn test_root_property_entries() {
        let root = RootProperty::new(sample_dictionary());
        let entries = root.to_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], ("name".to_string(), Value::Null));
        assert!(!root.is_defined());
    }
}
