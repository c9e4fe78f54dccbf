//! Tuple properties and the value-combination index

use super::{Property, PropertyMeta, ValueCombination, collection_hash, entries_json, parse_entries};
use indexmap::{IndexMap, IndexSet};
use openchart_core::{ChartError, ChartResult};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Valid values per field
pub type ValidValues = IndexMap<String, IndexSet<String>>;

// ============================================================================
// CombinationIndex
// ============================================================================

/// Lookup table of which field values may appear together
///
/// Built once from a list of `[field_1, value_1, field_2, value_2]`
/// combinations. Each registered `(field, value)` pair gets a slot, and
/// each slot lists the slots it was paired with.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CombinationIndex {
    props: ValidValues,
    slots: IndexMap<(String, String), usize>,
    lookup: Vec<Vec<usize>>,
}

impl CombinationIndex {
    /// Compile a combination list
    pub fn new(combinations: &[ValueCombination]) -> Self {
        let mut index = Self::default();
        for [field_1, value_1, field_2, value_2] in combinations {
            let a = index.register(field_1, value_1);
            let b = index.register(field_2, value_2);
            index.lookup[a].push(b);
            index.lookup[b].push(a);
        }
        index
    }

    fn register(&mut self, field: &str, value: &str) -> usize {
        self.props
            .entry(field.to_string())
            .or_default()
            .insert(value.to_string());
        let key = (field.to_string(), value.to_string());
        if let Some(slot) = self.slots.get(&key) {
            return *slot;
        }
        let slot = self.slots.len();
        self.slots.insert(key, slot);
        self.lookup.push(Vec::new());
        slot
    }

    /// Whether `field` takes part in any combination
    pub fn has_field(&self, field: &str) -> bool {
        self.props.contains_key(field)
    }

    /// Whether `value` is registered for `field`
    pub fn has_value(&self, field: &str, value: &str) -> bool {
        self.props
            .get(field)
            .is_some_and(|values| values.contains(value))
    }

    /// Every registered value per field
    pub fn all_options(&self) -> &ValidValues {
        &self.props
    }

    /// Valid options for each registered field, given the fields already set
    ///
    /// A set field constrains every other field to the values it was paired
    /// with, and leaves its own options untouched. Constraints from several
    /// set fields are intersected. Unregistered values impose no constraint.
    pub fn valid_options(&self, values: &IndexMap<String, String>) -> ValidValues {
        if values.is_empty() {
            return self.props.clone();
        }
        let mut related: IndexMap<(&str, usize), IndexSet<&str>> = IndexMap::new();
        let mut constraints = Vec::new();
        for (n, (field, value)) in values.iter().enumerate() {
            let Some(slot) = self.slots.get(&(field.clone(), value.clone())) else {
                continue;
            };
            constraints.push((n, field.as_str()));
            for rel in &self.lookup[*slot] {
                if let Some(((rel_field, rel_value), _)) = self.slots.get_index(*rel) {
                    related
                        .entry((rel_field.as_str(), n))
                        .or_default()
                        .insert(rel_value.as_str());
                }
            }
        }

        let mut result = ValidValues::new();
        for (prop, all) in &self.props {
            let mut valid = all.clone();
            for (n, field) in &constraints {
                if field == prop {
                    continue;
                }
                valid = match related.get(&(prop.as_str(), *n)) {
                    Some(set) => valid.into_iter().filter(|v| set.contains(v.as_str())).collect(),
                    None => IndexSet::new(),
                };
            }
            result.insert(prop.clone(), valid);
        }
        result
    }
}

// ============================================================================
// TupleProperty
// ============================================================================

/// A fixed, ordered set of atomic fields
///
/// When built with a combination index, string and enum fields are kept
/// consistent with it: a field left with a single valid option is filled in
/// and an enum whose value falls out of the valid set is cleared.
#[derive(Debug, Clone, PartialEq)]
pub struct TupleProperty {
    pub meta: PropertyMeta,
    fields: IndexMap<String, Property>,
    representative_key: Option<String>,
    combinations: Option<Arc<CombinationIndex>>,
    valid_values: Option<ValidValues>,
}

impl TupleProperty {
    pub fn new(meta: PropertyMeta, combinations: Option<Arc<CombinationIndex>>) -> Self {
        let valid_values = combinations
            .as_ref()
            .map(|index| index.all_options().clone());
        Self {
            meta,
            fields: IndexMap::new(),
            representative_key: None,
            combinations,
            valid_values,
        }
    }

    /// Add a field while building the tuple
    pub(crate) fn insert_field(
        &mut self,
        id: &str,
        property: Property,
        representative: bool,
    ) -> ChartResult<()> {
        if property.is_collection() {
            return Err(ChartError::UnsupportedTupleField(property.kind_name().to_string()));
        }
        if representative {
            self.representative_key = Some(id.to_string());
        }
        self.fields.insert(id.to_string(), property);
        Ok(())
    }

    /// The shared combination index, if any
    pub fn combinations(&self) -> Option<&Arc<CombinationIndex>> {
        self.combinations.as_ref()
    }

    /// Valid values per field under the current state
    pub fn valid_values(&self) -> Option<&ValidValues> {
        self.valid_values.as_ref()
    }

    pub fn representative_key(&self) -> Option<&str> {
        self.representative_key.as_deref()
    }

    pub fn get(&self, id: &str) -> Option<&Property> {
        self.fields.get(id)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Property)> {
        self.fields.iter()
    }

    /// Set one field, then realign the other fields
    ///
    /// String values that the index does not register for a constrained
    /// field are rejected.
    pub fn set_field(&mut self, id: &str, value: &Value) -> ChartResult<()> {
        if let (Some(index), Some(text)) = (&self.combinations, value.as_str()) {
            if index.has_field(id) && !index.has_value(id, text) {
                return Err(ChartError::InvalidCombination {
                    field: id.to_string(),
                    value: text.to_string(),
                });
            }
        }
        let owner = self.meta.id.clone();
        let field = self
            .fields
            .get_mut(id)
            .ok_or_else(|| ChartError::PropertyNotFound {
                owner,
                property: id.to_string(),
            })?;
        field.apply_json(value)?;
        self.align(Some(id));
        Ok(())
    }

    /// Apply ordered entries to the fields; unknown ids are ignored
    ///
    /// Field values are taken as given. Only the valid values are
    /// recomputed, so a field left empty stays empty.
    pub fn set_json(&mut self, value: &Value) -> ChartResult<()> {
        if value.is_null() {
            return Ok(());
        }
        for (id, v) in parse_entries(value)? {
            if let Some(field) = self.fields.get_mut(id) {
                field.apply_json(v)?;
            }
        }
        self.refresh_valid_values();
        Ok(())
    }

    fn refresh_valid_values(&mut self) {
        if let Some(index) = &self.combinations {
            self.valid_values = Some(index.valid_options(&self.current_values()));
        }
    }

    fn current_values(&self) -> IndexMap<String, String> {
        self.fields
            .iter()
            .filter_map(|(id, prop)| {
                let value = match prop {
                    Property::String(p) => p.value(),
                    Property::Enum(p) => p.value(),
                    _ => None,
                };
                value.map(|v| (id.clone(), v.to_string()))
            })
            .collect()
    }

    fn align(&mut self, changed: Option<&str>) {
        let Some(index) = self.combinations.clone() else {
            return;
        };
        let valid = index.valid_options(&self.current_values());
        for (id, options) in &valid {
            if changed == Some(id.as_str()) {
                continue;
            }
            let Some(prop) = self.fields.get_mut(id) else {
                continue;
            };
            let only = (options.len() == 1).then(|| options[0].as_str());
            match prop {
                Property::String(p) => {
                    if let Some(option) = only {
                        p.set_value(Some(option));
                    }
                }
                Property::Enum(p) => {
                    if let Some(option) = only {
                        p.set_value(Some(option));
                    }
                    if p.value().is_some_and(|v| !options.contains(v)) {
                        p.set_value(None);
                    }
                }
                _ => {}
            }
        }
        self.refresh_valid_values();
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

impl fmt::Display for TupleProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self
            .fields
            .values()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&text)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{ListProperty, StringProperty};
    use crate::property::EnumProperty;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn combo(a: &str, b: &str, c: &str, d: &str) -> ValueCombination {
        [a.to_string(), b.to_string(), c.to_string(), d.to_string()]
    }

    fn attack_index() -> CombinationIndex {
        CombinationIndex::new(&[
            combo("tactic", "TA0001", "technique", "T1566"),
            combo("tactic", "TA0001", "technique", "T1078"),
            combo("tactic", "TA0004", "technique", "T1078"),
            combo("tactic", "TA0002", "technique", "T1059"),
        ])
    }

    fn values(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn options(valid: &ValidValues, field: &str) -> Vec<String> {
        let mut list: Vec<String> = valid[field].iter().cloned().collect();
        list.sort();
        list
    }

    fn string_field(id: &str) -> Property {
        Property::String(StringProperty::new(PropertyMeta::new(id), vec![]))
    }

    fn attack_tuple() -> TupleProperty {
        let mut tuple = TupleProperty::new(
            PropertyMeta::new("attack"),
            Some(Arc::new(attack_index())),
        );
        tuple.insert_field("tactic", string_field("tactic"), true).unwrap();
        tuple.insert_field("technique", string_field("technique"), false).unwrap();
        tuple
    }

    #[test]
    fn test_valid_options_without_values() {
        let index = attack_index();
        let valid = index.valid_options(&IndexMap::new());
        assert_eq!(options(&valid, "tactic"), vec!["TA0001", "TA0002", "TA0004"]);
        assert_eq!(options(&valid, "technique"), vec!["T1059", "T1078", "T1566"]);
    }

    #[test]
    fn test_valid_options_constrain_other_fields() {
        let index = attack_index();
        let valid = index.valid_options(&values(&[("technique", "T1078")]));
        assert_eq!(options(&valid, "tactic"), vec!["TA0001", "TA0004"]);
        assert_eq!(options(&valid, "technique"), vec!["T1059", "T1078", "T1566"]);

        let valid = index.valid_options(&values(&[("tactic", "TA0002")]));
        assert_eq!(options(&valid, "technique"), vec!["T1059"]);
    }

    #[test]
    fn test_valid_options_intersect_constraints() {
        let index = attack_index();
        let valid = index.valid_options(&values(&[("tactic", "TA0001"), ("technique", "T1566")]));
        assert_eq!(options(&valid, "tactic"), vec!["TA0001"]);
        assert_eq!(options(&valid, "technique"), vec!["T1078", "T1566"]);
    }

    #[test]
    fn test_valid_options_skip_unregistered_values() {
        let index = attack_index();
        let valid = index.valid_options(&values(&[("tactic", "TA9999")]));
        assert_eq!(valid, index.all_options().clone());
    }

    #[test]
    fn test_set_field_fills_single_option() {
        let mut tuple = attack_tuple();
        tuple.set_field("tactic", &json!("TA0002")).unwrap();
        assert_eq!(tuple.get("technique").unwrap().to_json(), json!("T1059"));
        assert_eq!(tuple.to_string(), "TA0002, T1059");
        assert_eq!(
            tuple.to_json(),
            json!([["tactic", "TA0002"], ["technique", "T1059"]])
        );
    }

    #[test]
    fn test_cleared_field_survives_reload() {
        let mut tuple = attack_tuple();
        tuple.set_field("tactic", &json!("TA0002")).unwrap();
        tuple.set_field("technique", &Value::Null).unwrap();
        let exported = tuple.to_json();
        assert_eq!(exported, json!([["tactic", "TA0002"], ["technique", null]]));

        let mut reloaded = attack_tuple();
        reloaded.set_json(&exported).unwrap();
        assert_eq!(reloaded.to_json(), exported);
        assert_eq!(reloaded, tuple);
        assert_eq!(options(reloaded.valid_values().unwrap(), "technique"), vec!["T1059"]);
    }

    #[test]
    fn test_set_field_rejects_unregistered_value() {
        let mut tuple = attack_tuple();
        let err = tuple.set_field("tactic", &json!("TA9999")).unwrap_err();
        assert!(matches!(err, ChartError::InvalidCombination { .. }));
        assert!(!tuple.is_defined());
    }

    #[test]
    fn test_enum_field_cleared_when_invalid() {
        let mut list = ListProperty::new(
            PropertyMeta::new("technique.options"),
            string_field("technique.options"),
        );
        for key in ["T1566", "T1078", "T1059"] {
            list.insert_json(key, &json!(key)).unwrap();
        }
        let mut tuple = TupleProperty::new(
            PropertyMeta::new("attack"),
            Some(Arc::new(attack_index())),
        );
        tuple.insert_field("tactic", string_field("tactic"), false).unwrap();
        tuple
            .insert_field(
                "technique",
                Property::Enum(EnumProperty::new(PropertyMeta::new("technique"), Arc::new(list))),
                false,
            )
            .unwrap();

        tuple.set_field("technique", &json!("T1566")).unwrap();
        assert_eq!(tuple.get("tactic").unwrap().to_json(), json!("TA0001"));

        tuple.set_field("tactic", &json!("TA0004")).unwrap();
        assert_eq!(tuple.get("technique").unwrap().to_json(), json!("T1078"));
    }

    #[test]
    fn test_tuple_rejects_collection_fields() {
        let mut tuple = TupleProperty::new(PropertyMeta::new("pair"), None);
        let list = Property::List(ListProperty::new(
            PropertyMeta::new("items"),
            string_field("items"),
        ));
        let err = tuple.insert_field("items", list, false).unwrap_err();
        assert!(matches!(err, ChartError::UnsupportedTupleField(_)));
    }

    #[test]
    fn test_tuple_without_index_accepts_any_value() {
        let mut tuple = TupleProperty::new(PropertyMeta::new("pair"), None);
        tuple.insert_field("a", string_field("a"), false).unwrap();
        tuple.insert_field("b", string_field("b"), false).unwrap();
        tuple.set_json(&json!([["a", "x"], ["b", "y"]])).unwrap();
        assert!(tuple.valid_values().is_none());
        assert_eq!(tuple.to_string(), "x, y");
    }
}
