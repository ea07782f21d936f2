use std::collections::BTreeMap;

use crate::firestore::model::FieldPath;
use crate::firestore::value::{FirestoreValue, ValueKind};

/// String-keyed record. Keys iterate in sorted order, which keeps encoded
/// documents and update masks deterministic.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MapValue {
    fields: BTreeMap<String, FirestoreValue>,
}

impl MapValue {
    pub fn new(fields: BTreeMap<String, FirestoreValue>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &BTreeMap<String, FirestoreValue> {
        &self.fields
    }

    pub fn into_fields(self) -> BTreeMap<String, FirestoreValue> {
        self.fields
    }

    pub fn get(&self, key: &str) -> Option<&FirestoreValue> {
        self.fields.get(key)
    }

    /// Walks nested maps segment by segment.
    pub fn get_path(&self, path: &FieldPath) -> Option<&FirestoreValue> {
        let (first, rest) = path.segments().split_first()?;
        let mut current = self.fields.get(first)?;
        for segment in rest {
            match current.kind() {
                ValueKind::Map(map) => current = map.fields.get(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: FirestoreValue) -> Option<FirestoreValue> {
        self.fields.insert(key.into(), value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<MapValue> for FirestoreValue {
    fn from(map: MapValue) -> Self {
        FirestoreValue::from_kind(ValueKind::Map(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_map_entries() {
        let mut map = BTreeMap::new();
        map.insert("foo".to_string(), FirestoreValue::from_integer(1));
        let value = MapValue::new(map.clone());
        assert_eq!(value.get("foo"), map.get("foo"));
        assert_eq!(value.len(), 1);
    }

    #[test]
    fn resolves_nested_paths() {
        let mut inner = MapValue::default();
        inner.insert("city", FirestoreValue::from_string("Oslo"));
        let mut outer = MapValue::default();
        outer.insert("address", inner.into());
        outer.insert("age", FirestoreValue::from_integer(3));

        let city = FieldPath::from_dot_separated("address.city").unwrap();
        assert_eq!(outer.get_path(&city).and_then(|v| v.as_str()), Some("Oslo"));
        let through_leaf = FieldPath::from_dot_separated("age.years").unwrap();
        assert!(outer.get_path(&through_leaf).is_none());
    }
}
