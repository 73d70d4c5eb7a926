//! The structured side of the codec: records and their field values.

mod value;

use std::ops::Index;

use indexmap::{IndexMap, map};
use serde::Serialize;

pub use self::value::Value;

/// An ordered mapping from field name to [`Value`].
///
/// Decoded records keep the field order of the schema they were decoded with. Equality ignores
/// field order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a field, returning the previous value if the field was already present.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    /// Returns the value of `field`.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Removes `field`, preserving the order of the remaining fields.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.shift_remove(field)
    }

    /// Returns `true` if the record contains `field`.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// The number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over the fields in order.
    pub fn iter(&self) -> map::Iter<'_, String, Value> {
        self.fields.iter()
    }

    /// Iterates over the field names in order.
    pub fn keys(&self) -> map::Keys<'_, String, Value> {
        self.fields.keys()
    }

    /// Consumes the record, returning its fields.
    pub fn into_fields(self) -> IndexMap<String, Value> {
        self.fields
    }
}

impl Index<&str> for Record {
    type Output = Value;

    fn index(&self, field: &str) -> &Value {
        &self.fields[field]
    }
}

impl From<IndexMap<String, Value>> for Record {
    fn from(fields: IndexMap<String, Value>) -> Self {
        Self { fields }
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.fields)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Value);
    type IntoIter = map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl TryFrom<serde_json::Value> for Record {
    type Error = serde_json::Value;

    /// Converts a JSON object into a record, handing back any other JSON value unchanged.
    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Object(object) => Ok(object.into_iter().collect()),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn equality_ignores_field_order() {
        let left = Record::from_iter([("foo", Value::from("hello")), ("bar", Value::from(10))]);
        let right = Record::from_iter([("bar", Value::from(10)), ("foo", Value::from("hello"))]);

        assert_eq!(left, right);
        assert_eq!(left.keys().collect::<Vec<_>>(), ["foo", "bar"]);
    }

    #[test]
    fn remove_keeps_order() {
        let mut record = Record::from_iter([("a", 1), ("b", 2), ("c", 3)]);

        assert_eq!(record.remove("b"), Some(Value::Integer(2)));
        assert_eq!(record.keys().collect::<Vec<_>>(), ["a", "c"]);
        assert!(!record.contains("b"));
    }

    #[test]
    fn from_json_object() {
        let record = Record::try_from(json!({"foo": "hi", "bar": 1})).unwrap();

        assert_eq!(record["foo"], Value::from("hi"));
        assert_eq!(record["bar"], Value::Integer(1));
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn from_json_rejects_non_objects() {
        let rejected = Record::try_from(json!([1, 2])).unwrap_err();

        assert_eq!(rejected, json!([1, 2]));
    }
}
