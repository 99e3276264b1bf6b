// Record - one stored entity of a resource

mod value;

pub use value::Value;

use crate::error::{MockbaseError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the identifier column every resource declares first.
pub const ID_COLUMN: &str = "id";

/// A single entity: a key-sorted mapping from column name to value.
///
/// Records handed out by a store are always copies, so mutating one never
/// touches stored state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The record's identifier.
    ///
    /// Stored records always carry one; an error here means a record was
    /// built without going through validation.
    pub fn id(&self) -> Result<u64> {
        match self.fields.get(ID_COLUMN) {
            Some(value) => value.as_id().ok_or_else(|| {
                MockbaseError::MalformedRecord(format!(
                    "id must be a non-negative integer, got {}",
                    value.unique_key()
                ))
            }),
            None => Err(MockbaseError::MalformedRecord(format!(
                "record has no id: {}",
                self.to_json()
            ))),
        }
    }

    /// An independent deep copy of this record.
    pub fn copy(&self) -> Record {
        self.clone()
    }

    /// Build a record from a JSON object, as received from a request body or
    /// the command line.
    pub fn from_json(json: serde_json::Value) -> Result<Record> {
        match json {
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| Value::from_json(&k, v).map(|v| (k, v)))
                .collect(),
            other => Err(MockbaseError::Validation(format!(
                "a record must be a JSON object, got {other}"
            ))),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    /// Sort records ascending by id. Records without a valid id sort first.
    pub fn sort_by_id(records: &mut [Record]) {
        records.sort_by_key(|r| r.id().ok());
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Record {
            fields: iter.into_iter().collect(),
        }
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.fields)
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(json: serde_json::Value) -> Record {
        Record::from_json(json).unwrap()
    }

    #[test]
    fn test_id() {
        assert_eq!(record(json!({ "id": 4, "name": "Frank" })).id().unwrap(), 4);
    }

    #[test]
    fn test_missing_id_is_an_error() {
        let err = record(json!({ "name": "Frank" })).id().unwrap_err();
        assert!(matches!(err, MockbaseError::MalformedRecord(_)));
    }

    #[test]
    fn test_non_numeric_id_is_an_error() {
        let err = record(json!({ "id": "4" })).id().unwrap_err();
        assert!(matches!(err, MockbaseError::MalformedRecord(_)));
    }

    #[test]
    fn test_copy_is_independent() {
        let original = record(json!({ "id": 1, "tags": ["a"] }));
        let mut copy = original.copy();
        copy.set("tags", Value::Array(vec![]));
        assert_eq!(original.get("tags"), Some(&Value::Array(vec![Value::from("a")])));
    }

    #[test]
    fn test_from_json_requires_object() {
        assert!(Record::from_json(json!([1, 2])).is_err());
    }

    #[test]
    fn test_sort_by_id() {
        let mut records = vec![
            record(json!({ "id": 3 })),
            record(json!({ "id": 1 })),
            record(json!({ "id": 2 })),
        ];
        Record::sort_by_id(&mut records);
        let ids: Vec<u64> = records.iter().map(|r| r.id().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_to_json_round_trip() {
        let json = json!({ "id": 1, "name": "Frank", "age": 22.5, "admin": false });
        assert_eq!(record(json.clone()).to_json(), json);
    }
}
