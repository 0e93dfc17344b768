use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde_json_bytes::ByteString;

use crate::json_ext::Object;
use crate::json_ext::Value;

/// The identity of a [`Record`].
pub type CacheKey = String;

pub const QUERY_ROOT: &str = "QUERY_ROOT";
pub const MUTATION_ROOT: &str = "MUTATION_ROOT";
pub const SUBSCRIPTION_ROOT: &str = "SUBSCRIPTION_ROOT";

const REFERENCE_KEY: &str = "$reference";

/// A pointer from a record field to another record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheReference(pub CacheKey);

impl CacheReference {
    pub fn new(key: impl Into<CacheKey>) -> Self {
        Self(key.into())
    }

    pub fn key(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-> #{}", self.0)
    }
}

/// A value stored in a record field.
///
/// Nested objects are never stored in place: they are records of their own, pointed at by a
/// [`CacheReference`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    Scalar(Value),
    Null,
    Reference(CacheReference),
    List(Vec<RecordValue>),
}

impl RecordValue {
    pub fn reference(key: impl Into<CacheKey>) -> Self {
        RecordValue::Reference(CacheReference::new(key))
    }

    /// Converts to JSON, with references encoded as `{"$reference": key}`.
    pub fn to_json(&self) -> Value {
        match self {
            RecordValue::Scalar(value) => value.clone(),
            RecordValue::Null => Value::Null,
            RecordValue::Reference(reference) => {
                let mut object = Object::new();
                object.insert(
                    ByteString::from(REFERENCE_KEY),
                    Value::String(reference.key().into()),
                );
                Value::Object(object)
            }
            RecordValue::List(values) => {
                Value::Array(values.iter().map(RecordValue::to_json).collect())
            }
        }
    }

    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => RecordValue::Null,
            Value::Array(values) => {
                RecordValue::List(values.into_iter().map(RecordValue::from_json).collect())
            }
            Value::Object(object) if object.len() == 1 => {
                match object.get(REFERENCE_KEY).and_then(|key| key.as_str()) {
                    Some(key) => RecordValue::reference(key),
                    None => RecordValue::Scalar(Value::Object(object)),
                }
            }
            other => RecordValue::Scalar(other),
        }
    }
}

impl From<Value> for RecordValue {
    fn from(value: Value) -> Self {
        RecordValue::from_json(value)
    }
}

impl From<CacheReference> for RecordValue {
    fn from(reference: CacheReference) -> Self {
        RecordValue::Reference(reference)
    }
}

impl Serialize for RecordValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RecordValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(RecordValue::from_json)
    }
}

/// A flat entity of the normalized cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: CacheKey,
    pub fields: IndexMap<String, RecordValue>,
}

impl Record {
    pub fn new(key: impl Into<CacheKey>) -> Self {
        Self {
            key: key.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<RecordValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&RecordValue> {
        self.fields.get(field)
    }

    /// Merges `other` into this record, last write wins per field.
    ///
    /// Returns the changed keys: one per field whose value differs from the stored one, as
    /// `<record key>.<field storage key>`.
    pub(crate) fn merge(&mut self, other: Record) -> HashSet<CacheKey> {
        let mut changed_keys = HashSet::new();
        for (field, value) in other.fields {
            if self.fields.get(&field) != Some(&value) {
                changed_keys.insert(format!("{}.{}", self.key, field));
                self.fields.insert(field, value);
            }
        }
        changed_keys
    }

    /// The changed keys of a record that did not exist before: every one of its fields.
    pub(crate) fn field_keys(&self) -> HashSet<CacheKey> {
        self.fields
            .keys()
            .map(|field| format!("{}.{}", self.key, field))
            .collect()
    }
}

/// Records produced by one normalization, indexed by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordSet {
    records: IndexMap<CacheKey, Record>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record, merging it with a record of the same key already in the set.
    pub fn insert(&mut self, record: Record) {
        match self.records.get_mut(&record.key) {
            Some(existing) => {
                existing.merge(record);
            }
            None => {
                self.records.insert(record.key.clone(), record);
            }
        }
    }

    pub fn merge(&mut self, other: RecordSet) {
        for record in other.into_iter() {
            self.insert(record);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        self.records.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.records.keys()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }
}

impl IntoIterator for RecordSet {
    type Item = Record;
    type IntoIter = indexmap::map::IntoValues<CacheKey, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_values()
    }
}

impl FromIterator<Record> for RecordSet {
    fn from_iter<T: IntoIterator<Item = Record>>(iter: T) -> Self {
        let mut set = RecordSet::new();
        for record in iter {
            set.insert(record);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn references_serialize_as_tagged_objects() {
        let record = Record::new(QUERY_ROOT)
            .with_field("hero", CacheReference::new("Character:2001"))
            .with_field(
                "heroes",
                RecordValue::List(vec![
                    RecordValue::reference("Character:2001"),
                    RecordValue::Null,
                ]),
            )
            .with_field("count", json!(2));

        let serialized = serde_json::to_value(&record).unwrap();
        assert_eq!(
            serialized,
            serde_json::json!({
                "key": "QUERY_ROOT",
                "fields": {
                    "hero": { "$reference": "Character:2001" },
                    "heroes": [{ "$reference": "Character:2001" }, null],
                    "count": 2
                }
            })
        );

        let deserialized: Record = serde_json::from_value(serialized).unwrap();
        assert_eq!(deserialized, record);
    }

    #[test]
    fn record_merge_reports_changed_fields() {
        let mut record = Record::new("Character:2001")
            .with_field("name", json!("R2-D2"))
            .with_field("__typename", json!("Droid"));

        let changed = record.merge(
            Record::new("Character:2001")
                .with_field("name", json!("Artoo"))
                .with_field("__typename", json!("Droid")),
        );

        assert_eq!(
            changed,
            HashSet::from(["Character:2001.name".to_string()])
        );
        assert_eq!(record.get("name"), Some(&RecordValue::Scalar(json!("Artoo"))));
    }
}
