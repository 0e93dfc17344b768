use std::collections::HashSet;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json_bytes::ByteString;

use crate::cache::CacheKey;
use crate::error::DecodingError;
use crate::json_ext::Object;
use crate::json_ext::Value;

/// A value of a [`DataDict`].
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Scalar(Value),
    Null,
    Object(DataDict),
    List(Vec<DataValue>),
}

impl DataValue {
    pub fn to_json(&self) -> Value {
        match self {
            DataValue::Scalar(value) => value.clone(),
            DataValue::Null => Value::Null,
            DataValue::Object(dict) => dict.to_json(),
            DataValue::List(values) => {
                Value::Array(values.iter().map(DataValue::to_json).collect())
            }
        }
    }

    pub fn as_object(&self) -> Option<&DataDict> {
        match self {
            DataValue::Object(dict) => Some(dict),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut DataDict> {
        match self {
            DataValue::Object(dict) => Some(dict),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[DataValue]> {
        match self {
            DataValue::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            DataValue::Scalar(value) => Some(value),
            _ => None,
        }
    }
}

impl From<Value> for DataValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => DataValue::Null,
            other => DataValue::Scalar(other),
        }
    }
}

/// The materialized result of executing a selection set on one object.
///
/// Next to the field values, it remembers which fragments were merged in and which are still
/// waiting for an incremental delivery, and the key of the record the object was read from.
#[derive(Debug, Clone, Default)]
pub struct DataDict {
    pub data: IndexMap<String, DataValue>,
    /// `None` for objects built locally.
    pub cache_key: Option<CacheKey>,
    pub fulfilled_fragments: HashSet<String>,
    pub deferred_fragments: HashSet<String>,
}

// Equality ignores the record key.
impl PartialEq for DataDict {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
            && self.fulfilled_fragments == other.fulfilled_fragments
            && self.deferred_fragments == other.deferred_fragments
    }
}

impl DataDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, response_key: &str) -> Option<&DataValue> {
        self.data.get(response_key)
    }

    pub fn get_mut(&mut self, response_key: &str) -> Option<&mut DataValue> {
        self.data.get_mut(response_key)
    }

    pub fn set(&mut self, response_key: impl Into<String>, value: impl Into<DataValue>) {
        self.data.insert(response_key.into(), value.into());
    }

    /// Whether the fragment (a fragment name, an inline fragment `...on Type` or a defer
    /// label) was merged into this object.
    pub fn fulfills(&self, identifier: &str) -> bool {
        self.fulfilled_fragments.contains(identifier)
    }

    pub fn is_deferred(&self, identifier: &str) -> bool {
        self.deferred_fragments.contains(identifier)
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.to_object())
    }

    pub fn to_object(&self) -> Object {
        self.data
            .iter()
            .map(|(key, value)| (ByteString::from(key.as_str()), value.to_json()))
            .collect()
    }

    /// Deserializes the data into `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, DecodingError> {
        serde_json_bytes::from_value(self.to_json()).map_err(|err| {
            DecodingError::CouldNotConvert {
                value: err.to_string(),
                expected: std::any::type_name::<T>().to_string(),
            }
        })
    }
}

impl From<DataDict> for DataValue {
    fn from(dict: DataDict) -> Self {
        DataValue::Object(dict)
    }
}

/// Types that can be built from the root [`DataDict`] of an operation.
pub trait FromDataDict: Sized {
    fn from_data_dict(dict: DataDict) -> Result<Self, DecodingError>;
}

impl FromDataDict for DataDict {
    fn from_data_dict(dict: DataDict) -> Result<Self, DecodingError> {
        Ok(dict)
    }
}

impl FromDataDict for Value {
    fn from_data_dict(dict: DataDict) -> Result<Self, DecodingError> {
        Ok(dict.to_json())
    }
}
