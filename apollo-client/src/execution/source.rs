use std::collections::HashSet;
use std::sync::Arc;

use super::DataDict;
use super::DataValue;
use super::PossiblyDeferred;
use crate::cache::CacheKey;
use crate::cache::DataLoader;
use crate::cache::NormalizedCache;
use crate::cache::Record;
use crate::cache::RecordValue;
use crate::error::ExecutionError;
use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::spec::Field;
use crate::spec::FieldType;
use crate::spec::Schema;
use crate::spec::TYPENAME;

/// A field value as found in a source, before it is completed against the selection.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue<O> {
    Null,
    Scalar(Value),
    Object(O),
    List(Vec<ResolvedValue<O>>),
}

/// Where the executor reads field values from.
pub trait ExecutionSource: Send + Sync {
    type RawObject: Send + Sync;

    /// Resolves `field` on `object`. `None` means the source has no value for the field.
    ///
    /// Implementations may return a deferred value to batch loads. The returned value must
    /// not borrow `object`.
    fn resolve_field<'s>(
        &'s self,
        object: &Self::RawObject,
        field: &Field,
        storage_key: &str,
    ) -> PossiblyDeferred<'s, Option<ResolvedValue<Self::RawObject>>>;

    /// The runtime type of `object`, when the source knows it.
    fn typename(&self, object: &Self::RawObject) -> Option<String>;

    /// The identity of `object`, `None` to fall back to a key derived from its path.
    ///
    /// `typename` is the runtime type of the object, or its declared type when the runtime type
    /// is unknown.
    fn compute_cache_key(&self, object: &Self::RawObject, typename: &str) -> Option<CacheKey>;

    /// Whether the selections deferred under `label` can be executed now.
    fn should_attempt_deferred_fragment_execution(&self, label: &str) -> bool;
}

/// Reads from the `data` of a response.
pub struct JsonSource<'a> {
    schema: &'a Schema,
    delivered_labels: Option<HashSet<String>>,
}

impl<'a> JsonSource<'a> {
    /// A source where only the deferred fragments in `delivered_labels` have arrived.
    pub fn new(schema: &'a Schema, delivered_labels: HashSet<String>) -> Self {
        Self {
            schema,
            delivered_labels: Some(delivered_labels),
        }
    }

    /// A source holding complete data, e.g. an object built locally.
    pub fn complete(schema: &'a Schema) -> Self {
        Self {
            schema,
            delivered_labels: None,
        }
    }

    fn resolve_value(
        value: &Value,
        field_type: &FieldType,
        composite: bool,
    ) -> ResolvedValue<Object> {
        match (value, field_type.nullable()) {
            (Value::Null, _) => ResolvedValue::Null,
            (Value::Array(values), FieldType::List(inner)) => ResolvedValue::List(
                values
                    .iter()
                    .map(|value| Self::resolve_value(value, inner, composite))
                    .collect(),
            ),
            (Value::Object(object), _) if composite => ResolvedValue::Object(object.clone()),
            (other, _) => ResolvedValue::Scalar(other.clone()),
        }
    }
}

impl ExecutionSource for JsonSource<'_> {
    type RawObject = Object;

    fn resolve_field<'s>(
        &'s self,
        object: &Object,
        field: &Field,
        _storage_key: &str,
    ) -> PossiblyDeferred<'s, Option<ResolvedValue<Object>>> {
        PossiblyDeferred::immediate(object.get(field.response_key()).map(|value| {
            Self::resolve_value(value, &field.field_type, field.selection_set.is_some())
        }))
    }

    fn typename(&self, object: &Object) -> Option<String> {
        object
            .get(TYPENAME)
            .and_then(|typename| typename.as_str())
            .map(str::to_string)
    }

    fn compute_cache_key(&self, object: &Object, typename: &str) -> Option<CacheKey> {
        self.schema.cache_key(typename, object)
    }

    fn should_attempt_deferred_fragment_execution(&self, label: &str) -> bool {
        self.delivered_labels
            .as_ref()
            .map(|labels| labels.contains(label))
            .unwrap_or(true)
    }
}

/// Reads from the records of a normalized cache, loading referenced records in batches.
pub struct CacheSource<'a> {
    cache: &'a dyn NormalizedCache,
    loader: &'a DataLoader,
}

impl<'a> CacheSource<'a> {
    pub(crate) fn new(cache: &'a dyn NormalizedCache, loader: &'a DataLoader) -> Self {
        Self { cache, loader }
    }

    /// Loads the record for `key` through the transaction loader.
    pub(crate) async fn load_root(
        &self,
        key: &str,
    ) -> Result<Option<Arc<Record>>, ExecutionError> {
        self.loader
            .load(self.cache, key)
            .await
            .map_err(|error| ExecutionError::Loading {
                reason: error.to_string(),
            })
    }

    fn resolve_value<'s>(
        &'s self,
        value: &RecordValue,
    ) -> PossiblyDeferred<'s, Option<ResolvedValue<Arc<Record>>>> {
        match value {
            RecordValue::Null => PossiblyDeferred::immediate(Some(ResolvedValue::Null)),
            RecordValue::Scalar(value) => {
                PossiblyDeferred::immediate(Some(ResolvedValue::Scalar(value.clone())))
            }
            RecordValue::Reference(reference) => {
                let key = reference.key().to_string();
                self.loader.enqueue(&key);
                PossiblyDeferred::deferred(async move {
                    // A dangling reference reads as a missing value
                    Ok(self.load_root(&key).await?.map(ResolvedValue::Object))
                })
            }
            RecordValue::List(values) => {
                let values = values.iter().map(|value| self.resolve_value(value)).collect();
                super::lazily_evaluate_all(values).map(|values| {
                    values
                        .into_iter()
                        .collect::<Option<Vec<_>>>()
                        .map(ResolvedValue::List)
                })
            }
        }
    }
}

impl ExecutionSource for CacheSource<'_> {
    type RawObject = Arc<Record>;

    fn resolve_field<'s>(
        &'s self,
        object: &Arc<Record>,
        _field: &Field,
        storage_key: &str,
    ) -> PossiblyDeferred<'s, Option<ResolvedValue<Arc<Record>>>> {
        match object.get(storage_key) {
            Some(value) => self.resolve_value(value),
            None => PossiblyDeferred::immediate(None),
        }
    }

    fn typename(&self, object: &Arc<Record>) -> Option<String> {
        match object.get(TYPENAME) {
            Some(RecordValue::Scalar(Value::String(typename))) => {
                Some(typename.as_str().to_string())
            }
            _ => None,
        }
    }

    fn compute_cache_key(&self, object: &Arc<Record>, _typename: &str) -> Option<CacheKey> {
        Some(object.key.clone())
    }

    fn should_attempt_deferred_fragment_execution(&self, _label: &str) -> bool {
        true
    }
}

/// Reads back [`DataDict`]s, e.g. data changed by a cache update.
///
/// Objects read from the cache keep the key of their record, the others are identified by the
/// schema.
pub struct DataDictSource<'a> {
    schema: &'a Schema,
}

impl<'a> DataDictSource<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    fn resolve_value(value: &DataValue, composite: bool) -> ResolvedValue<DataDict> {
        match value {
            DataValue::Null => ResolvedValue::Null,
            DataValue::Object(dict) => ResolvedValue::Object(dict.clone()),
            DataValue::List(values) => ResolvedValue::List(
                values
                    .iter()
                    .map(|value| Self::resolve_value(value, composite))
                    .collect(),
            ),
            DataValue::Scalar(value) => Self::resolve_json(value, composite),
        }
    }

    // Values set as plain JSON by an update
    fn resolve_json(value: &Value, composite: bool) -> ResolvedValue<DataDict> {
        match value {
            Value::Null => ResolvedValue::Null,
            Value::Array(values) => ResolvedValue::List(
                values
                    .iter()
                    .map(|value| Self::resolve_json(value, composite))
                    .collect(),
            ),
            Value::Object(object) if composite => {
                let mut dict = DataDict::new();
                for (key, value) in object {
                    dict.set(key.as_str(), value.clone());
                }
                ResolvedValue::Object(dict)
            }
            other => ResolvedValue::Scalar(other.clone()),
        }
    }
}

impl ExecutionSource for DataDictSource<'_> {
    type RawObject = DataDict;

    fn resolve_field<'s>(
        &'s self,
        object: &DataDict,
        field: &Field,
        _storage_key: &str,
    ) -> PossiblyDeferred<'s, Option<ResolvedValue<DataDict>>> {
        PossiblyDeferred::immediate(
            object
                .get(field.response_key())
                .map(|value| Self::resolve_value(value, field.selection_set.is_some())),
        )
    }

    fn typename(&self, object: &DataDict) -> Option<String> {
        object
            .get(TYPENAME)
            .and_then(DataValue::as_scalar)
            .and_then(|typename| typename.as_str())
            .map(str::to_string)
    }

    fn compute_cache_key(&self, object: &DataDict, typename: &str) -> Option<CacheKey> {
        object
            .cache_key
            .clone()
            .or_else(|| self.schema.cache_key(typename, &object.to_object()))
    }

    fn should_attempt_deferred_fragment_execution(&self, _label: &str) -> bool {
        true
    }
}
