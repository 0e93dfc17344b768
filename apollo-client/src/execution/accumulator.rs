use std::collections::HashSet;
use std::mem;

use serde::Deserialize;
use serde::Serialize;

use super::DataDict;
use super::DataValue;
use super::FieldExecutionInfo;
use super::ObjectExecutionInfo;
use crate::cache::CacheKey;
use crate::cache::Record;
use crate::cache::RecordSet;
use crate::cache::RecordValue;
use crate::error::DecodingError;
use crate::error::ExecutionError;
use crate::json_ext::Value;

/// Builds a result out of the traversal of the executor.
///
/// The executor completes each field value bottom-up: leaves through `accept_scalar`,
/// `accept_null` and `accept_missing_value`, lists through `accept_list`, nested objects
/// through `accept_child_object`. Completed fields become entries, and the entries of an object
/// become an object result. The root object result is turned into the final result by
/// `finish`.
pub trait ResultAccumulator: Send {
    type PartialResult: Send;
    type FieldEntry: Send;
    type ObjectResult: Send;
    type FinalResult;

    fn accept_scalar(
        &mut self,
        value: Value,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, ExecutionError>;

    fn accept_null(
        &mut self,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, ExecutionError>;

    /// Called when the source has no value for a field. `None` drops the field.
    fn accept_missing_value(
        &mut self,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Option<Self::PartialResult>, ExecutionError>;

    fn accept_list(
        &mut self,
        list: Vec<Self::PartialResult>,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, ExecutionError>;

    fn accept_child_object(
        &mut self,
        object: Self::ObjectResult,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, ExecutionError>;

    fn accept_field_entry(
        &mut self,
        value: Self::PartialResult,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Option<Self::FieldEntry>, ExecutionError>;

    fn accept_field_entries(
        &mut self,
        entries: Vec<Self::FieldEntry>,
        info: &ObjectExecutionInfo,
    ) -> Result<Self::ObjectResult, ExecutionError>;

    fn finish(
        &mut self,
        root: Self::ObjectResult,
        info: &ObjectExecutionInfo,
    ) -> Result<Self::FinalResult, ExecutionError>;
}

/// What to do when a source has no value for a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValuePolicy {
    /// Any missing value fails the execution.
    #[default]
    Disallow,
    /// Missing values of nullable fields read as `null`, non-null fields still fail.
    AllowForOptionalFields,
    /// Missing values are left out of the result.
    AllowForAllFields,
}

/// Builds [`DataDict`]s.
#[derive(Debug, Default)]
pub struct DataDictMapper {
    policy: MissingValuePolicy,
}

impl DataDictMapper {
    pub fn new(policy: MissingValuePolicy) -> Self {
        Self { policy }
    }
}

impl ResultAccumulator for DataDictMapper {
    type PartialResult = DataValue;
    type FieldEntry = (String, DataValue);
    type ObjectResult = DataDict;
    type FinalResult = DataDict;

    fn accept_scalar(
        &mut self,
        value: Value,
        _info: &FieldExecutionInfo<'_>,
    ) -> Result<DataValue, ExecutionError> {
        Ok(DataValue::Scalar(value))
    }

    fn accept_null(
        &mut self,
        _info: &FieldExecutionInfo<'_>,
    ) -> Result<DataValue, ExecutionError> {
        Ok(DataValue::Null)
    }

    fn accept_missing_value(
        &mut self,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Option<DataValue>, ExecutionError> {
        match self.policy {
            MissingValuePolicy::AllowForAllFields => Ok(None),
            MissingValuePolicy::AllowForOptionalFields if !info.field.field_type.is_non_null() => {
                Ok(Some(DataValue::Null))
            }
            _ => Err(ExecutionError::decoding(
                &info.response_path,
                DecodingError::MissingValue,
            )),
        }
    }

    fn accept_list(
        &mut self,
        list: Vec<DataValue>,
        _info: &FieldExecutionInfo<'_>,
    ) -> Result<DataValue, ExecutionError> {
        Ok(DataValue::List(list))
    }

    fn accept_child_object(
        &mut self,
        object: DataDict,
        _info: &FieldExecutionInfo<'_>,
    ) -> Result<DataValue, ExecutionError> {
        Ok(DataValue::Object(object))
    }

    fn accept_field_entry(
        &mut self,
        value: DataValue,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Option<(String, DataValue)>, ExecutionError> {
        Ok(Some((info.field.response_key().to_string(), value)))
    }

    fn accept_field_entries(
        &mut self,
        entries: Vec<(String, DataValue)>,
        info: &ObjectExecutionInfo,
    ) -> Result<DataDict, ExecutionError> {
        Ok(DataDict {
            data: entries.into_iter().collect(),
            cache_key: Some(info.cache_key.clone()),
            fulfilled_fragments: info.fulfilled_fragments.clone(),
            deferred_fragments: info.deferred_fragments.clone(),
        })
    }

    fn finish(
        &mut self,
        root: DataDict,
        _info: &ObjectExecutionInfo,
    ) -> Result<DataDict, ExecutionError> {
        Ok(root)
    }
}

/// Collects the cache paths a traversal read from.
#[derive(Debug, Default)]
pub struct DependencyTracker {
    dependent_keys: HashSet<CacheKey>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn track(&mut self, info: &FieldExecutionInfo<'_>) {
        self.dependent_keys.insert(info.cache_path.clone());
    }
}

impl ResultAccumulator for DependencyTracker {
    type PartialResult = ();
    type FieldEntry = ();
    type ObjectResult = ();
    type FinalResult = HashSet<CacheKey>;

    fn accept_scalar(
        &mut self,
        _value: Value,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<(), ExecutionError> {
        self.track(info);
        Ok(())
    }

    fn accept_null(&mut self, info: &FieldExecutionInfo<'_>) -> Result<(), ExecutionError> {
        self.track(info);
        Ok(())
    }

    fn accept_missing_value(
        &mut self,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Option<()>, ExecutionError> {
        // A write of the missing field must reach the readers that missed it
        self.track(info);
        Ok(Some(()))
    }

    fn accept_list(
        &mut self,
        _list: Vec<()>,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<(), ExecutionError> {
        self.track(info);
        Ok(())
    }

    fn accept_child_object(
        &mut self,
        _object: (),
        _info: &FieldExecutionInfo<'_>,
    ) -> Result<(), ExecutionError> {
        Ok(())
    }

    fn accept_field_entry(
        &mut self,
        _value: (),
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Option<()>, ExecutionError> {
        self.track(info);
        Ok(Some(()))
    }

    fn accept_field_entries(
        &mut self,
        _entries: Vec<()>,
        _info: &ObjectExecutionInfo,
    ) -> Result<(), ExecutionError> {
        Ok(())
    }

    fn finish(
        &mut self,
        _root: (),
        _info: &ObjectExecutionInfo,
    ) -> Result<HashSet<CacheKey>, ExecutionError> {
        Ok(mem::take(&mut self.dependent_keys))
    }
}

/// Splits a result into records, one per object, nested objects becoming references.
#[derive(Debug, Default)]
pub struct ResultNormalizer {
    records: RecordSet,
}

impl ResultNormalizer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultAccumulator for ResultNormalizer {
    type PartialResult = RecordValue;
    type FieldEntry = (String, RecordValue);
    type ObjectResult = CacheKey;
    type FinalResult = RecordSet;

    fn accept_scalar(
        &mut self,
        value: Value,
        _info: &FieldExecutionInfo<'_>,
    ) -> Result<RecordValue, ExecutionError> {
        Ok(RecordValue::Scalar(value))
    }

    fn accept_null(
        &mut self,
        _info: &FieldExecutionInfo<'_>,
    ) -> Result<RecordValue, ExecutionError> {
        Ok(RecordValue::Null)
    }

    fn accept_missing_value(
        &mut self,
        _info: &FieldExecutionInfo<'_>,
    ) -> Result<Option<RecordValue>, ExecutionError> {
        // Nothing to write, the stored value if any is kept
        Ok(None)
    }

    fn accept_list(
        &mut self,
        list: Vec<RecordValue>,
        _info: &FieldExecutionInfo<'_>,
    ) -> Result<RecordValue, ExecutionError> {
        Ok(RecordValue::List(list))
    }

    fn accept_child_object(
        &mut self,
        object: CacheKey,
        _info: &FieldExecutionInfo<'_>,
    ) -> Result<RecordValue, ExecutionError> {
        Ok(RecordValue::reference(object))
    }

    fn accept_field_entry(
        &mut self,
        value: RecordValue,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Option<(String, RecordValue)>, ExecutionError> {
        Ok(Some((info.storage_key.clone(), value)))
    }

    fn accept_field_entries(
        &mut self,
        entries: Vec<(String, RecordValue)>,
        info: &ObjectExecutionInfo,
    ) -> Result<CacheKey, ExecutionError> {
        self.records.insert(Record {
            key: info.cache_key.clone(),
            fields: entries.into_iter().collect(),
        });
        Ok(info.cache_key.clone())
    }

    fn finish(
        &mut self,
        _root: CacheKey,
        _info: &ObjectExecutionInfo,
    ) -> Result<RecordSet, ExecutionError> {
        Ok(mem::take(&mut self.records))
    }
}

/// Runs two accumulators in one traversal.
#[derive(Debug, Default)]
pub struct Zip2Accumulator<A, B> {
    first: A,
    second: B,
}

impl<A, B> Zip2Accumulator<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A, B> ResultAccumulator for Zip2Accumulator<A, B>
where
    A: ResultAccumulator,
    B: ResultAccumulator,
{
    type PartialResult = (A::PartialResult, B::PartialResult);
    type FieldEntry = (Option<A::FieldEntry>, Option<B::FieldEntry>);
    type ObjectResult = (A::ObjectResult, B::ObjectResult);
    type FinalResult = (A::FinalResult, B::FinalResult);

    fn accept_scalar(
        &mut self,
        value: Value,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, ExecutionError> {
        Ok((
            self.first.accept_scalar(value.clone(), info)?,
            self.second.accept_scalar(value, info)?,
        ))
    }

    fn accept_null(
        &mut self,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, ExecutionError> {
        Ok((self.first.accept_null(info)?, self.second.accept_null(info)?))
    }

    fn accept_missing_value(
        &mut self,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Option<Self::PartialResult>, ExecutionError> {
        let first = self.first.accept_missing_value(info)?;
        let second = self.second.accept_missing_value(info)?;
        Ok(first.zip(second))
    }

    fn accept_list(
        &mut self,
        list: Vec<Self::PartialResult>,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, ExecutionError> {
        let (first, second) = list.into_iter().unzip();
        Ok((
            self.first.accept_list(first, info)?,
            self.second.accept_list(second, info)?,
        ))
    }

    fn accept_child_object(
        &mut self,
        (first, second): Self::ObjectResult,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, ExecutionError> {
        Ok((
            self.first.accept_child_object(first, info)?,
            self.second.accept_child_object(second, info)?,
        ))
    }

    fn accept_field_entry(
        &mut self,
        (first, second): Self::PartialResult,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Option<Self::FieldEntry>, ExecutionError> {
        Ok(Some((
            self.first.accept_field_entry(first, info)?,
            self.second.accept_field_entry(second, info)?,
        )))
    }

    fn accept_field_entries(
        &mut self,
        entries: Vec<Self::FieldEntry>,
        info: &ObjectExecutionInfo,
    ) -> Result<Self::ObjectResult, ExecutionError> {
        let (first, second): (Vec<_>, Vec<_>) = entries.into_iter().unzip();
        Ok((
            self.first
                .accept_field_entries(first.into_iter().flatten().collect(), info)?,
            self.second
                .accept_field_entries(second.into_iter().flatten().collect(), info)?,
        ))
    }

    fn finish(
        &mut self,
        (first, second): Self::ObjectResult,
        info: &ObjectExecutionInfo,
    ) -> Result<Self::FinalResult, ExecutionError> {
        Ok((self.first.finish(first, info)?, self.second.finish(second, info)?))
    }
}
