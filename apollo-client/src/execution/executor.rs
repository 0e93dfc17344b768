use std::collections::HashSet;

use futures::future::BoxFuture;
use indexmap::IndexMap;

use super::ExecutionSource;
use super::PossiblyDeferred;
use super::ResolvedValue;
use super::ResultAccumulator;
use crate::cache::field_storage_key;
use crate::cache::CacheKey;
use crate::error::DecodingError;
use crate::error::ExecutionError;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;
use crate::spec::Field;
use crate::spec::FieldType;
use crate::spec::Schema;
use crate::spec::Selection;
use crate::spec::SelectionSet;

/// The execution context of one field, or of one element of a list field.
#[derive(Debug, Clone)]
pub struct FieldExecutionInfo<'a> {
    /// The first field of the group of fields sharing this response key.
    pub field: &'a Field,
    pub storage_key: String,
    pub response_path: Path,
    /// `<key of the enclosing record>.<storage key>`, with `.<index>` appended for list
    /// elements. Objects without an identity are stored under this key.
    pub cache_path: CacheKey,
}

impl FieldExecutionInfo<'_> {
    fn element(&self, index: usize) -> Self {
        Self {
            field: self.field,
            storage_key: self.storage_key.clone(),
            response_path: self.response_path.join(index),
            cache_path: format!("{}.{}", self.cache_path, index),
        }
    }
}

/// The execution context of one object.
#[derive(Debug, Clone)]
pub struct ObjectExecutionInfo {
    /// The declared type of the field this object was selected on.
    pub parent_type: String,
    /// The runtime type, if the source knows it.
    pub typename: Option<String>,
    pub cache_key: CacheKey,
    pub response_path: Path,
    pub fulfilled_fragments: HashSet<String>,
    pub deferred_fragments: HashSet<String>,
}

impl ObjectExecutionInfo {
    fn new(
        parent_type: String,
        typename: Option<String>,
        cache_key: CacheKey,
        path: Path,
    ) -> Self {
        Self {
            parent_type,
            typename,
            cache_key,
            response_path: path,
            fulfilled_fragments: HashSet::new(),
            deferred_fragments: HashSet::new(),
        }
    }

    fn runtime_type(&self) -> &str {
        self.typename.as_deref().unwrap_or(&self.parent_type)
    }

    fn fulfill(&mut self, identifier: &str) {
        self.deferred_fragments.remove(identifier);
        self.fulfilled_fragments.insert(identifier.to_string());
    }

    fn defer(&mut self, identifier: &str) {
        if !self.fulfilled_fragments.contains(identifier) {
            self.deferred_fragments.insert(identifier.to_string());
        }
    }
}

/// An object whose fields were resolved but not awaited yet.
struct PreparedObject<'a, S: ExecutionSource> {
    info: ObjectExecutionInfo,
    fields: Vec<PreparedField<'a, S>>,
}

struct PreparedField<'a, S: ExecutionSource> {
    /// The fields sharing a response key, never empty.
    fields: Vec<&'a Field>,
    storage_key: String,
    value: PossiblyDeferred<'a, Option<ResolvedValue<S::RawObject>>>,
}

enum PreparedValue<'a, S: ExecutionSource> {
    Null,
    Scalar(Value),
    List(Vec<PreparedValue<'a, S>>),
    Object(PreparedObject<'a, S>),
}

/// Walks a selection set over the data of an [`ExecutionSource`], handing every value to a
/// [`ResultAccumulator`].
pub struct GraphQLExecutor<'e, S> {
    source: &'e S,
    schema: &'e Schema,
    variables: &'e Object,
}

impl<'e, S> GraphQLExecutor<'e, S>
where
    S: ExecutionSource,
{
    pub fn new(source: &'e S, schema: &'e Schema, variables: &'e Object) -> Self {
        Self {
            source,
            schema,
            variables,
        }
    }

    /// Executes `selection_set` on `root`, the object stored under `root_key`.
    #[tracing::instrument(skip_all, level = "trace", fields(root_key = %root_key))]
    pub async fn execute<A>(
        &self,
        selection_set: &SelectionSet,
        root: S::RawObject,
        root_key: &str,
        accumulator: &mut A,
    ) -> Result<A::FinalResult, ExecutionError>
    where
        A: ResultAccumulator,
    {
        let root = self.prepare_object(
            selection_set.selections.iter().collect(),
            selection_set.parent_type.clone(),
            root,
            root_key.to_string(),
            Path::empty(),
        );
        let (object, info) = self.complete_object(root, accumulator).await?;
        accumulator.finish(object, &info)
    }

    /// Resolves the fields of `object` without awaiting them, so that sources can queue the
    /// loads of a whole level.
    fn prepare_object<'a>(
        &'a self,
        selections: Vec<&'a Selection>,
        parent_type: String,
        object: S::RawObject,
        cache_key: CacheKey,
        path: Path,
    ) -> PreparedObject<'a, S> {
        let typename = self.source.typename(&object);
        let mut info = ObjectExecutionInfo::new(parent_type, typename, cache_key, path);
        let mut groups: IndexMap<&str, Vec<&Field>> = IndexMap::new();
        self.collect_fields(selections, &mut info, &mut groups);

        let fields = groups
            .into_values()
            .filter_map(|fields| {
                let field = *fields.first()?;
                let storage_key = field_storage_key(field, self.variables);
                let value = self.source.resolve_field(&object, field, &storage_key);
                Some(PreparedField {
                    fields,
                    storage_key,
                    value,
                })
            })
            .collect();
        PreparedObject { info, fields }
    }

    fn complete_object<'a, A>(
        &'a self,
        object: PreparedObject<'a, S>,
        accumulator: &'a mut A,
    ) -> BoxFuture<'a, Result<(A::ObjectResult, ObjectExecutionInfo), ExecutionError>>
    where
        A: ResultAccumulator + 'a,
    {
        Box::pin(async move {
            let PreparedObject { info, fields } = object;

            // Every child object is prepared before any of them is completed: the loads they
            // queue go out in one batch.
            let mut prepared = Vec::with_capacity(fields.len());
            for PreparedField {
                fields,
                storage_key,
                value,
            } in fields
            {
                let Some(&field) = fields.first() else {
                    continue;
                };
                let field_info = FieldExecutionInfo {
                    field,
                    response_path: info.response_path.join(field.response_key()),
                    cache_path: format!("{}.{}", info.cache_key, storage_key),
                    storage_key,
                };
                let value = match value.get().await? {
                    Some(value) => {
                        Some(self.prepare_value(value, &field.field_type, &fields, &field_info)?)
                    }
                    None => None,
                };
                prepared.push((field_info, value));
            }

            let mut entries = Vec::with_capacity(prepared.len());
            for (field_info, value) in prepared {
                let partial = match value {
                    Some(value) => Some(
                        self.complete_value(value, field_info.clone(), accumulator)
                            .await?,
                    ),
                    None => accumulator.accept_missing_value(&field_info)?,
                };

                if let Some(partial) = partial {
                    if let Some(entry) = accumulator.accept_field_entry(partial, &field_info)? {
                        entries.push(entry);
                    }
                }
            }

            let object = accumulator.accept_field_entries(entries, &info)?;
            Ok((object, info))
        })
    }

    /// Checks `value` against `field_type` and prepares the objects it contains.
    fn prepare_value<'a>(
        &'a self,
        value: ResolvedValue<S::RawObject>,
        field_type: &'a FieldType,
        fields: &[&'a Field],
        info: &FieldExecutionInfo<'a>,
    ) -> Result<PreparedValue<'a, S>, ExecutionError> {
        let composite = info.field.selection_set.is_some();
        match value {
            ResolvedValue::Null => {
                if field_type.is_non_null() {
                    return Err(ExecutionError::decoding(
                        &info.response_path,
                        DecodingError::NullValue,
                    ));
                }
                Ok(PreparedValue::Null)
            }
            ResolvedValue::Scalar(value) => {
                let value = if composite {
                    Err(could_not_convert(&value, field_type))
                } else {
                    field_type.coerce_leaf(value)
                }
                .map_err(|error| ExecutionError::decoding(&info.response_path, error))?;
                Ok(PreparedValue::Scalar(value))
            }
            ResolvedValue::List(values) => {
                let FieldType::List(inner) = field_type.nullable() else {
                    return Err(ExecutionError::decoding(
                        &info.response_path,
                        DecodingError::CouldNotConvert {
                            value: "a list".to_string(),
                            expected: field_type.to_string(),
                        },
                    ));
                };

                values
                    .into_iter()
                    .enumerate()
                    .map(|(index, value)| {
                        self.prepare_value(value, inner, fields, &info.element(index))
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(PreparedValue::List)
            }
            ResolvedValue::Object(object) => {
                if !composite || matches!(field_type.nullable(), FieldType::List(_)) {
                    return Err(ExecutionError::decoding(
                        &info.response_path,
                        DecodingError::CouldNotConvert {
                            value: "an object".to_string(),
                            expected: field_type.to_string(),
                        },
                    ));
                }

                let declared_type = field_type.inner_type_name();
                let typename = self.source.typename(&object);
                let cache_key = self
                    .source
                    .compute_cache_key(&object, typename.as_deref().unwrap_or(&declared_type))
                    .unwrap_or_else(|| info.cache_path.clone());
                // Fields sharing a response key are merged, their selections run together
                let selections = fields
                    .iter()
                    .filter_map(|&field| field.selection_set.as_ref())
                    .flatten()
                    .collect();

                Ok(PreparedValue::Object(self.prepare_object(
                    selections,
                    declared_type,
                    object,
                    cache_key,
                    info.response_path.clone(),
                )))
            }
        }
    }

    fn complete_value<'a, A>(
        &'a self,
        value: PreparedValue<'a, S>,
        info: FieldExecutionInfo<'a>,
        accumulator: &'a mut A,
    ) -> BoxFuture<'a, Result<A::PartialResult, ExecutionError>>
    where
        A: ResultAccumulator + 'a,
    {
        Box::pin(async move {
            match value {
                PreparedValue::Null => accumulator.accept_null(&info),
                PreparedValue::Scalar(value) => accumulator.accept_scalar(value, &info),
                PreparedValue::List(values) => {
                    let mut list = Vec::with_capacity(values.len());
                    for (index, value) in values.into_iter().enumerate() {
                        let element = self
                            .complete_value(value, info.element(index), accumulator)
                            .await?;
                        list.push(element);
                    }
                    accumulator.accept_list(list, &info)
                }
                PreparedValue::Object(object) => {
                    let (child, _) = self.complete_object(object, accumulator).await?;
                    accumulator.accept_child_object(child, &info)
                }
            }
        })
    }

    /// Groups the fields of `selections` that apply to the object by response key, in
    /// document order.
    fn collect_fields<'a>(
        &self,
        selections: impl IntoIterator<Item = &'a Selection>,
        info: &mut ObjectExecutionInfo,
        groups: &mut IndexMap<&'a str, Vec<&'a Field>>,
    ) {
        for selection in selections {
            match selection {
                Selection::Field(field) => {
                    groups.entry(field.response_key()).or_default().push(field);
                }
                Selection::Conditional {
                    include_skip,
                    selections,
                } => {
                    if !include_skip.should_skip(self.variables) {
                        self.collect_fields(selections, info, groups);
                    }
                }
                Selection::FragmentSpread(fragment) => {
                    if self.applies(Some(&fragment.type_condition), info) {
                        info.fulfill(&fragment.name);
                        self.collect_fields(&fragment.selection_set, info, groups);
                    }
                }
                Selection::InlineFragment(fragment) => {
                    if self.applies(fragment.type_condition.as_deref(), info) {
                        info.fulfill(&fragment.identifier(&info.parent_type));
                        self.collect_fields(&fragment.selection_set, info, groups);
                    }
                }
                Selection::Deferred(fragment) => {
                    if !self.applies(fragment.type_condition.as_deref(), info) {
                        continue;
                    }
                    // `@defer(if: false)` selections are delivered with the rest
                    if fragment.condition.eval(self.variables) == Some(false) {
                        self.collect_fields(&fragment.selection_set, info, groups);
                    } else if self
                        .source
                        .should_attempt_deferred_fragment_execution(&fragment.label)
                    {
                        info.fulfill(&fragment.label);
                        self.collect_fields(&fragment.selection_set, info, groups);
                    } else {
                        info.defer(&fragment.label);
                    }
                }
            }
        }
    }

    fn applies(&self, type_condition: Option<&str>, info: &ObjectExecutionInfo) -> bool {
        match type_condition {
            None => true,
            Some(type_condition) => {
                type_condition == info.parent_type
                    || self
                        .schema
                        .matches_type_condition(type_condition, info.runtime_type())
            }
        }
    }
}

fn could_not_convert(value: &Value, field_type: &FieldType) -> DecodingError {
    DecodingError::CouldNotConvert {
        value: serde_json::to_string(value).unwrap_or_default(),
        expected: field_type.nullable().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use serde_json_bytes::json;

    use super::*;
    use crate::cache::CacheReference;
    use crate::cache::Record;
    use crate::cache::RecordValue;
    use crate::cache::QUERY_ROOT;
    use crate::error::DecodingError;
    use crate::execution::DataDict;
    use crate::execution::DataDictMapper;
    use crate::execution::DependencyTracker;
    use crate::execution::JsonSource;
    use crate::execution::MissingValuePolicy;
    use crate::execution::ResultNormalizer;
    use crate::execution::Zip2Accumulator;
    use crate::spec::CacheKeyInfo;
    use crate::spec::Fragment;
    use crate::spec::InputValue;

    fn schema() -> Schema {
        Schema::new()
            .with_possible_types("Character", ["Human", "Droid"])
            .with_cache_key_resolver(|_, object| {
                object
                    .get("id")
                    .and_then(|id| id.as_str())
                    .map(|id| CacheKeyInfo::new(id).with_group("Character"))
            })
    }

    fn object(value: Value) -> Object {
        value.as_object().cloned().unwrap_or_default()
    }

    fn hero_selection_set(hero_selections: Vec<Selection>) -> SelectionSet {
        SelectionSet::new(
            "Query",
            vec![Selection::Field(
                Field::new("hero", FieldType::named("Character"))
                    .with_argument("episode", InputValue::variable("episode"))
                    .with_selections(hero_selections),
            )],
        )
    }

    async fn map_json(
        selection_set: &SelectionSet,
        data: Value,
        variables: &Object,
        source: &JsonSource<'_>,
        policy: MissingValuePolicy,
    ) -> Result<DataDict, ExecutionError> {
        let schema = schema();
        let executor = GraphQLExecutor::new(source, &schema, variables);
        executor
            .execute(
                selection_set,
                object(data),
                QUERY_ROOT,
                &mut DataDictMapper::new(policy),
            )
            .await
    }

    #[tokio::test]
    async fn normalize_objects_with_and_without_identity() {
        let schema = schema();
        let source = JsonSource::complete(&schema);
        let variables = object(json!({ "episode": "JEDI" }));
        let selection_set = hero_selection_set(vec![
            Selection::typename(),
            Selection::field("id", FieldType::Id.non_null()),
            Selection::field("name", FieldType::String.non_null()),
            Selection::Field(
                Field::new("friends", FieldType::named("Character").list()).with_selections(
                    vec![
                        Selection::field("id", FieldType::Id.non_null()),
                        Selection::field("name", FieldType::String.non_null()),
                    ],
                ),
            ),
            Selection::Field(
                Field::new("stats", FieldType::named("Stats")).with_selections(vec![
                    Selection::field("height", FieldType::Float),
                ]),
            ),
        ]);
        let data = json!({
            "hero": {
                "__typename": "Droid",
                "id": "2001",
                "name": "R2-D2",
                "friends": [{ "id": "1000", "name": "Luke Skywalker" }, null],
                "stats": { "height": 1.09 }
            }
        });

        let executor = GraphQLExecutor::new(&source, &schema, &variables);
        let records = executor
            .execute(
                &selection_set,
                object(data),
                QUERY_ROOT,
                &mut ResultNormalizer::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            records.get(QUERY_ROOT),
            Some(
                &Record::new(QUERY_ROOT)
                    .with_field(
                        r#"hero(episode:"JEDI")"#,
                        CacheReference::new("Character:2001"),
                    )
            )
        );
        assert_eq!(
            records
                .get("Character:2001")
                .and_then(|record| record.get("friends")),
            Some(&RecordValue::List(vec![
                RecordValue::reference("Character:1000"),
                RecordValue::Null,
            ]))
        );
        assert_eq!(
            records
                .get("Character:2001")
                .and_then(|record| record.get("stats")),
            Some(&RecordValue::reference("Character:2001.stats"))
        );
        assert_eq!(
            records
                .get("Character:2001.stats")
                .and_then(|record| record.get("height")),
            Some(&RecordValue::Scalar(json!(1.09)))
        );
        assert_eq!(records.len(), 4);
    }

    #[tokio::test]
    async fn fragments_apply_by_runtime_type() {
        let schema = schema();
        let source = JsonSource::complete(&schema);
        let variables = object(json!({ "episode": "JEDI" }));
        let droid_details = Arc::new(Fragment::new(
            "DroidDetails",
            "Droid",
            vec![Selection::field("primaryFunction", FieldType::String)],
        ));
        let selection_set = hero_selection_set(vec![
            Selection::typename(),
            Selection::field("name", FieldType::String.non_null()),
            Selection::spread(&droid_details),
            Selection::inline(
                "Human",
                vec![Selection::field("height", FieldType::Float)],
            ),
            Selection::inline(
                "Character",
                vec![Selection::field("name", FieldType::String.non_null())],
            ),
        ]);
        let data = json!({
            "hero": { "__typename": "Droid", "name": "R2-D2", "primaryFunction": "Astromech" }
        });

        let result = map_json(
            &selection_set,
            data,
            &variables,
            &source,
            MissingValuePolicy::Disallow,
        )
        .await
        .unwrap();

        let hero = result.get("hero").and_then(|hero| hero.as_object()).unwrap();
        assert_eq!(
            hero.to_json(),
            json!({ "__typename": "Droid", "name": "R2-D2", "primaryFunction": "Astromech" })
        );
        assert!(hero.fulfills("DroidDetails"));
        assert!(hero.fulfills("...on Character"));
        assert!(!hero.fulfills("...on Human"));
    }

    #[tokio::test]
    async fn deferred_fragments_wait_for_their_label() {
        let schema = schema();
        let variables = object(json!({ "episode": "JEDI" }));
        let selection_set = hero_selection_set(vec![
            Selection::field("name", FieldType::String.non_null()),
            Selection::deferred(
                "heroFriends",
                None,
                vec![Selection::Field(
                    Field::new("friends", FieldType::named("Character").list())
                        .with_selections(vec![Selection::field("name", FieldType::String)]),
                )],
            ),
        ]);

        let initial = json!({ "hero": { "name": "R2-D2" } });
        let source = JsonSource::new(&schema, HashSet::new());
        let result = map_json(
            &selection_set,
            initial,
            &variables,
            &source,
            MissingValuePolicy::Disallow,
        )
        .await
        .unwrap();
        let hero = result.get("hero").and_then(|hero| hero.as_object()).unwrap();
        assert!(hero.is_deferred("heroFriends"));
        assert!(hero.get("friends").is_none());

        let merged = json!({ "hero": { "name": "R2-D2", "friends": [{ "name": "Luke" }] } });
        let source = JsonSource::new(&schema, HashSet::from(["heroFriends".to_string()]));
        let result = map_json(
            &selection_set,
            merged,
            &variables,
            &source,
            MissingValuePolicy::Disallow,
        )
        .await
        .unwrap();
        let hero = result.get("hero").and_then(|hero| hero.as_object()).unwrap();
        assert!(hero.fulfills("heroFriends"));
        assert!(!hero.is_deferred("heroFriends"));
        assert_eq!(
            hero.to_json(),
            json!({ "name": "R2-D2", "friends": [{ "name": "Luke" }] })
        );
    }

    #[tokio::test]
    async fn conditional_selections_follow_variables() {
        let schema = schema();
        let source = JsonSource::complete(&schema);
        let selection_set = hero_selection_set(vec![
            Selection::field("name", FieldType::String.non_null()),
            Selection::include_if(
                "withHeight",
                vec![Selection::field("height", FieldType::Float)],
            ),
        ]);
        let data = json!({ "hero": { "name": "Luke", "height": 1.72 } });

        let variables = object(json!({ "episode": "JEDI", "withHeight": false }));
        let result = map_json(
            &selection_set,
            data.clone(),
            &variables,
            &source,
            MissingValuePolicy::Disallow,
        )
        .await
        .unwrap();
        assert_eq!(result.to_json(), json!({ "hero": { "name": "Luke" } }));

        let variables = object(json!({ "episode": "JEDI", "withHeight": true }));
        let result = map_json(
            &selection_set,
            data,
            &variables,
            &source,
            MissingValuePolicy::Disallow,
        )
        .await
        .unwrap();
        assert_eq!(result.to_json(), json!({ "hero": { "name": "Luke", "height": 1.72 } }));
    }

    #[tokio::test]
    async fn fields_with_the_same_response_key_are_merged() {
        let schema = schema();
        let source = JsonSource::complete(&schema);
        let variables = object(json!({ "episode": "JEDI" }));
        let selection_set = SelectionSet::new(
            "Query",
            vec![
                Selection::Field(
                    Field::new("hero", FieldType::named("Character"))
                        .with_argument("episode", InputValue::variable("episode"))
                        .with_selections(vec![Selection::field("name", FieldType::String)]),
                ),
                Selection::inline(
                    "Query",
                    vec![Selection::Field(
                        Field::new("hero", FieldType::named("Character"))
                            .with_argument("episode", InputValue::variable("episode"))
                            .with_selections(vec![Selection::field("id", FieldType::Id)]),
                    )],
                ),
            ],
        );
        let data = json!({ "hero": { "name": "R2-D2", "id": "2001" } });

        let result = map_json(
            &selection_set,
            data,
            &variables,
            &source,
            MissingValuePolicy::Disallow,
        )
        .await
        .unwrap();
        assert_eq!(
            result.to_json(),
            json!({ "hero": { "name": "R2-D2", "id": "2001" } })
        );
    }

    #[tokio::test]
    async fn missing_values_follow_the_policy() {
        let schema = schema();
        let source = JsonSource::complete(&schema);
        let variables = object(json!({ "episode": "JEDI" }));
        let selection_set = hero_selection_set(vec![
            Selection::field("name", FieldType::String.non_null()),
            Selection::field("height", FieldType::Float),
        ]);
        let data = json!({ "hero": { "name": "Luke" } });

        let error = map_json(
            &selection_set,
            data.clone(),
            &variables,
            &source,
            MissingValuePolicy::Disallow,
        )
        .await
        .unwrap_err();
        assert_eq!(
            error,
            ExecutionError::decoding(
                &Path::from(vec!["hero", "height"]),
                DecodingError::MissingValue
            )
        );

        let result = map_json(
            &selection_set,
            data.clone(),
            &variables,
            &source,
            MissingValuePolicy::AllowForOptionalFields,
        )
        .await
        .unwrap();
        assert_eq!(
            result.to_json(),
            json!({ "hero": { "name": "Luke", "height": null } })
        );

        let data_without_name = json!({ "hero": { "height": 1.72 } });
        assert!(map_json(
            &selection_set,
            data_without_name.clone(),
            &variables,
            &source,
            MissingValuePolicy::AllowForOptionalFields,
        )
        .await
        .is_err());

        let result = map_json(
            &selection_set,
            data_without_name,
            &variables,
            &source,
            MissingValuePolicy::AllowForAllFields,
        )
        .await
        .unwrap();
        assert_eq!(result.to_json(), json!({ "hero": { "height": 1.72 } }));
    }

    #[tokio::test]
    async fn null_for_non_null_field_fails() {
        let schema = schema();
        let source = JsonSource::complete(&schema);
        let variables = object(json!({ "episode": "JEDI" }));
        let selection_set =
            hero_selection_set(vec![Selection::field("name", FieldType::String.non_null())]);

        let error = map_json(
            &selection_set,
            json!({ "hero": { "name": null } }),
            &variables,
            &source,
            MissingValuePolicy::Disallow,
        )
        .await
        .unwrap_err();
        assert_eq!(
            error,
            ExecutionError::decoding(
                &Path::from(vec!["hero", "name"]),
                DecodingError::NullValue
            )
        );
    }

    #[tokio::test]
    async fn zip_collects_data_and_dependencies_in_one_walk() {
        let schema = schema();
        let source = JsonSource::complete(&schema);
        let variables = object(json!({ "episode": "JEDI" }));
        let selection_set = hero_selection_set(vec![
            Selection::field("id", FieldType::Id.non_null()),
            Selection::field("name", FieldType::String.non_null()),
        ]);
        let data = json!({ "hero": { "id": "2001", "name": "R2-D2" } });

        let executor = GraphQLExecutor::new(&source, &schema, &variables);
        let (result, dependent_keys) = executor
            .execute(
                &selection_set,
                object(data),
                QUERY_ROOT,
                &mut Zip2Accumulator::new(DataDictMapper::default(), DependencyTracker::new()),
            )
            .await
            .unwrap();

        assert_eq!(
            result.to_json(),
            json!({ "hero": { "id": "2001", "name": "R2-D2" } })
        );
        assert_eq!(
            dependent_keys,
            HashSet::from([
                r#"QUERY_ROOT.hero(episode:"JEDI")"#.to_string(),
                "Character:2001.id".to_string(),
                "Character:2001.name".to_string(),
            ])
        );
    }
}
