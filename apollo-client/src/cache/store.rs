//! The cache store: transactions over a [`NormalizedCache`] and change notifications.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::CacheKey;
use super::DataLoader;
use super::NormalizedCache;
use super::RecordSet;
use crate::error::CacheError;
use crate::error::DecodingError;
use crate::error::ExecutionError;
use crate::execution::CacheSource;
use crate::execution::DataDict;
use crate::execution::DataDictMapper;
use crate::execution::DataDictSource;
use crate::execution::DependencyTracker;
use crate::execution::ExecutionSource;
use crate::execution::FromDataDict;
use crate::execution::GraphQLExecutor;
use crate::execution::GraphQLResult;
use crate::execution::JsonSource;
use crate::execution::MissingValuePolicy;
use crate::execution::ResultAccumulator;
use crate::execution::ResultNormalizer;
use crate::execution::Zip2Accumulator;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::spec::Operation;
use crate::spec::Schema;
use crate::spec::SelectionSet;

/// Receives the keys changed by every write transaction that changed something.
///
/// Called after the write lock is released, so implementations may open transactions of
/// their own, but they should not block.
pub trait ApolloStoreSubscriber: Send + Sync {
    /// `context_identifier` identifies the request whose results were written, if any.
    fn store_did_change_keys(
        &self,
        changed_keys: &HashSet<CacheKey>,
        context_identifier: Option<Uuid>,
    );
}

/// Returned by [`ApolloStore::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

struct State {
    cache: Box<dyn NormalizedCache>,
    subscribers: HashMap<SubscriptionToken, Arc<dyn ApolloStoreSubscriber>>,
    next_token: u64,
}

struct Inner {
    state: RwLock<State>,
    schema: Schema,
}

/// Owns a [`NormalizedCache`] and serializes access to it.
///
/// Any number of read transactions run concurrently, a read-write transaction runs alone.
/// The lock is fair: once a write is queued, new reads wait for it. The store takes the
/// backend by value, so two stores can never share one.
#[derive(Clone)]
pub struct ApolloStore {
    inner: Arc<Inner>,
}

impl ApolloStore {
    pub fn new(cache: impl NormalizedCache, schema: Schema) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(State {
                    cache: Box::new(cache),
                    subscribers: HashMap::new(),
                    next_token: 0,
                }),
                schema,
            }),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    /// The key `object` is stored under, if the schema gives it an identity.
    pub fn cache_key(&self, typename: &str, object: &Object) -> Option<CacheKey> {
        self.inner.schema.cache_key(typename, object)
    }

    /// Runs `body` in a read transaction.
    ///
    /// ```ignore
    /// let data = store
    ///     .within_read_transaction(move |transaction| {
    ///         Box::pin(async move { transaction.read(&operation).await })
    ///     })
    ///     .await?;
    /// ```
    pub async fn within_read_transaction<T, F>(&self, body: F) -> Result<T, CacheError>
    where
        F: for<'t> FnOnce(&'t ReadTransaction<'_>) -> BoxFuture<'t, Result<T, CacheError>>,
    {
        let state = self.inner.state.read().await;
        tracing::trace!("read transaction started");
        let transaction = ReadTransaction::new(&*state.cache, &self.inner.schema);
        body(&transaction).await
    }

    /// Runs `body` in a read-write transaction, then notifies the subscribers of the keys it
    /// changed.
    ///
    /// Changes are not rolled back when `body` fails.
    pub async fn within_read_write_transaction<T, F>(&self, body: F) -> Result<T, CacheError>
    where
        F: for<'t> FnOnce(&'t mut ReadWriteTransaction<'_>) -> BoxFuture<'t, Result<T, CacheError>>,
    {
        self.read_write(None, body).await
    }

    async fn read_write<T, F>(
        &self,
        context_identifier: Option<Uuid>,
        body: F,
    ) -> Result<T, CacheError>
    where
        F: for<'t> FnOnce(&'t mut ReadWriteTransaction<'_>) -> BoxFuture<'t, Result<T, CacheError>>,
    {
        let (result, changed_keys, subscribers) = {
            let mut guard = self.inner.state.write().await;
            tracing::trace!("read-write transaction started");
            let state = &mut *guard;
            let mut transaction = ReadWriteTransaction::new(&mut state.cache, &self.inner.schema);
            let result = body(&mut transaction).await;
            let subscribers: Vec<_> = state.subscribers.values().cloned().collect();
            (result, transaction.changed_keys, subscribers)
        };

        if !changed_keys.is_empty() {
            tracing::trace!(
                changed_keys = changed_keys.len(),
                subscribers = subscribers.len(),
                "notifying subscribers"
            );
            for subscriber in subscribers {
                subscriber.store_did_change_keys(&changed_keys, context_identifier);
            }
        }
        result
    }

    /// Reads `operation` from the cache.
    ///
    /// Returns `Ok(None)` when the cache cannot fulfill the operation: a record or a field is
    /// missing, or a cached value cannot be converted. Backend failures are errors.
    pub async fn load<T>(
        &self,
        operation: &Operation,
    ) -> Result<Option<GraphQLResult<T>>, CacheError>
    where
        T: FromDataDict,
    {
        let state = self.inner.state.read().await;
        let transaction = ReadTransaction::new(&*state.cache, &self.inner.schema);
        let (data, dependent_keys) = match transaction.read_with_dependencies(operation).await {
            Ok(read) => read,
            Err(CacheError::Execution(error))
                if !matches!(error, ExecutionError::Loading { .. }) =>
            {
                if error.is_missing_value() {
                    tracing::debug!(operation = %operation.name, %error, "cache miss");
                } else {
                    failfast_debug!(
                        "cached value for operation '{}' could not be converted: {}",
                        operation.name,
                        error
                    );
                }
                return Ok(None);
            }
            Err(error) => return Err(error),
        };

        match T::from_data_dict(data) {
            Ok(data) => Ok(Some(GraphQLResult::from_cache(data, dependent_keys))),
            Err(error) => {
                failfast_debug!(
                    "cached data for operation '{}' could not be converted: {}",
                    operation.name,
                    error
                );
                Ok(None)
            }
        }
    }

    /// Merges `records` and notifies the subscribers, returns the changed keys.
    pub async fn publish(
        &self,
        records: RecordSet,
        context_identifier: Option<Uuid>,
    ) -> Result<HashSet<CacheKey>, CacheError> {
        self.read_write(context_identifier, move |transaction| {
            Box::pin(async move { transaction.merge(records).await })
        })
        .await
    }

    pub async fn subscribe(&self, subscriber: Arc<dyn ApolloStoreSubscriber>) -> SubscriptionToken {
        let mut state = self.inner.state.write().await;
        state.next_token += 1;
        let token = SubscriptionToken(state.next_token);
        state.subscribers.insert(token, subscriber);
        token
    }

    pub async fn unsubscribe(&self, token: SubscriptionToken) {
        self.inner.state.write().await.subscribers.remove(&token);
    }

    /// Removes every record. Subscribers are not notified.
    pub async fn clear_cache(&self) -> Result<(), CacheError> {
        self.read_write(None, |transaction| Box::pin(transaction.clear()))
            .await
    }
}

/// Executes `selection_set` on the record stored under `root_key`.
async fn execute_on_cache<A>(
    cache: &dyn NormalizedCache,
    loader: &DataLoader,
    schema: &Schema,
    root_key: &str,
    selection_set: &SelectionSet,
    variables: &Object,
    mut accumulator: A,
) -> Result<A::FinalResult, CacheError>
where
    A: ResultAccumulator,
{
    let source = CacheSource::new(cache, loader);
    let root = source
        .load_root(root_key)
        .await?
        .ok_or_else(|| ExecutionError::decoding(&Path::empty(), DecodingError::MissingValue))?;
    let executor = GraphQLExecutor::new(&source, schema, variables);
    Ok(executor
        .execute(selection_set, root, root_key, &mut accumulator)
        .await?)
}

/// Turns the `data` of `selection_set` into records, the root one stored under `root_key`.
pub(crate) async fn normalize<S>(
    source: &S,
    schema: &Schema,
    root_key: &str,
    selection_set: &SelectionSet,
    variables: &Object,
    data: S::RawObject,
) -> Result<RecordSet, ExecutionError>
where
    S: ExecutionSource,
{
    let executor = GraphQLExecutor::new(source, schema, variables);
    executor
        .execute(selection_set, data, root_key, &mut ResultNormalizer::new())
        .await
}

/// A read-only view of the store.
pub struct ReadTransaction<'s> {
    cache: &'s dyn NormalizedCache,
    schema: &'s Schema,
    loader: DataLoader,
}

impl<'s> ReadTransaction<'s> {
    fn new(cache: &'s dyn NormalizedCache, schema: &'s Schema) -> Self {
        Self {
            cache,
            schema,
            loader: DataLoader::new(),
        }
    }

    pub async fn read(&self, operation: &Operation) -> Result<DataDict, CacheError> {
        self.read_object(
            operation.root_cache_key(),
            &operation.selection_set,
            &operation.variables,
        )
        .await
    }

    /// Reads `operation` along with the field keys the data was read from.
    pub async fn read_with_dependencies(
        &self,
        operation: &Operation,
    ) -> Result<(DataDict, HashSet<CacheKey>), CacheError> {
        execute_on_cache(
            self.cache,
            &self.loader,
            self.schema,
            operation.root_cache_key(),
            &operation.selection_set,
            &operation.variables,
            Zip2Accumulator::new(DataDictMapper::default(), DependencyTracker::new()),
        )
        .await
    }

    /// Reads `selection_set` from the record stored under `key`.
    pub async fn read_object(
        &self,
        key: &str,
        selection_set: &SelectionSet,
        variables: &Object,
    ) -> Result<DataDict, CacheError> {
        execute_on_cache(
            self.cache,
            &self.loader,
            self.schema,
            key,
            selection_set,
            variables,
            DataDictMapper::default(),
        )
        .await
    }
}

/// An exclusive view of the store.
///
/// Records loaded before a write are forgotten by the write, reads always see the changes
/// made earlier in the transaction.
pub struct ReadWriteTransaction<'s> {
    cache: &'s mut Box<dyn NormalizedCache>,
    schema: &'s Schema,
    loader: DataLoader,
    changed_keys: HashSet<CacheKey>,
}

impl<'s> ReadWriteTransaction<'s> {
    fn new(cache: &'s mut Box<dyn NormalizedCache>, schema: &'s Schema) -> Self {
        Self {
            cache,
            schema,
            loader: DataLoader::new(),
            changed_keys: HashSet::new(),
        }
    }

    pub async fn read(&self, operation: &Operation) -> Result<DataDict, CacheError> {
        self.read_object(
            operation.root_cache_key(),
            &operation.selection_set,
            &operation.variables,
        )
        .await
    }

    pub async fn read_object(
        &self,
        key: &str,
        selection_set: &SelectionSet,
        variables: &Object,
    ) -> Result<DataDict, CacheError> {
        execute_on_cache(
            &**self.cache,
            &self.loader,
            self.schema,
            key,
            selection_set,
            variables,
            DataDictMapper::default(),
        )
        .await
    }

    /// Normalizes `data`, the response data of `operation`, and merges it.
    pub async fn write(&mut self, operation: &Operation, data: &Object) -> Result<(), CacheError> {
        self.write_object(
            operation.root_cache_key(),
            &operation.selection_set,
            &operation.variables,
            data,
        )
        .await
    }

    /// Normalizes `data` as the object stored under `key` and merges it.
    pub async fn write_object(
        &mut self,
        key: &str,
        selection_set: &SelectionSet,
        variables: &Object,
        data: &Object,
    ) -> Result<(), CacheError> {
        let source = JsonSource::complete(self.schema);
        let records = normalize(
            &source,
            self.schema,
            key,
            selection_set,
            variables,
            data.clone(),
        )
        .await?;
        self.merge(records).await?;
        Ok(())
    }

    /// Merges `records`, returns the keys they changed.
    pub async fn merge(&mut self, records: RecordSet) -> Result<HashSet<CacheKey>, CacheError> {
        tracing::trace!(records = records.len(), "merging records");
        let changed_keys = self.cache.merge(records).await?;
        self.loader.clear();
        self.changed_keys.extend(changed_keys.iter().cloned());
        Ok(changed_keys)
    }

    /// Reads `operation`, lets `body` change the data, and writes it back.
    ///
    /// Missing optional fields read as `null`, missing non-null fields fail the update. Objects
    /// are written back to the records they were read from.
    pub async fn update<F>(&mut self, operation: &Operation, body: F) -> Result<(), CacheError>
    where
        F: FnOnce(&mut DataDict) + Send,
    {
        self.update_object(
            operation.root_cache_key(),
            &operation.selection_set,
            &operation.variables,
            body,
        )
        .await
    }

    pub async fn update_object<F>(
        &mut self,
        key: &str,
        selection_set: &SelectionSet,
        variables: &Object,
        body: F,
    ) -> Result<(), CacheError>
    where
        F: FnOnce(&mut DataDict) + Send,
    {
        let mut data = execute_on_cache(
            &**self.cache,
            &self.loader,
            self.schema,
            key,
            selection_set,
            variables,
            DataDictMapper::new(MissingValuePolicy::AllowForOptionalFields),
        )
        .await?;
        body(&mut data);

        let source = DataDictSource::new(self.schema);
        let records = normalize(&source, self.schema, key, selection_set, variables, data).await?;
        self.merge(records).await?;
        Ok(())
    }

    pub async fn remove_object(&mut self, key: &str) -> Result<(), CacheError> {
        self.cache.remove_record(key).await?;
        self.loader.clear();
        Ok(())
    }

    /// Removes the records whose key contains `pattern`, ignoring case.
    pub async fn remove_objects(&mut self, pattern: &str) -> Result<(), CacheError> {
        self.cache.remove_records(pattern).await?;
        self.loader.clear();
        Ok(())
    }

    pub async fn clear(&mut self) -> Result<(), CacheError> {
        self.cache.clear().await?;
        self.loader.clear();
        Ok(())
    }
}
