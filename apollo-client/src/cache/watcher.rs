use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use futures::stream::BoxStream;
use futures::Stream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::ApolloStore;
use super::ApolloStoreSubscriber;
use super::CacheKey;
use super::CachePolicy;
use crate::error::FetchError;
use crate::execution::DataDict;
use crate::execution::GraphQLResult;
use crate::spec::Operation;

/// The results of one operation, in the order they were produced.
pub type ResultStream = BoxStream<'static, Result<GraphQLResult<DataDict>, FetchError>>;

/// Fetches the watched operation with a cache policy. Writes caused by the fetch must carry
/// the given context identifier.
pub(crate) type Fetch = Box<dyn Fn(CachePolicy, Uuid) -> ResultStream + Send>;

type Change = (HashSet<CacheKey>, Option<Uuid>);

struct ChangeForwarder {
    sender: mpsc::UnboundedSender<Change>,
}

impl ApolloStoreSubscriber for ChangeForwarder {
    fn store_did_change_keys(
        &self,
        changed_keys: &HashSet<CacheKey>,
        context_identifier: Option<Uuid>,
    ) {
        // Fails once the watcher stopped
        let _ = self.sender.send((changed_keys.clone(), context_identifier));
    }
}

/// Keeps the result of a query up to date with the cache.
///
/// The watcher fetches the operation once, then reloads it from the cache every time a write
/// changes one of the fields the last result was read from. When the cache can no longer
/// fulfill the operation, it is fetched again with the watcher's policy. Writes made by the
/// watcher's own fetches are ignored, their results are delivered directly.
///
/// Dropping the watcher, or calling [`QueryWatcher::cancel`], stops it.
pub struct QueryWatcher {
    results: UnboundedReceiverStream<Result<GraphQLResult<DataDict>, FetchError>>,
    cancellation: CancellationToken,
}

impl QueryWatcher {
    pub(crate) fn new(
        store: ApolloStore,
        operation: Operation,
        policy: CachePolicy,
        fetch: Fetch,
    ) -> Self {
        let (sender, results) = mpsc::unbounded_channel();
        let cancellation = CancellationToken::new();
        let task = WatchTask {
            store,
            operation,
            policy,
            fetch,
            sender,
            context_identifier: Uuid::new_v4(),
            dependent_keys: None,
        };
        tokio::spawn(task.run(cancellation.clone()));

        Self {
            results: UnboundedReceiverStream::new(results),
            cancellation,
        }
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }
}

impl Stream for QueryWatcher {
    type Item = Result<GraphQLResult<DataDict>, FetchError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.results.poll_next_unpin(cx)
    }
}

impl Drop for QueryWatcher {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

struct WatchTask {
    store: ApolloStore,
    operation: Operation,
    policy: CachePolicy,
    fetch: Fetch,
    sender: mpsc::UnboundedSender<Result<GraphQLResult<DataDict>, FetchError>>,
    context_identifier: Uuid,
    dependent_keys: Option<HashSet<CacheKey>>,
}

impl WatchTask {
    async fn run(mut self, cancellation: CancellationToken) {
        let (changes_sender, mut changes) = mpsc::unbounded_channel();
        let token = self
            .store
            .subscribe(Arc::new(ChangeForwarder {
                sender: changes_sender,
            }))
            .await;

        tokio::select! {
            _ = cancellation.cancelled() => {}
            _ = self.watch(&mut changes) => {}
        }

        self.store.unsubscribe(token).await;
        tracing::trace!(operation = %self.operation.name, "query watcher stopped");
    }

    async fn watch(&mut self, changes: &mut mpsc::UnboundedReceiver<Change>) {
        self.refetch().await;

        while let Some((changed_keys, context_identifier)) = changes.recv().await {
            if context_identifier == Some(self.context_identifier) {
                continue;
            }
            if let Some(dependent_keys) = &self.dependent_keys {
                if changed_keys.is_disjoint(dependent_keys) {
                    continue;
                }
            }

            tracing::debug!(operation = %self.operation.name, "watched data changed");
            match self.store.load::<DataDict>(&self.operation).await {
                Ok(Some(result)) => self.deliver(Ok(result)),
                Ok(None) => self.refetch().await,
                Err(error) => self.deliver(Err(error.into())),
            }
        }
    }

    async fn refetch(&mut self) {
        let mut results = (self.fetch)(self.policy, self.context_identifier);
        while let Some(result) = results.next().await {
            self.deliver(result);
        }
    }

    fn deliver(&mut self, result: Result<GraphQLResult<DataDict>, FetchError>) {
        if let Ok(GraphQLResult {
            dependent_keys: Some(dependent_keys),
            ..
        }) = &result
        {
            self.dependent_keys = Some(dependent_keys.clone());
        }
        // The watcher may have been dropped, the task stops on cancellation
        let _ = self.sender.send(result);
    }
}
