//! Writes the responses of the server to the normalized cache.

use std::sync::Arc;
use std::task::Poll;

use futures::future::BoxFuture;
use futures::StreamExt;
use tower::BoxError;
use tower::Layer;
use tower::Service;
use tower::ServiceExt;
use tracing::Instrument;
use uuid::Uuid;

use crate::cache::normalize;
use crate::cache::ApolloStore;
use crate::execution::JsonSource;
use crate::json_ext::Value;
use crate::services::fetch;
use crate::spec::Operation;

/// [`Layer`] normalizing every response chunk into the store, unless the request uses
/// [`CachePolicy::NoCache`](crate::cache::CachePolicy::NoCache).
///
/// Writes carry the context identifier of the request, so that the watcher which sent it can
/// tell its own writes apart.
#[derive(Clone)]
pub(crate) struct CacheWriteLayer {
    store: ApolloStore,
}

impl CacheWriteLayer {
    pub(crate) fn new(store: ApolloStore) -> Self {
        Self { store }
    }
}

impl<S> Layer<S> for CacheWriteLayer {
    type Service = CacheWriteService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CacheWriteService {
            inner,
            store: self.store.clone(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct CacheWriteService<S> {
    inner: S,
    store: ApolloStore,
}

impl<S> Service<fetch::Request> for CacheWriteService<S>
where
    S: Service<fetch::Request, Response = fetch::Response, Error = BoxError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    type Response = fetch::Response;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: fetch::Request) -> Self::Future {
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        if !request.cache_policy.writes_cache() {
            return Box::pin(inner.oneshot(request));
        }

        let store = self.store.clone();
        let operation = request.operation.clone();
        let context_identifier = request.context_identifier;

        let fut = async move {
            let response = inner.oneshot(request).await?;
            let chunks = response
                .chunks
                .then(move |chunk| {
                    let store = store.clone();
                    let operation = operation.clone();
                    async move {
                        if let Ok(chunk) = &chunk {
                            write(&store, &operation, chunk, context_identifier).await;
                        }
                        chunk
                    }
                })
                .boxed();
            Ok::<_, BoxError>(fetch::Response::new(chunks))
        }
        .in_current_span();
        Box::pin(fut)
    }
}

/// Writes the data of a chunk. Data that does not match the operation is not written, the
/// execution of the chunk reports it.
async fn write(
    store: &ApolloStore,
    operation: &Arc<Operation>,
    chunk: &fetch::Chunk,
    context_identifier: Uuid,
) {
    let Some(Value::Object(data)) = &chunk.response.data else {
        return;
    };

    let schema = store.schema();
    let source = JsonSource::new(schema, chunk.delivered_labels.clone());
    let records = match normalize(
        &source,
        schema,
        operation.root_cache_key(),
        &operation.selection_set,
        &operation.variables,
        data.clone(),
    )
    .await
    {
        Ok(records) => records,
        Err(error) => {
            tracing::warn!(
                operation = %operation.name,
                %error,
                "response was not written to the cache"
            );
            return;
        }
    };

    match store.publish(records, Some(context_identifier)).await {
        Ok(changed_keys) => tracing::trace!(
            operation = %operation.name,
            changed = changed_keys.len(),
            "response written to the cache"
        ),
        Err(error) => failfast_error!(
            operation = %operation.name,
            %error,
            "failed to write the response to the cache"
        ),
    }
}
