//! Answers queries from the normalized cache according to their [`CachePolicy`].

use std::task::Poll;

use futures::future::ready;
use futures::future::BoxFuture;
use futures::stream::once;
use futures::FutureExt;
use futures::StreamExt;
use tower::BoxError;
use tower::Layer;
use tower::Service;
use tower::ServiceExt;
use tracing::Instrument;

use crate::cache::ApolloStore;
use crate::cache::CachePolicy;
use crate::error::FetchError;
use crate::execution::DataDict;
use crate::execution::GraphQLResult;
use crate::services::into_fetch_error;
use crate::services::request;
use crate::spec::OperationKind;

/// [`Layer`] reading queries from the cache before, after or instead of the network.
///
/// Mutations and subscriptions always go to the network.
#[derive(Clone)]
pub(crate) struct CacheReadLayer {
    store: ApolloStore,
}

impl CacheReadLayer {
    pub(crate) fn new(store: ApolloStore) -> Self {
        Self { store }
    }
}

impl<S> Layer<S> for CacheReadLayer {
    type Service = CacheReadService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CacheReadService {
            inner,
            store: self.store.clone(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct CacheReadService<S> {
    inner: S,
    store: ApolloStore,
}

impl<S> Service<request::Request> for CacheReadService<S>
where
    S: Service<request::Request, Response = request::Response, Error = BoxError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    type Response = request::Response;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: request::Request) -> Self::Future {
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let store = self.store.clone();

        if request.operation.kind != OperationKind::Query || !request.cache_policy.reads_cache() {
            return Box::pin(inner.oneshot(request));
        }

        let fut = async move {
            let policy = request.cache_policy;
            let operation_name = request.operation.name.clone();
            match policy {
                CachePolicy::CacheFirst => match load(&store, &request).await? {
                    Some(result) => Ok(request::Response::once(Ok(result))),
                    None => inner.oneshot(request).await,
                },
                CachePolicy::CacheOnly => Ok(request::Response::once(
                    load(&store, &request)
                        .await?
                        .ok_or(FetchError::CacheMiss { operation_name }),
                )),
                CachePolicy::CacheAndNetwork => {
                    let Some(cached) = load(&store, &request).await? else {
                        return inner.oneshot(request).await;
                    };
                    // The cached result is already delivered, a failing fetch ends the stream
                    // with an error instead of failing the request
                    let network = async move {
                        match inner.oneshot(request).await {
                            Ok(response) => response.results,
                            Err(error) => once(ready(Err(into_fetch_error(error)))).boxed(),
                        }
                    }
                    .flatten_stream();
                    Ok(request::Response::new(
                        once(ready(Ok(cached))).chain(network).boxed(),
                    ))
                }
                CachePolicy::NetworkFirst => match inner.oneshot(request.clone()).await {
                    Ok(response) => Ok(response),
                    Err(error) => match load(&store, &request).await? {
                        Some(result) => {
                            tracing::debug!(
                                operation = %operation_name,
                                %error,
                                "network failed, using the cached result"
                            );
                            Ok(request::Response::once(Ok(result)))
                        }
                        None => Err(error),
                    },
                },
                CachePolicy::NetworkOnly | CachePolicy::NoCache => inner.oneshot(request).await,
            }
        }
        .in_current_span();
        Box::pin(fut)
    }
}

async fn load(
    store: &ApolloStore,
    request: &request::Request,
) -> Result<Option<GraphQLResult<DataDict>>, FetchError> {
    let result = store.load::<DataDict>(&request.operation).await?;
    if result.is_some() {
        tracing::trace!(operation = %request.operation.name, "cache hit");
    }
    Ok(result)
}
