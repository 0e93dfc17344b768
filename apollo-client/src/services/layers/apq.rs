//!  (A)utomatic (P)ersisted (Q)ueries.
//!
//!  Requests are sent with the hash of their document only. When the server does not know the
//!  hash, the request is sent again with the document, which the server then registers.
//!
//!  For more information on APQ see:
//!  <https://www.apollographql.com/docs/apollo-server/performance/apq/>

use std::task::Poll;

use futures::future::ready;
use futures::future::BoxFuture;
use futures::stream::once;
use futures::StreamExt;
use tower::BoxError;
use tower::Layer;
use tower::Service;
use tower::ServiceExt;
use tracing::Instrument;

use crate::configuration::PersistedQueries;
use crate::error::FetchError;
use crate::services::fetch;

/// [`Layer`] for APQ implementation.
#[derive(Clone)]
pub(crate) struct APQLayer {
    configuration: PersistedQueries,
}

impl APQLayer {
    pub(crate) fn new(configuration: PersistedQueries) -> Self {
        Self { configuration }
    }
}

impl<S> Layer<S> for APQLayer {
    type Service = APQService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        APQService {
            inner,
            configuration: self.configuration.clone(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct APQService<S> {
    inner: S,
    configuration: PersistedQueries,
}

impl<S> Service<fetch::Request> for APQService<S>
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
        if !self.configuration.enabled {
            return Box::pin(inner.oneshot(request));
        }
        let retry_with_document = self.configuration.retry_with_document;

        let fut = async move {
            let operation = request.operation.clone();
            let Some(hash) = operation.hash.clone() else {
                return Err(BoxError::from(FetchError::PersistedQueryNoDocument {
                    operation_name: operation.name.clone(),
                }));
            };

            tracing::trace!(operation = %operation.name, "apq: sending hash");
            let response = inner
                .clone()
                .oneshot(request.clone().persisted(&hash, false))
                .await?;
            let (first, rest) = response.chunks.into_future().await;
            let not_found = matches!(
                &first,
                Some(Ok(chunk)) if chunk.response.is_persisted_query_not_found()
            );
            if !not_found || !retry_with_document {
                let chunks = match first {
                    Some(first) => once(ready(first)).chain(rest).boxed(),
                    None => rest,
                };
                return Ok(fetch::Response::new(chunks));
            }

            if operation.document.is_none() {
                return Err(BoxError::from(FetchError::PersistedQueryNoDocument {
                    operation_name: operation.name.clone(),
                }));
            }

            tracing::debug!(
                operation = %operation.name,
                "apq: query not found, sending document"
            );
            let response = inner.oneshot(request.persisted(&hash, true)).await?;
            let (first, rest) = response.chunks.into_future().await;
            match first {
                Some(Ok(chunk)) if chunk.response.is_persisted_query_not_found() => {
                    tracing::warn!(
                        operation = %operation.name,
                        "apq: server did not accept the persisted query"
                    );
                    Err(BoxError::from(FetchError::PersistedQueryRetryFailed {
                        operation_name: operation.name.clone(),
                    }))
                }
                Some(first) => Ok(fetch::Response::new(
                    once(ready(first)).chain(rest).boxed(),
                )),
                None => Ok(fetch::Response::new(rest)),
            }
        }
        .in_current_span();
        Box::pin(fut)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json_bytes::json;
    use tower::service_fn;

    use super::*;
    use crate::graphql;
    use crate::test_fixtures;

    fn not_found() -> graphql::Response {
        graphql::Response::builder()
            .error(
                graphql::Error::builder()
                    .message("PersistedQueryNotFound")
                    .extension("code", "PERSISTED_QUERY_NOT_FOUND")
                    .build(),
            )
            .build()
    }

    fn hero() -> graphql::Response {
        graphql::Response::builder()
            .data(json!({ "hero": { "__typename": "Droid", "id": "2001", "name": "R2-D2" } }))
            .build()
    }

    /// Answers with `not_found` until the document is sent, then with `hero`. Records whether
    /// each request carried the document.
    fn server(
        known_hashes: bool,
        documents_accepted: bool,
        sent_documents: Arc<Mutex<Vec<bool>>>,
    ) -> fetch::BoxCloneService {
        fetch::BoxCloneService::new(service_fn(move |request: fetch::Request| {
            let with_document = request.graphql_request.query.is_some();
            sent_documents.lock().push(with_document);
            assert!(request
                .graphql_request
                .extensions
                .contains_key("persistedQuery"));

            let response = if known_hashes || (with_document && documents_accepted) {
                hero()
            } else {
                not_found()
            };
            async move {
                Ok::<_, BoxError>(fetch::Response::new(
                    once(ready(Ok(fetch::Chunk::new(response)))).boxed(),
                ))
            }
        }))
    }

    async fn send(
        configuration: PersistedQueries,
        server: fetch::BoxCloneService,
    ) -> Result<Vec<fetch::Chunk>, FetchError> {
        let service = APQLayer::new(configuration).layer(server);
        let request = fetch::Request::builder()
            .operation(Arc::new(test_fixtures::hero_name_query()))
            .build();
        match service.oneshot(request).await {
            Ok(response) => Ok(response
                .chunks
                .map(|chunk| chunk.unwrap())
                .collect()
                .await),
            Err(error) => Err(crate::services::into_fetch_error(error)),
        }
    }

    fn enabled(retry_with_document: bool) -> PersistedQueries {
        PersistedQueries {
            enabled: true,
            retry_with_document,
        }
    }

    #[tokio::test]
    async fn known_hashes_are_sent_without_document() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let chunks = send(enabled(true), server(true, true, sent.clone()))
            .await
            .unwrap();
        assert_eq!(chunks[0].response, hero());
        assert_eq!(*sent.lock(), vec![false]);
    }

    #[tokio::test]
    async fn unknown_hashes_are_sent_again_with_the_document() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let chunks = send(enabled(true), server(false, true, sent.clone()))
            .await
            .unwrap();
        assert_eq!(chunks[0].response, hero());
        assert_eq!(*sent.lock(), vec![false, true]);
    }

    #[tokio::test]
    async fn a_second_not_found_fails() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let error = send(enabled(true), server(false, false, sent.clone()))
            .await
            .unwrap_err();
        assert!(matches!(error, FetchError::PersistedQueryRetryFailed { .. }));
        assert_eq!(*sent.lock(), vec![false, true]);
    }

    #[tokio::test]
    async fn not_found_is_returned_when_retries_are_disabled() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let chunks = send(enabled(false), server(false, true, sent.clone()))
            .await
            .unwrap();
        assert!(chunks[0].response.is_persisted_query_not_found());
        assert_eq!(*sent.lock(), vec![false]);
    }

    #[tokio::test]
    async fn disabled_apq_sends_the_document() {
        let service = APQLayer::new(PersistedQueries::default()).layer(service_fn(
            |request: fetch::Request| async move {
                assert!(request.graphql_request.query.is_some());
                assert!(request.graphql_request.extensions.is_empty());
                Ok::<_, BoxError>(fetch::Response::new(
                    once(ready(Ok(fetch::Chunk::new(hero())))).boxed(),
                ))
            },
        ));
        let request = fetch::Request::builder()
            .operation(Arc::new(test_fixtures::hero_name_query()))
            .build();
        assert!(service.oneshot(request).await.is_ok());
    }
}
