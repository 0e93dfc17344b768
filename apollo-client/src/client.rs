//! The client facade over the store and the request pipeline.

use std::future::Future;
use std::sync::Arc;

use futures::future::ready;
use futures::stream::once;
use futures::FutureExt;
use futures::StreamExt;
use http::HeaderValue;
use tower::ServiceBuilder;
use tower::ServiceExt;
use uuid::Uuid;

use crate::cache::ApolloStore;
use crate::cache::CachePolicy;
use crate::cache::Fetch;
use crate::cache::QueryWatcher;
use crate::cache::ResultStream;
use crate::configuration::Configuration;
use crate::error::CacheError;
use crate::error::ConfigurationError;
use crate::error::FetchError;
use crate::services::fetch;
use crate::services::into_fetch_error;
use crate::services::layers::apq::APQLayer;
use crate::services::layers::cache_read::CacheReadLayer;
use crate::services::layers::cache_write::CacheWriteLayer;
use crate::services::layers::response_code::ResponseCodeLayer;
use crate::services::layers::retry::RetryLayer;
use crate::services::request;
use crate::services::transport;
use crate::services::ExecutionService;
use crate::services::ParsingService;
use crate::spec::Operation;

/// A GraphQL client with a normalized cache.
///
/// Requests go through the pipeline, outermost first:
/// retries, cache reads, execution of the responses, cache writes, persisted queries, HTTP
/// encoding and response code checks, and finally the transport.
#[derive(Clone)]
pub struct ApolloClient {
    store: ApolloStore,
    configuration: Arc<Configuration>,
    service: request::BoxCloneService,
}

#[buildstructor::buildstructor]
impl ApolloClient {
    /// Builds a client sending its requests through `transport`.
    ///
    /// Without a configuration, the client uses [`Configuration::default`].
    #[builder(visibility = "pub")]
    fn new(
        store: ApolloStore,
        configuration: Option<Configuration>,
        transport: transport::BoxCloneService,
    ) -> Result<Self, ConfigurationError> {
        let configuration = configuration.unwrap_or_default();
        let accept = HeaderValue::from_str(&configuration.incremental.accept_header).map_err(
            |error| ConfigurationError::InvalidValue {
                field: "incremental.accept_header",
                reason: error.to_string(),
            },
        )?;

        let http = ParsingService::new(
            ServiceBuilder::new()
                .layer(ResponseCodeLayer::default())
                .service(transport),
            configuration.endpoint.clone(),
            accept,
        );
        let fetch_stage = ServiceBuilder::new()
            .layer(CacheWriteLayer::new(store.clone()))
            .layer(APQLayer::new(configuration.persisted_queries.clone()))
            .service(http);
        let service = ServiceBuilder::new()
            .layer(RetryLayer::new(configuration.retry.clone()))
            .layer(CacheReadLayer::new(store.clone()))
            .service(ExecutionService::new(
                Arc::new(store.schema().clone()),
                fetch::BoxCloneService::new(fetch_stage),
            ));

        Ok(Self {
            store,
            configuration: Arc::new(configuration),
            service: request::BoxCloneService::new(service),
        })
    }

    pub fn store(&self) -> &ApolloStore {
        &self.store
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Sends a request through the pipeline.
    ///
    /// The returned stream ends when the request's cancellation token is cancelled.
    pub fn fetch(
        &self,
        request: request::Request,
    ) -> impl Future<Output = Result<ResultStream, FetchError>> + Send + 'static {
        send(self.service.clone(), request)
    }

    /// Sends `operation` with the configured default cache policy.
    pub fn fetch_operation(
        &self,
        operation: Operation,
    ) -> impl Future<Output = Result<ResultStream, FetchError>> + Send + 'static {
        let request = request::Request::builder()
            .operation(operation)
            .cache_policy(self.configuration.cache.default_policy)
            .build();
        self.fetch(request)
    }

    /// Watches the results of `operation`, see [`QueryWatcher`].
    pub fn watch(&self, operation: Operation, policy: Option<CachePolicy>) -> QueryWatcher {
        let policy = policy.unwrap_or(self.configuration.cache.default_policy);
        let service = self.service.clone();
        let watched = operation.clone();
        let fetch: Fetch = Box::new(move |policy: CachePolicy, context_identifier: Uuid| {
            let request = request::Request::builder()
                .operation(watched.clone())
                .cache_policy(policy)
                .context_identifier(context_identifier)
                .build();
            send(service.clone(), request)
                .map(|results| match results {
                    Ok(results) => results,
                    Err(error) => once(ready(Err(error))).boxed(),
                })
                .flatten_stream()
                .boxed()
        });
        QueryWatcher::new(self.store.clone(), operation, policy, fetch)
    }

    /// Removes every record from the cache.
    pub async fn clear_cache(&self) -> Result<(), CacheError> {
        self.store.clear_cache().await
    }
}

async fn send(
    service: request::BoxCloneService,
    request: request::Request,
) -> Result<ResultStream, FetchError> {
    let cancellation = request.cancellation.clone();
    let response = tokio::select! {
        response = service.oneshot(request) => response.map_err(into_fetch_error)?,
        _ = cancellation.cancelled() => return Err(FetchError::Cancelled),
    };
    Ok(response
        .results
        .take_until(cancellation.cancelled_owned())
        .boxed())
}
