//! Implements the execution of server responses against the operation.

use std::sync::Arc;
use std::task::Poll;

use futures::future::BoxFuture;
use futures::StreamExt;
use tower::BoxError;
use tower::Service;
use tower::ServiceExt;
use tracing::Instrument;

use super::fetch;
use super::request;
use crate::error::FetchError;
use crate::execution::DataDict;
use crate::execution::DataDictMapper;
use crate::execution::DependencyTracker;
use crate::execution::GraphQLExecutor;
use crate::execution::GraphQLResult;
use crate::execution::JsonSource;
use crate::execution::Zip2Accumulator;
use crate::json_ext::Value;
use crate::spec::Operation;
use crate::spec::Schema;

/// [`Service`] sending operations to the fetch stage and turning each response into a typed
/// result.
#[derive(Clone)]
pub(crate) struct ExecutionService<S> {
    schema: Arc<Schema>,
    inner: S,
}

impl<S> ExecutionService<S> {
    pub(crate) fn new(schema: Arc<Schema>, inner: S) -> Self {
        Self { schema, inner }
    }
}

impl<S> Service<request::Request> for ExecutionService<S>
where
    S: Service<fetch::Request, Response = fetch::Response, Error = BoxError>
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
        let schema = self.schema.clone();

        let fut = async move {
            let operation = request.operation.clone();
            let fetch_request = fetch::Request::builder()
                .operation(request.operation)
                .cache_policy(request.cache_policy)
                .context_identifier(request.context_identifier)
                .build();
            let response = inner.oneshot(fetch_request).await?;

            let results = response
                .chunks
                .then(move |chunk| {
                    let schema = schema.clone();
                    let operation = operation.clone();
                    async move { execute(&schema, &operation, chunk?).await }
                })
                .boxed();
            Ok::<_, BoxError>(request::Response::new(results))
        }
        .in_current_span();
        Box::pin(fut)
    }
}

/// Executes the operation on the data of a response.
///
/// When data cannot be decoded and the response has errors, the result carries the errors
/// without data: the server nulled fields it could not resolve.
async fn execute(
    schema: &Schema,
    operation: &Operation,
    chunk: fetch::Chunk,
) -> Result<GraphQLResult<DataDict>, FetchError> {
    let fetch::Chunk {
        response,
        delivered_labels,
    } = chunk;
    let data = match response.data {
        Some(Value::Object(data)) => data,
        None | Some(Value::Null) => {
            return Ok(GraphQLResult::from_server(
                None,
                response.errors,
                response.extensions,
            ))
        }
        Some(_) => {
            return Err(FetchError::MalformedResponse {
                reason: "data is not an object".to_string(),
            })
        }
    };

    let source = JsonSource::new(schema, delivered_labels);
    let executor = GraphQLExecutor::new(&source, schema, &operation.variables);
    let mut accumulator =
        Zip2Accumulator::new(DataDictMapper::default(), DependencyTracker::new());
    match executor
        .execute(
            &operation.selection_set,
            data,
            operation.root_cache_key(),
            &mut accumulator,
        )
        .await
    {
        Ok((data, dependent_keys)) => {
            let mut result =
                GraphQLResult::from_server(Some(data), response.errors, response.extensions);
            result.dependent_keys = Some(dependent_keys);
            Ok(result)
        }
        Err(error) if !response.errors.is_empty() => {
            tracing::debug!(
                operation = %operation.name,
                %error,
                "partial data could not be decoded"
            );
            Ok(GraphQLResult::from_server(
                None,
                response.errors,
                response.extensions,
            ))
        }
        Err(error) => Err(FetchError::Decoding(error)),
    }
}
