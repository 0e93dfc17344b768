//! Request stage: an operation in, typed results out.

use std::sync::Arc;

use futures::future::ready;
use futures::stream::once;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tower::BoxError;
use uuid::Uuid;

use crate::cache::CachePolicy;
use crate::cache::ResultStream;
use crate::error::FetchError;
use crate::execution::DataDict;
use crate::execution::GraphQLResult;
use crate::spec::Operation;

pub type BoxCloneService = tower::util::BoxCloneService<Request, Response, BoxError>;

/// An operation to execute.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Request {
    pub operation: Arc<Operation>,

    pub cache_policy: CachePolicy,

    /// Identifies the writes to the cache made with the results of this request.
    pub context_identifier: Uuid,

    /// Cancelling the token ends the result stream and aborts pending retries.
    pub cancellation: CancellationToken,
}

#[buildstructor::buildstructor]
impl Request {
    /// This is the constructor (or builder) to use when constructing a real Request.
    ///
    /// Without a policy, the request uses [`CachePolicy::CacheFirst`].
    #[builder(visibility = "pub")]
    fn new(
        operation: Operation,
        cache_policy: Option<CachePolicy>,
        context_identifier: Option<Uuid>,
        cancellation: Option<CancellationToken>,
    ) -> Self {
        Self {
            operation: Arc::new(operation),
            cache_policy: cache_policy.unwrap_or_default(),
            context_identifier: context_identifier.unwrap_or_else(Uuid::new_v4),
            cancellation: cancellation.unwrap_or_default(),
        }
    }
}

/// The results of an operation.
///
/// Queries usually produce one result, `@defer` and subscriptions produce several.
pub struct Response {
    pub results: ResultStream,
}

impl Response {
    pub fn new(results: ResultStream) -> Self {
        Self { results }
    }

    pub(crate) fn once(result: Result<GraphQLResult<DataDict>, FetchError>) -> Self {
        Self::new(once(ready(result)).boxed())
    }
}
