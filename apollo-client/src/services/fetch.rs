//! Fetch stage: a GraphQL request in, GraphQL responses out.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::BoxStream;
use serde_json_bytes::ByteString;
use tower::BoxError;
use uuid::Uuid;

use crate::cache::CachePolicy;
use crate::error::FetchError;
use crate::graphql;
use crate::spec::Operation;

pub type BoxCloneService = tower::util::BoxCloneService<Request, Response, BoxError>;

#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Request {
    pub operation: Arc<Operation>,

    /// What is sent to the server. Layers may rewrite it.
    pub graphql_request: graphql::Request,

    pub cache_policy: CachePolicy,

    pub context_identifier: Uuid,
}

#[buildstructor::buildstructor]
impl Request {
    /// Builds the GraphQL request carrying the document of `operation`.
    #[builder(visibility = "pub")]
    fn new(
        operation: Arc<Operation>,
        cache_policy: Option<CachePolicy>,
        context_identifier: Option<Uuid>,
    ) -> Self {
        let graphql_request = graphql::Request {
            query: operation.document.clone(),
            operation_name: Some(operation.name.clone()),
            variables: operation.variables.clone(),
            extensions: Default::default(),
        };
        Self {
            operation,
            graphql_request,
            cache_policy: cache_policy.unwrap_or_default(),
            context_identifier: context_identifier.unwrap_or_else(Uuid::new_v4),
        }
    }

    /// Sends the hash of the document in the `persistedQuery` extension, with or without the
    /// document itself.
    pub(crate) fn persisted(mut self, hash: &str, with_document: bool) -> Self {
        self.graphql_request.extensions.insert(
            ByteString::from("persistedQuery"),
            serde_json_bytes::json!({ "version": 1, "sha256Hash": hash }),
        );
        if !with_document {
            self.graphql_request.query = None;
        }
        self
    }
}

/// A GraphQL response, with the incremental payloads received so far merged in.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub response: graphql::Response,

    /// The labels of the deferred fragments delivered so far.
    pub delivered_labels: HashSet<String>,
}

impl Chunk {
    pub fn new(response: graphql::Response) -> Self {
        Self {
            response,
            delivered_labels: HashSet::new(),
        }
    }
}

pub struct Response {
    pub chunks: BoxStream<'static, Result<Chunk, FetchError>>,
}

impl Response {
    pub fn new(chunks: BoxStream<'static, Result<Chunk, FetchError>>) -> Self {
        Self { chunks }
    }
}
