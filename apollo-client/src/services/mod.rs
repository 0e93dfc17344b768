//! Implementation of the various steps in the client's request pipeline.
//!
//! A request goes through three stages:
//! - [`request`]: an [`Operation`](crate::spec::Operation) and its cache policy, answered with a
//!   stream of typed results,
//! - [`fetch`]: the GraphQL request sent for the operation, answered with a stream of
//!   GraphQL responses where incremental payloads are already merged,
//! - [`transport`]: the HTTP exchange with the server.

use tower::BoxError;

pub(crate) use self::execution_service::ExecutionService;
pub(crate) use self::parsing_service::ParsingService;
use crate::error::FetchError;

mod execution_service;
pub mod fetch;
pub(crate) mod layers;
mod parsing_service;
pub mod request;
pub mod transport;

pub(crate) const MULTIPART_MIXED: &str = "multipart/mixed";

/// Recovers the [`FetchError`] carried by a service error.
///
/// Errors that are not [`FetchError`]s can only come from a transport.
pub(crate) fn into_fetch_error(error: BoxError) -> FetchError {
    match error.downcast::<FetchError>() {
        Ok(error) => *error,
        Err(error) => FetchError::Transport {
            reason: error.to_string(),
        },
    }
}
