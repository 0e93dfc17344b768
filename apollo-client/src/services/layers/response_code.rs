//! Fails HTTP responses outside of the 2xx range.

use std::task::Poll;

use bytes::Bytes;
use futures::future::BoxFuture;
use tower::BoxError;
use tower::Layer;
use tower::Service;
use tower::ServiceExt;
use tracing::Instrument;

use crate::error::FetchError;
use crate::graphql;
use crate::services::transport;

#[derive(Clone, Default)]
pub(crate) struct ResponseCodeLayer {}

impl<S> Layer<S> for ResponseCodeLayer {
    type Service = ResponseCodeService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ResponseCodeService { inner }
    }
}

/// [`Service`] turning non-2xx responses into [`FetchError::InvalidResponseCode`].
///
/// Servers often explain the failure with GraphQL errors in the body, they are kept on the
/// error when the body can be parsed.
#[derive(Clone)]
pub(crate) struct ResponseCodeService<S> {
    inner: S,
}

impl<S> Service<transport::Request> for ResponseCodeService<S>
where
    S: Service<transport::Request, Response = transport::Response, Error = BoxError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    type Response = transport::Response;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: transport::Request) -> Self::Future {
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);

        let fut = async move {
            let response = inner.oneshot(request).await?;
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            let body = transport::collect(response.into_body())
                .await
                .unwrap_or_default();
            let graphql_errors = graphql_errors(&body);
            tracing::debug!(
                status = status.as_u16(),
                errors = graphql_errors.len(),
                "invalid response code"
            );
            Err(BoxError::from(FetchError::InvalidResponseCode {
                status: status.as_u16(),
                body,
                graphql_errors,
            }))
        }
        .in_current_span();
        Box::pin(fut)
    }
}

fn graphql_errors(body: &Bytes) -> Vec<graphql::Error> {
    graphql::Response::from_bytes(body)
        .map(|response| response.errors)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use http::StatusCode;
    use pretty_assertions::assert_eq;
    use tower::service_fn;

    use super::*;

    fn server(status: StatusCode, body: &'static str) -> transport::BoxCloneService {
        transport::BoxCloneService::new(service_fn(move |_request: transport::Request| {
            let chunk = Ok::<_, BoxError>(Bytes::from_static(body.as_bytes()));
            async move {
                let mut response = http::Response::new(futures::stream::iter([chunk]).boxed());
                *response.status_mut() = status;
                Ok::<_, BoxError>(response)
            }
        }))
    }

    async fn send(server: transport::BoxCloneService) -> Result<transport::Response, BoxError> {
        ResponseCodeLayer::default()
            .layer(server)
            .oneshot(http::Request::new(Bytes::new()))
            .await
    }

    #[tokio::test]
    async fn successful_responses_pass_through() {
        let response = send(server(StatusCode::OK, r#"{"data":null}"#))
            .await
            .unwrap();
        let body = transport::collect(response.into_body()).await.unwrap();
        assert_eq!(body, Bytes::from_static(br#"{"data":null}"#));
    }

    #[tokio::test]
    async fn errors_are_extracted_from_failed_responses() {
        let error = send(server(
            StatusCode::BAD_REQUEST,
            r#"{"errors":[{"message":"Must provide query string."}]}"#,
        ))
        .await
        .err()
        .unwrap();

        match error.downcast_ref::<FetchError>() {
            Some(FetchError::InvalidResponseCode {
                status,
                graphql_errors,
                ..
            }) => {
                assert_eq!(*status, 400);
                assert_eq!(graphql_errors.len(), 1);
                assert_eq!(graphql_errors[0].message, "Must provide query string.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unparsable_bodies_keep_the_raw_body() {
        let error = send(server(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>"))
            .await
            .err()
            .unwrap();

        assert!(matches!(
            error.downcast_ref::<FetchError>(),
            Some(FetchError::InvalidResponseCode { status: 502, body, graphql_errors })
                if body.as_ref() == b"<html>bad gateway</html>" && graphql_errors.is_empty()
        ));
    }
}
