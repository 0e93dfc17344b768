//! Sends fetch requests over the transport and parses the responses.

use std::collections::HashSet;
use std::task::Poll;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::StreamExt;
use http::header::ACCEPT;
use http::header::CONTENT_TYPE;
use http::HeaderValue;
use http::Method;
use multer::Multipart;
use tower::BoxError;
use tower::Service;
use tower::ServiceExt;
use tracing::Instrument;

use super::fetch;
use super::into_fetch_error;
use super::transport;
use super::MULTIPART_MIXED;
use crate::error::FetchError;
use crate::graphql;
use crate::json_ext::Value;
use crate::json_ext::ValueExt;

/// [`Service`] turning a fetch request into an HTTP request, and the HTTP response into
/// GraphQL responses.
///
/// Multipart responses yield one [`fetch::Chunk`] per part, each one holding the data of the
/// first part with every incremental payload received so far merged in.
#[derive(Clone)]
pub(crate) struct ParsingService<S> {
    inner: S,
    endpoint: String,
    accept: HeaderValue,
}

impl<S> ParsingService<S> {
    pub(crate) fn new(inner: S, endpoint: String, accept: HeaderValue) -> Self {
        Self {
            inner,
            endpoint,
            accept,
        }
    }
}

impl<S> Service<fetch::Request> for ParsingService<S>
where
    S: Service<transport::Request, Response = transport::Response, Error = BoxError>
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
        let endpoint = self.endpoint.clone();
        let accept = self.accept.clone();

        let fut = async move {
            let body = serde_json::to_vec(&request.graphql_request)?;
            let http_request = http::Request::builder()
                .method(Method::POST)
                .uri(endpoint)
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .header(ACCEPT, accept)
                .body(Bytes::from(body))?;

            tracing::trace!(operation = %request.operation.name, "sending request");
            let response = inner
                .oneshot(http_request)
                .await
                .map_err(into_fetch_error)?;
            Ok::<_, BoxError>(fetch::Response::new(parse(response)?))
        }
        .in_current_span();
        Box::pin(fut)
    }
}

fn parse(
    response: transport::Response,
) -> Result<BoxStream<'static, Result<fetch::Chunk, FetchError>>, FetchError> {
    let (parts, body) = response.into_parts();
    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if !content_type.starts_with(MULTIPART_MIXED) {
        return Ok(futures::stream::once(async move {
            let body = transport::collect(body).await.map_err(into_fetch_error)?;
            Ok(fetch::Chunk::new(graphql::Response::from_bytes(&body)?))
        })
        .boxed());
    }

    let boundary = boundary(content_type).ok_or_else(|| FetchError::MalformedResponse {
        reason: format!("no boundary in content type '{content_type}'"),
    })?;
    let state = IncrementalState {
        multipart: Multipart::new(body, boundary),
        merged: None,
        delivered_labels: HashSet::new(),
    };

    Ok(futures::stream::unfold(Some(state), |state| async move {
        let mut state = state?;
        loop {
            match state.next_part().await {
                Ok(Some(response)) => {
                    if let Some(chunk) = state.apply(response) {
                        return Some((Ok(chunk), Some(state)));
                    }
                }
                Ok(None) => return None,
                Err(error) => return Some((Err(error), None)),
            }
        }
    })
    .boxed())
}

/// The `boundary` parameter of a `multipart/mixed` content type.
fn boundary(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|parameter| {
        let (name, value) = parameter.split_once('=')?;
        (name.trim().eq_ignore_ascii_case("boundary"))
            .then(|| value.trim().trim_matches('"').to_string())
    })
}

struct IncrementalState {
    multipart: Multipart<'static>,
    merged: Option<graphql::Response>,
    delivered_labels: HashSet<String>,
}

impl IncrementalState {
    async fn next_part(&mut self) -> Result<Option<graphql::Response>, FetchError> {
        let malformed = |error: multer::Error| FetchError::MalformedResponse {
            reason: error.to_string(),
        };
        match self.multipart.next_field().await.map_err(malformed)? {
            Some(part) => {
                let body = part.bytes().await.map_err(malformed)?;
                graphql::Response::from_bytes(&body).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Merges a part into the response, returns the response to emit if the part carried
    /// anything. A part that only ends the stream emits the response once more, with
    /// `has_next` set to false.
    fn apply(&mut self, mut response: graphql::Response) -> Option<fetch::Chunk> {
        let Some(merged) = self.merged.as_mut() else {
            response.has_next = response.has_next.or(Some(false));
            self.merged = Some(response.clone());
            return Some(fetch::Chunk::new(response));
        };

        // Older servers send the payload at the top level of the part
        if response.path.is_some() {
            response.incremental.push(graphql::IncrementalResponse {
                label: response.label.take(),
                data: response.data.take(),
                path: response.path.take(),
                errors: std::mem::take(&mut response.errors),
                extensions: std::mem::take(&mut response.extensions),
            });
        }

        merged.has_next = response.has_next;
        let had_errors = !response.errors.is_empty();
        merged.errors.append(&mut response.errors);
        if response.incremental.is_empty() {
            let finished = response.has_next == Some(false);
            return (finished || had_errors).then(|| fetch::Chunk {
                response: merged.clone(),
                delivered_labels: self.delivered_labels.clone(),
            });
        }

        for incremental in response.incremental {
            let path = incremental.path.unwrap_or_default();
            if let Some(data) = incremental.data {
                let target = merged
                    .data
                    .get_or_insert_with(|| Value::Object(Default::default()));
                if !target.merge_at_path(&path, data) {
                    tracing::debug!(%path, "incremental payload for a path that is not in the data");
                }
            }
            if let Some(label) = incremental.label {
                self.delivered_labels.insert(label);
            }
            merged.errors.extend(incremental.errors);
            for (key, value) in incremental.extensions {
                merged.extensions.insert(key, value);
            }
        }

        Some(fetch::Chunk {
            response: merged.clone(),
            delivered_labels: self.delivered_labels.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json_bytes::json;
    use tower::service_fn;

    use super::*;

    fn body(parts: &'static [&'static str]) -> transport::Body {
        futures::stream::iter(parts.iter().map(|part| Ok(Bytes::from_static(part.as_bytes()))))
            .boxed()
    }

    fn transport(
        content_type: &'static str,
        parts: &'static [&'static str],
    ) -> transport::BoxCloneService {
        transport::BoxCloneService::new(service_fn(move |request: transport::Request| async move {
            assert_eq!(request.method(), Method::POST);
            let mut response = http::Response::new(body(parts));
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
            Ok::<_, BoxError>(response)
        }))
    }

    async fn chunks(service: ParsingService<transport::BoxCloneService>) -> Vec<fetch::Chunk> {
        let request = fetch::Request::builder()
            .operation(std::sync::Arc::new(
                crate::test_fixtures::hero_with_deferred_friends_query(),
            ))
            .build();
        let response = service.oneshot(request).await.unwrap();
        response
            .chunks
            .map(|chunk| chunk.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn parses_single_responses() {
        let service = ParsingService::new(
            transport(
                "application/json",
                &[r#"{"data":{"hero":{"__typename":"Droid","id":"2001","name":"R2-D2"}}}"#],
            ),
            "http://localhost/graphql".to_string(),
            HeaderValue::from_static("application/json"),
        );

        let chunks = chunks(service).await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0].response.data,
            Some(json!({ "hero": { "__typename": "Droid", "id": "2001", "name": "R2-D2" } }))
        );
        assert!(chunks[0].delivered_labels.is_empty());
    }

    #[tokio::test]
    async fn merges_incremental_parts() {
        let service = ParsingService::new(
            transport(
                "multipart/mixed;boundary=\"graphql\";deferSpec=20220824",
                &[
                    "--graphql\r\ncontent-type: application/json\r\n\r\n",
                    r#"{"data":{"hero":{"__typename":"Droid","id":"2001","name":"R2-D2"}},"hasNext":true}"#,
                    "\r\n--graphql\r\ncontent-type: application/json\r\n\r\n",
                    r#"{"incremental":[{"label":"friends","path":["hero"],"data":{"friends":[{"__typename":"Human","id":"1000","name":"Luke Skywalker"}]}}],"hasNext":false}"#,
                    "\r\n--graphql--\r\n",
                ],
            ),
            "http://localhost/graphql".to_string(),
            HeaderValue::from_static("multipart/mixed;deferSpec=20220824"),
        );

        let chunks = chunks(service).await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].response.has_next, Some(true));
        assert!(chunks[0].delivered_labels.is_empty());
        assert_eq!(
            chunks[1].response.data,
            Some(json!({
                "hero": {
                    "__typename": "Droid",
                    "id": "2001",
                    "name": "R2-D2",
                    "friends": [{ "__typename": "Human", "id": "1000", "name": "Luke Skywalker" }]
                }
            }))
        );
        assert_eq!(chunks[1].response.has_next, Some(false));
        assert_eq!(
            chunks[1].delivered_labels,
            HashSet::from(["friends".to_string()])
        );
    }

    #[tokio::test]
    async fn a_final_part_without_payload_ends_the_stream() {
        let service = ParsingService::new(
            transport(
                "multipart/mixed;boundary=\"graphql\";deferSpec=20220824",
                &[
                    "--graphql\r\ncontent-type: application/json\r\n\r\n",
                    r#"{"data":{"hero":{"__typename":"Droid","id":"2001","name":"R2-D2"}},"hasNext":true}"#,
                    "\r\n--graphql\r\ncontent-type: application/json\r\n\r\n",
                    r#"{"incremental":[{"label":"friends","path":["hero"],"data":{"friends":[]}}],"hasNext":true}"#,
                    "\r\n--graphql\r\ncontent-type: application/json\r\n\r\n",
                    r#"{"hasNext":false}"#,
                    "\r\n--graphql--\r\n",
                ],
            ),
            "http://localhost/graphql".to_string(),
            HeaderValue::from_static("multipart/mixed;deferSpec=20220824"),
        );

        let chunks = chunks(service).await;
        let has_next: Vec<_> = chunks.iter().map(|chunk| chunk.response.has_next).collect();
        assert_eq!(has_next, vec![Some(true), Some(true), Some(false)]);
        assert_eq!(chunks[2].response.data, chunks[1].response.data);
        assert_eq!(
            chunks[2].delivered_labels,
            HashSet::from(["friends".to_string()])
        );
    }

    #[test]
    fn boundary_is_read_from_the_content_type() {
        assert_eq!(
            boundary("multipart/mixed;boundary=\"graphql\";deferSpec=20220824"),
            Some("graphql".to_string())
        );
        assert_eq!(boundary("multipart/mixed; boundary=-"), Some("-".to_string()));
        assert_eq!(boundary("multipart/mixed"), None);
    }
}
