//! Sends requests again after transport failures.

use std::task::Poll;
use std::time::Duration;

use futures::future::BoxFuture;
use rand::Rng;
use tower::BoxError;
use tower::Layer;
use tower::Service;
use tower::ServiceExt;
use tracing::Instrument;

use crate::configuration::Backoff;
use crate::configuration::Retry;
use crate::error::FetchError;
use crate::services::request;

impl Backoff {
    /// How long to wait before the `attempt`th retry, counting from 1.
    pub(crate) fn delay(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as usize) as i32;
        let delay = self.base.as_secs_f64() * self.multiplier.powi(exponent);
        let delay = Duration::try_from_secs_f64(delay)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);
        if self.jitter {
            delay.mul_f64(rand::rng().random_range(0.5..=1.0))
        } else {
            delay
        }
    }
}

/// [`Layer`] retrying requests whose failure is [retryable](FetchError::is_retryable).
///
/// The attempts are counted per request. Once `max_retries` retries failed, the request fails
/// with [`FetchError::RetriedTooManyTimes`].
#[derive(Clone)]
pub(crate) struct RetryLayer {
    configuration: Retry,
}

impl RetryLayer {
    pub(crate) fn new(configuration: Retry) -> Self {
        Self { configuration }
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = RetryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RetryService {
            inner,
            configuration: self.configuration.clone(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct RetryService<S> {
    inner: S,
    configuration: Retry,
}

impl<S> Service<request::Request> for RetryService<S>
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
        let configuration = self.configuration.clone();

        let fut = async move {
            let mut attempts = 0;
            loop {
                let error = match inner.clone().oneshot(request.clone()).await {
                    Ok(response) => return Ok(response),
                    Err(error) => error,
                };
                let retryable = error
                    .downcast_ref::<FetchError>()
                    .map(FetchError::is_retryable)
                    .unwrap_or(false);
                if !retryable {
                    return Err(error);
                }

                attempts += 1;
                if attempts > configuration.max_retries {
                    tracing::warn!(
                        operation = %request.operation.name,
                        %error,
                        "giving up after {} retries",
                        configuration.max_retries
                    );
                    return Err(FetchError::RetriedTooManyTimes {
                        operation_name: request.operation.name.clone(),
                        max_retries: configuration.max_retries,
                    }
                    .into());
                }

                tracing::debug!(
                    operation = %request.operation.name,
                    %error,
                    attempts,
                    "retrying"
                );
                if let Some(backoff) = &configuration.backoff {
                    tokio::select! {
                        _ = tokio::time::sleep(backoff.delay(attempts)) => {}
                        _ = request.cancellation.cancelled() => {
                            return Err(FetchError::Cancelled.into());
                        }
                    }
                }
            }
        }
        .in_current_span();
        Box::pin(fut)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use tower::service_fn;

    use super::*;
    use crate::execution::GraphQLResult;
    use crate::test_fixtures;

    /// Fails with a transport error until `failures` calls were made.
    fn flaky(failures: usize, calls: Arc<AtomicUsize>) -> request::BoxCloneService {
        request::BoxCloneService::new(service_fn(move |_request: request::Request| {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if call <= failures {
                    Err(BoxError::from(FetchError::Transport {
                        reason: "connection reset".to_string(),
                    }))
                } else {
                    Ok(request::Response::once(Ok(GraphQLResult::from_server(
                        None,
                        Vec::new(),
                        Default::default(),
                    ))))
                }
            }
        }))
    }

    fn request() -> request::Request {
        request::Request::builder()
            .operation(test_fixtures::hero_name_query())
            .build()
    }

    fn retry(max_retries: usize, backoff: Option<Backoff>) -> Retry {
        Retry::builder()
            .max_retries(max_retries)
            .and_backoff(backoff)
            .build()
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = RetryLayer::new(retry(2, None)).layer(flaky(usize::MAX, calls.clone()));

        let error = service.oneshot(request()).await.err().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            error.downcast_ref::<FetchError>(),
            Some(FetchError::RetriedTooManyTimes { max_retries: 2, .. })
        ));
    }

    #[tokio::test]
    async fn succeeds_on_a_later_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = RetryLayer::new(retry(3, None)).layer(flaky(1, calls.clone()));

        assert!(service.oneshot(request()).await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let inner = request::BoxCloneService::new(service_fn(move |_request: request::Request| {
            counted.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<request::Response, _>(BoxError::from(FetchError::MalformedResponse {
                    reason: "not json".to_string(),
                }))
            }
        }));
        let service = RetryLayer::new(retry(3, None)).layer(inner);

        let error = service.oneshot(request()).await.err().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            error.downcast_ref::<FetchError>(),
            Some(FetchError::MalformedResponse { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_backoff() {
        let calls = Arc::new(AtomicUsize::new(0));
        let backoff = Backoff {
            base: Duration::from_secs(60),
            jitter: false,
            ..Default::default()
        };
        let service =
            RetryLayer::new(retry(3, Some(backoff))).layer(flaky(usize::MAX, calls.clone()));

        let request = request();
        let cancellation = request.cancellation.clone();
        let response = tokio::spawn(service.oneshot(request));
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancellation.cancel();

        let error = response.await.unwrap().err().unwrap();
        assert!(matches!(
            error.downcast_ref::<FetchError>(),
            Some(FetchError::Cancelled)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delays_grow_exponentially_up_to_the_max() {
        let backoff = Backoff {
            base: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_millis(500),
            jitter: false,
        };
        let delays: Vec<_> = (1..=5).map(|attempt| backoff.delay(attempt)).collect();
        assert_eq!(
            delays,
            [100, 200, 400, 500, 500].map(Duration::from_millis).to_vec()
        );

        let jittered = Backoff {
            jitter: true,
            ..backoff
        };
        for _ in 0..20 {
            let delay = jittered.delay(2);
            assert!(delay >= Duration::from_millis(100) && delay <= Duration::from_millis(200));
        }
    }
}
