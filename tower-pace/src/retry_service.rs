use std::task::Context;
use std::task::Poll;

use bytes::Bytes;
use futures::future::BoxFuture;
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use tower::BoxError;
use tower::Service;
use tower::ServiceExt;
use tracing::debug;
use tracing::warn;

use pace_limit::RetryPolicy;

use crate::ApiRequest;
use crate::ApiResponse;
use crate::FetchError;
use crate::outcome::AttemptOutcome;

#[derive(Clone, Debug)]
struct RetryServiceMetrics {
    retries: Counter<u64>,
}

/// Drives one request through up to `max_attempts` attempts.
///
/// Every attempt goes back through `inner`, so when `inner` is the paced
/// buffer each retry is queued and spaced like a fresh request. Backoff
/// sleeps happen here, outside the queue, and never hold up other requests.
#[derive(Clone, Debug)]
pub struct FetchRetryService<S> {
    inner: S,
    policy: RetryPolicy,
    instruments: RetryServiceMetrics,
}

impl<S> FetchRetryService<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        let meter = global::meter("fetch_retry_service");
        let instruments = RetryServiceMetrics {
            retries: meter.u64_counter("retries").build(),
        };

        Self {
            inner,
            policy,
            instruments,
        }
    }
}

impl<S> Service<ApiRequest> for FetchRetryService<S>
where
    S: Service<ApiRequest, Response = ApiResponse, Error = BoxError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Bytes;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Bytes, BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Readiness of `inner` is awaited per attempt inside `call`, where a
        // failure counts against the attempt budget instead of failing here.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ApiRequest) -> Self::Future {
        let mut inner = self.inner.clone();
        let policy = self.policy;
        let instruments = self.instruments.clone();

        Box::pin(async move {
            let mut attempt = 0;
            loop {
                attempt += 1;

                let result = match inner.ready().await {
                    Ok(svc) => svc.call(req.clone()).await,
                    Err(err) => Err(err),
                };

                let (err, hint) = match AttemptOutcome::classify(result) {
                    AttemptOutcome::Success(body) => {
                        if attempt > 1 {
                            debug!(request = %req, attempt, "succeeded after retry");
                        }
                        return Ok(body);
                    }
                    AttemptOutcome::PermanentFailure(err) => {
                        debug!(request = %req, attempt, error = %err, "not retrying");
                        return Err(Box::new(err) as BoxError);
                    }
                    AttemptOutcome::RateLimited { retry_after } => {
                        (FetchError::RateLimited { retry_after }, retry_after)
                    }
                    AttemptOutcome::TransientFailure(err) => (err, None),
                };

                let Some(delay) = policy.delay_after(attempt, hint) else {
                    warn!(request = %req, attempts = attempt, error = %err, "retries exhausted");
                    return Err(Box::new(FetchError::Exhausted {
                        attempts: attempt,
                        last: Box::new(err),
                    }) as BoxError);
                };

                warn!(
                    request = %req,
                    attempt,
                    error = %err,
                    ?delay,
                    "attempt failed; retrying"
                );
                instruments
                    .retries
                    .add(1, &[KeyValue::new("path", req.path().to_string())]);
                tokio::time::sleep(delay).await;
            }
        })
    }
}
