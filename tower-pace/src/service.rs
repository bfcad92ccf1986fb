use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use pin_project_lite::pin_project;
use tokio::time::Sleep;
use tokio::time::Timeout;
use tokio::time::sleep;
use tokio::time::timeout;
use tower::BoxError;
use tower::Service;
use tracing::trace;
use tracing::warn;

use pace_limit::Reason;
use pace_limit::Strategy;

use crate::error::FetchError;

#[derive(Clone, Debug)]
struct PacingServiceMetrics {
    spacing_waits: Counter<u64>,
    dispatches: Counter<u64>,
}

/// Holds each dispatch back until the [`Strategy`] admits it.
///
/// `poll_ready` only resolves once a permit has been taken, and the permit
/// is spent by the following `call`. The service is not a queue by itself;
/// put it behind a `Buffer` to get one dispatch at a time in arrival order.
#[derive(Debug)]
pub struct PacingService<L, S>
where
    L: ?Sized,
{
    inner: S,
    limiter: Arc<L>,
    sleep: Option<Pin<Box<Sleep>>>,
    permit_acquired: bool,
    ready_error: Option<BoxError>,
    timeout: Option<Duration>,
    instruments: PacingServiceMetrics,
}

pin_project! {
    /// The caller's side of one dispatched call.
    pub struct ResponseFuture<F> {
        #[pin]
        state: ResponseState<F>,
    }
}

pin_project! {
    #[project = ResponseStateProj]
    enum ResponseState<F> {
        Bounded { #[pin] inner: Timeout<F> },
        Unbounded { #[pin] inner: F },
        // The transport failed readiness; nothing was dispatched.
        NotReady { error: Option<BoxError> },
    }
}

impl<F> ResponseFuture<F> {
    fn bounded(inner: Timeout<F>) -> Self {
        Self {
            state: ResponseState::Bounded { inner },
        }
    }

    fn unbounded(inner: F) -> Self {
        Self {
            state: ResponseState::Unbounded { inner },
        }
    }

    fn not_ready(error: BoxError) -> Self {
        Self {
            state: ResponseState::NotReady { error: Some(error) },
        }
    }
}

impl<F, T, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<T, E>>,
    E: From<BoxError>,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project().state.project() {
            ResponseStateProj::Bounded { inner } => match inner.poll(cx) {
                Poll::Ready(Ok(res)) => Poll::Ready(res),
                Poll::Ready(Err(_)) => Poll::Ready(Err(E::from(Box::new(FetchError::Timeout)))),
                Poll::Pending => Poll::Pending,
            },
            ResponseStateProj::Unbounded { inner } => inner.poll(cx),
            ResponseStateProj::NotReady { error } => {
                let error = error.take().unwrap_or_else(|| "transport not ready".into());
                Poll::Ready(Err(E::from(error)))
            }
        }
    }
}

// Manually implement Clone because Pin<Box<Sleep>> cannot be cloned
impl<L, S> Clone for PacingService<L, S>
where
    L: ?Sized,
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: Arc::clone(&self.limiter),
            // A clone starts without a pending sleep or an unspent permit
            sleep: None,
            permit_acquired: false,
            ready_error: None,
            timeout: self.timeout,
            instruments: self.instruments.clone(),
        }
    }
}

impl<L, S, Req> Service<Req> for PacingService<L, S>
where
    L: Strategy + ?Sized + Send + Sync + 'static,
    S: Service<Req, Error = BoxError>,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // A stored readiness failure is handed to the next call
        if self.ready_error.is_some() {
            return Poll::Ready(Ok(()));
        }

        // 1. If we are sitting out the spacing delta, check if we're done
        if let Some(ref mut fut) = self.sleep {
            match fut.as_mut().poll(cx) {
                Poll::Ready(_) => self.sleep = None,
                Poll::Pending => return Poll::Pending,
            }
        }

        // 2. Check inner service readiness FIRST so a permit is never taken early
        match self.inner.poll_ready(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Err(e)) => {
                // A Buffer worker treats a readiness error as fatal to the
                // queue; only the next attempt fails instead.
                let error = match FetchError::from_boxed(e) {
                    FetchError::Transport(reason) => {
                        FetchError::Transport(format!("transport not ready: {reason}"))
                    }
                    other => other,
                };
                warn!(%error, "transport failed readiness; failing one attempt");
                self.ready_error = Some(Box::new(error));
                return Poll::Ready(Ok(()));
            }
            Poll::Ready(Ok(())) => {}
        }

        // 3. Ask the strategy if we don't hold a permit yet
        if !self.permit_acquired {
            match self.limiter.process() {
                ControlFlow::Continue(_) => {
                    self.permit_acquired = true;
                }
                ControlFlow::Break(reason) => {
                    let Reason::Overloaded { retry_after } = reason;
                    trace!(?retry_after, "holding dispatch for spacing");

                    let strategy = format!("{:?}", self.limiter);
                    self.instruments
                        .spacing_waits
                        .add(1, &[KeyValue::new("strategy", strategy)]);

                    let mut sleep_fut = Box::pin(sleep(retry_after));
                    match sleep_fut.as_mut().poll(cx) {
                        Poll::Pending => {
                            self.sleep = Some(sleep_fut);
                            return Poll::Pending;
                        }
                        Poll::Ready(_) => {
                            // Immediate wakeup (sleep(0) or similar)
                            cx.waker().wake_by_ref();
                            return Poll::Pending;
                        }
                    }
                }
            }
        }

        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        if let Some(error) = self.ready_error.take() {
            return ResponseFuture::not_ready(error);
        }

        self.permit_acquired = false;
        self.instruments.dispatches.add(1, &[]);

        let inner = self.inner.call(req);
        match self.timeout {
            Some(limit) => ResponseFuture::bounded(timeout(limit, inner)),
            None => ResponseFuture::unbounded(inner),
        }
    }
}

impl<L, S> PacingService<L, S>
where
    L: ?Sized,
{
    pub fn new(inner: S, limiter: Arc<L>) -> Self {
        let meter = global::meter("pacing_service");
        let instruments = PacingServiceMetrics {
            spacing_waits: meter.u64_counter("spacing_waits").build(),
            dispatches: meter.u64_counter("dispatches").build(),
        };

        Self {
            inner,
            limiter,
            sleep: None,
            permit_acquired: false,
            ready_error: None,
            timeout: None,
            instruments,
        }
    }

    /// Bound each dispatched call. An attempt that runs longer fails with
    /// [`FetchError::Timeout`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
