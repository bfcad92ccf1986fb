use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use pace_limit::RetryPolicy;
use pace_limit::Strategy;
use tower::BoxError;
use tower::Layer;
use tower::Service;
use tower::buffer::Buffer;
use tower::util::BoxCloneSyncService;

use crate::ApiRequest;
use crate::ApiResponse;
use crate::FetchRetryService;
use crate::PacingLayer;
use crate::config::DEFAULT_CAPACITY;

/// The complete fetch queue stack over a transport.
///
/// From the outside in:
///
/// 1. **Retry** ([`FetchRetryService`]): bounded attempts with linear backoff,
///    honouring `Retry-After` on 429. Backoff sleeps happen per caller.
/// 2. **Buffer**: a single-consumer channel. Its worker is the only place a
///    dispatch happens, so dispatches are strictly in arrival order.
/// 3. **Pacing** ([`crate::PacingService`]): the worker waits here until the
///    strategy admits the next dispatch; the call is then issued at once.
///
/// The response future of a dispatched call is returned to its caller, so a
/// slow upstream never holds the slot for the next request.
///
/// Layering must happen inside a tokio runtime: the buffer worker is spawned
/// immediately.
pub struct FetchQueueLayer<L>
where
    L: ?Sized,
{
    limiter: Arc<L>,
    policy: RetryPolicy,
    request_timeout: Option<Duration>,
    capacity: NonZeroUsize,
}

// Note: Deriving Clone would require L: Clone.
impl<L> Clone for FetchQueueLayer<L>
where
    L: ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            limiter: self.limiter.clone(),
            policy: self.policy,
            request_timeout: self.request_timeout,
            capacity: self.capacity,
        }
    }
}

impl<L> FetchQueueLayer<L>
where
    L: Strategy + ?Sized,
{
    pub fn new(limiter: Arc<L>, policy: RetryPolicy) -> Self {
        Self {
            limiter,
            policy,
            request_timeout: None,
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Bound each attempt once it has been dispatched.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// How many callers may wait on the buffer before further callers are
    /// themselves held back.
    pub fn with_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.capacity = capacity;
        self
    }
}

impl<S, L> Layer<S> for FetchQueueLayer<L>
where
    L: Strategy + ?Sized + Send + Sync + 'static,
    S: Service<ApiRequest, Response = ApiResponse, Error = BoxError> + Send + 'static,
    S::Future: Send + 'static,
{
    type Service = BoxCloneSyncService<ApiRequest, Bytes, BoxError>;

    fn layer(&self, inner: S) -> Self::Service {
        let mut pacing = PacingLayer::new(self.limiter.clone());
        if let Some(timeout) = self.request_timeout {
            pacing = pacing.with_timeout(timeout);
        }

        let buffered: Buffer<ApiRequest, _> = Buffer::new(pacing.layer(inner), self.capacity.get());

        BoxCloneSyncService::new(FetchRetryService::new(buffered, self.policy))
    }
}
