use std::sync::Arc;
use std::time::Duration;

use pace_limit::Strategy;
use tower::Layer;

use crate::service::PacingService;

/// Applies a pacing [`Strategy`] to dispatches.
#[derive(Debug)]
pub struct PacingLayer<L>
where
    L: ?Sized,
{
    limiter: Arc<L>,
    timeout: Option<Duration>,
}

impl<L> Clone for PacingLayer<L>
where
    L: ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
            timeout: self.timeout,
        }
    }
}

impl<L> PacingLayer<L>
where
    L: Strategy + ?Sized,
{
    /// Create a PacingLayer
    pub fn new(limiter: Arc<L>) -> Self {
        PacingLayer {
            limiter,
            timeout: None,
        }
    }

    /// Bound every dispatched call.
    ///
    /// The clock starts when the call is dispatched, not while it waits for
    /// its slot.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl<L, S> Layer<S> for PacingLayer<L>
where
    L: ?Sized,
{
    type Service = PacingService<L, S>;

    fn layer(&self, service: S) -> Self::Service {
        let svc = PacingService::new(service, self.limiter.clone());
        match self.timeout {
            Some(timeout) => svc.with_timeout(timeout),
            None => svc,
        }
    }
}
