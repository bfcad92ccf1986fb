use pace_limit::RetryPolicy;
use tower::Layer;

use crate::retry_service::FetchRetryService;

/// Wraps a transport stack in [`FetchRetryService`].
#[derive(Clone, Debug, Default)]
pub struct FetchRetryLayer {
    policy: RetryPolicy,
}

impl FetchRetryLayer {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }
}

impl<S> Layer<S> for FetchRetryLayer {
    type Service = FetchRetryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        FetchRetryService::new(inner, self.policy)
    }
}
