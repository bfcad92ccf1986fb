use bytes::Bytes;
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use serde::de::DeserializeOwned;
use tower::BoxError;
use tower::Layer;
use tower::Service;
use tower::ServiceExt;
use tower::util::BoxCloneSyncService;
use tracing::error;

use crate::ApiRequest;
use crate::ApiResponse;
use crate::FetchError;
use crate::FetchQueueLayer;
use crate::HttpTransport;
use crate::QueueConfig;

/// The caller-facing handle on a paced, retrying fetch stack.
///
/// Clones share one queue: one dispatch channel, one spacing state. Build
/// one per upstream at the composition root and pass clones to whatever
/// needs data. Construction must happen inside a tokio runtime.
#[derive(Clone)]
pub struct FetchQueue {
    service: BoxCloneSyncService<ApiRequest, Bytes, BoxError>,
    fail_soft: Counter<u64>,
}

impl std::fmt::Debug for FetchQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchQueue").finish_non_exhaustive()
    }
}

impl FetchQueue {
    /// A queue over the real upstream described by `config`.
    pub fn new(config: &QueueConfig) -> Result<Self, FetchError> {
        let transport = HttpTransport::new(&config.base_url, config.user_agent.as_deref())?;
        Ok(Self::with_transport(config, transport))
    }

    /// A queue over any transport, paced and retried per `config`.
    ///
    /// `config.base_url` and `config.user_agent` are the transport's concern
    /// and are ignored here.
    pub fn with_transport<S>(config: &QueueConfig, transport: S) -> Self
    where
        S: Service<ApiRequest, Response = ApiResponse, Error = BoxError> + Send + 'static,
        S::Future: Send + 'static,
    {
        let mut layer = FetchQueueLayer::new(config.spacing(), config.retry_policy())
            .with_capacity(config.capacity);
        if let Some(timeout) = config.request_timeout {
            layer = layer.with_request_timeout(timeout);
        }
        Self::from_service(layer.layer(transport))
    }

    /// Wrap an already composed stack.
    pub fn from_service(service: BoxCloneSyncService<ApiRequest, Bytes, BoxError>) -> Self {
        let meter = global::meter("fetch_queue");
        Self {
            service,
            fail_soft: meter.u64_counter("fail_soft").build(),
        }
    }

    /// Fetch the raw body of a successful response.
    pub async fn fetch(&self, request: ApiRequest) -> Result<Bytes, FetchError> {
        self.service
            .clone()
            .oneshot(request)
            .await
            .map_err(FetchError::from_boxed)
    }

    /// Fetch and decode a JSON array of records, reporting why if that failed.
    pub async fn try_enqueue<T>(&self, request: ApiRequest) -> Result<Vec<T>, FetchError>
    where
        T: DeserializeOwned,
    {
        let body = self.fetch(request).await?;
        serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// Fetch and decode a JSON array of records.
    ///
    /// Never fails: whatever went wrong is logged and the caller sees an
    /// empty list, exactly as if the upstream had no matching records. Use
    /// [`FetchQueue::try_enqueue`] to tell the two apart.
    pub async fn enqueue<T>(&self, request: ApiRequest) -> Vec<T>
    where
        T: DeserializeOwned,
    {
        let path = request.path().to_string();
        let url = request.to_string();
        match self.try_enqueue(request).await {
            Ok(records) => records,
            Err(err) => {
                error!(request = %url, error = %err, "fetch failed; returning no records");
                self.fail_soft.add(1, &[KeyValue::new("path", path)]);
                Vec::new()
            }
        }
    }
}
