use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;
use reqwest::header::RETRY_AFTER;
use tower::BoxError;
use tower::Service;
use tracing::debug;

use crate::ApiRequest;
use crate::ApiResponse;
use crate::FetchError;

/// The production transport: one reqwest GET per request against a fixed base URL.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    base_url: Arc<str>,
}

impl HttpTransport {
    /// Build a transport with its own client.
    pub fn new(base_url: &str, user_agent: Option<&str>) -> Result<Self, FetchError> {
        let mut builder = Client::builder();
        if let Some(agent) = user_agent {
            builder = builder.user_agent(agent);
        }
        let client = builder.build().map_err(FetchError::from_reqwest)?;
        Ok(Self::with_client(client, base_url))
    }

    /// Build a transport around an existing client.
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: Arc::from(base_url),
        }
    }
}

impl Service<ApiRequest> for HttpTransport {
    type Response = ApiResponse;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<ApiResponse, BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ApiRequest) -> Self::Future {
        let client = self.client.clone();
        let url = req.url(&self.base_url);

        Box::pin(async move {
            let url = url?;
            debug!(%url, "GET");

            let response = client
                .get(url)
                .send()
                .await
                .map_err(FetchError::from_reqwest)?;

            let status = response.status().as_u16();
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let body = response.bytes().await.map_err(FetchError::from_reqwest)?;

            Ok(ApiResponse {
                status,
                retry_after,
                body,
            })
        })
    }
}

/// Parse a `Retry-After` value given in whole seconds.
///
/// The HTTP-date form and anything else unparseable yield `None`, which
/// makes the retry loop fall back to its own backoff.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
