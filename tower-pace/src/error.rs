use std::time::Duration;

use tower::BoxError;

/// Errors produced by the fetch queue stack.
///
/// Inside the tower stack these travel as [`BoxError`] and are recovered with
/// [`FetchError::from_boxed`] at the queue boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    /// The upstream answered `429 Too Many Requests`.
    ///
    /// `retry_after` is the parsed `Retry-After` header, when one was sent.
    #[error("Upstream rate limited the request; retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// The request never produced a complete response (connect, TLS, or body read failure).
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The request exceeded the per-attempt timeout.
    #[error("Request timed out")]
    Timeout,

    /// The upstream answered with a non-success status other than 429.
    ///
    /// This is never retried; 4xx and 5xx are treated alike.
    #[error("Upstream answered with status {0}")]
    Status(u16),

    /// Every allowed attempt failed with a retryable error.
    #[error("Gave up after {attempts} attempts; last error: {last}")]
    Exhausted {
        attempts: usize,
        last: Box<FetchError>,
    },

    /// A success response whose body is not a JSON array of the expected records.
    #[error("Response body is not a JSON array of records: {0}")]
    Decode(String),

    /// The request could not be turned into a URL, or the client could not be built.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl FetchError {
    /// Whether another attempt at the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Transport(_) | Self::Timeout
        )
    }

    /// Recover a `FetchError` from an error that crossed a tower boundary.
    ///
    /// Foreign errors (a closed buffer worker, an io error) become
    /// [`FetchError::Transport`].
    pub fn from_boxed(err: BoxError) -> Self {
        match err.downcast::<FetchError>() {
            Ok(fetch_err) => *fetch_err,
            Err(err) if err.is::<tower::timeout::error::Elapsed>() => Self::Timeout,
            Err(err) => Self::Transport(err.to_string()),
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
