use std::time::Duration;

use bytes::Bytes;
use tower::BoxError;

use crate::ApiResponse;
use crate::FetchError;

/// The classified result of a single attempt.
#[derive(Debug, PartialEq)]
pub enum AttemptOutcome {
    /// 2xx; the body is handed to the caller.
    Success(Bytes),
    /// 429, with the server's `Retry-After` hint if it sent one.
    RateLimited { retry_after: Option<Duration> },
    /// Worth another attempt: transport failure or timeout.
    TransientFailure(FetchError),
    /// Not worth another attempt.
    PermanentFailure(FetchError),
}

impl AttemptOutcome {
    pub fn classify(result: Result<ApiResponse, BoxError>) -> Self {
        match result {
            Ok(response) if response.is_success() => Self::Success(response.body),
            Ok(response) if response.status == 429 => Self::RateLimited {
                retry_after: response.retry_after,
            },
            Ok(response) => Self::PermanentFailure(FetchError::Status(response.status)),
            Err(err) => {
                let err = FetchError::from_boxed(err);
                if err.is_retryable() {
                    Self::TransientFailure(err)
                } else {
                    Self::PermanentFailure(err)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_2xx_is_success() {
        let outcome = AttemptOutcome::classify(Ok(ApiResponse::new(200, "[1]")));
        assert_eq!(outcome, AttemptOutcome::Success(Bytes::from_static(b"[1]")));
    }

    #[test]
    fn too_many_requests_carries_its_hint() {
        let response = ApiResponse::new(429, "").with_retry_after(Duration::from_secs(2));
        assert_eq!(
            AttemptOutcome::classify(Ok(response)),
            AttemptOutcome::RateLimited {
                retry_after: Some(Duration::from_secs(2))
            }
        );
    }

    #[test]
    fn client_and_server_errors_are_both_permanent() {
        for status in [400, 404, 500, 503] {
            assert_eq!(
                AttemptOutcome::classify(Ok(ApiResponse::new(status, ""))),
                AttemptOutcome::PermanentFailure(FetchError::Status(status))
            );
        }
    }

    #[test]
    fn transport_errors_are_transient() {
        let err: BoxError = Box::new(FetchError::Transport("reset".into()));
        assert!(matches!(
            AttemptOutcome::classify(Err(err)),
            AttemptOutcome::TransientFailure(FetchError::Transport(_))
        ));
    }

    #[test]
    fn bad_requests_are_permanent() {
        let err: BoxError = Box::new(FetchError::InvalidRequest("no host".into()));
        assert!(matches!(
            AttemptOutcome::classify(Err(err)),
            AttemptOutcome::PermanentFailure(FetchError::InvalidRequest(_))
        ));
    }
}
