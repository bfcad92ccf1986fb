//! # Tower Pace
//!
//! `tower-pace` is a paced, retrying fetch queue for read-only JSON APIs, built for
//! the [Tower](https://github.com/tower-rs/tower) ecosystem.
//!
//! ## The Queue Stack
//! [`FetchQueueLayer`] composes three services over a transport:
//!
//! 1. **Retry**: up to three attempts per request. A `429` waits for the server's
//!    `Retry-After`, other failures back off linearly (1s, 2s). Non-429 error
//!    statuses are final at once.
//! 2. **Buffer**: one worker drains a bounded channel, so dispatches happen one at a
//!    time in the order callers arrived, across every clone of the queue.
//! 3. **Pacing**: the worker waits until the [`pace_limit::Strategy`] admits the
//!    next dispatch (by default [`pace_limit::Spacing`] at 200ms, i.e. 5 req/s).
//!
//! [`FetchQueue`] is the caller-facing handle. [`FetchQueue::enqueue`] is fail-soft:
//! every failure turns into an empty list. [`FetchQueue::try_enqueue`] returns the
//! [`FetchError`] instead.
//!
//! ## Caching
//! The queue caches nothing. Callers that keep decoded results should revalidate
//! them after [`REVALIDATE_AFTER`].

use std::time::Duration;

mod config;
mod error;
mod layer;
mod managed_layer;
mod outcome;
mod queue;
mod request;
mod retry_layer;
mod retry_service;
mod service;
mod transport;


pub use config::ConfigError;
pub use config::DEFAULT_BASE_URL;
pub use config::DEFAULT_CAPACITY;
pub use config::QueueConfig;
pub use error::FetchError;
pub use layer::PacingLayer;
pub use managed_layer::FetchQueueLayer;
pub use outcome::AttemptOutcome;
pub use queue::FetchQueue;
pub use request::ApiRequest;
pub use request::ApiResponse;
pub use request::ParamValue;
pub use retry_layer::FetchRetryLayer;
pub use retry_service::FetchRetryService;
pub use service::PacingService;
pub use transport::HttpTransport;
pub use transport::parse_retry_after;

/// How long a caller-side cache may serve a decoded response before refetching.
pub const REVALIDATE_AFTER: Duration = Duration::from_secs(60);
