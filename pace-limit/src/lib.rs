//! # pace-limit
//!
//! `pace-limit` provides the admission and retry arithmetic behind a paced API client.
//!
//! ## Core Philosophy
//!
//! An upstream API that allows a handful of requests per second is best served by a client
//! that never bursts. [`Spacing`] admits one dispatch at a time and keeps every pair of
//! consecutive dispatches at least a fixed interval apart. The state is a single atomic
//! word updated with Compare-And-Swap, so the last dispatch instant and the next permitted
//! slot can never be observed apart.
//!
//! ## Key Concepts
//!
//! * **Strategy Trait**: A unified, non-blocking admission interface. A rejection carries
//!   the exact duration the caller should wait.
//! * **Lazy Evaluation**: Slots are computed at the moment of the request; there are no
//!   background timers.
//! * **Bounded Retry**: [`RetryPolicy`] answers "may I try again, and after how long?" for
//!   a fixed attempt budget with linear backoff.
//!
//! ## Example
//!
//! ```rust
//! use pace_limit::Spacing;
//! use pace_limit::Strategy;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let spacing = Spacing::new(Duration::from_millis(200));
//!
//! assert!(spacing.process().is_continue());
//! // A second dispatch inside the interval is told how long to wait.
//! assert!(spacing.process().is_break());
//! # }
//! ```

use std::fmt::Debug;
use std::ops::ControlFlow;
use std::time::Duration;

mod retry;
mod spacing;

pub use retry::RetryPolicy;
pub use spacing::Spacing;

/// Reasons why a dispatch might be held back by a strategy.
#[derive(Debug, PartialEq)]
pub enum Reason {
    Overloaded { retry_after: Duration },
}

/// The core trait for all admission strategies.
///
/// Strategies must be `Send` and `Sync` to allow sharing across thread boundaries
/// via `Arc`.
pub trait Strategy: Debug {
    /// Attempts to admit a single dispatch.
    ///
    /// This method is non-blocking and uses atomic operations to update
    /// internal state. A `Continue` means the dispatch has been recorded and
    /// must be issued now.
    ///
    /// # Errors
    ///
    /// Returns `Reason` if the dispatch must wait.
    fn process(&self) -> ControlFlow<Reason>;
}
