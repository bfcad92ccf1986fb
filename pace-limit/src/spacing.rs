use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

use crate::Reason;
use crate::Strategy;

/// Minimum-interval pacing.
///
/// Admits one dispatch, then holds every following dispatch back until
/// `interval` has elapsed since the previous one. With an interval of 200ms
/// this is a ceiling of 5 dispatches per second with no burst allowance.
///
/// Time is read from [`tokio::time::Instant`], so a paused test runtime
/// drives the strategy deterministically.
#[derive(Debug)]
pub struct Spacing {
    /// Earliest permitted dispatch, in nanoseconds from `anchor`.
    ///
    /// This is the last dispatch instant plus `interval`; both live in one
    /// word so they always change together.
    next_slot: AtomicU64,
    interval_ns: u64,
    anchor: Instant,
}

impl Spacing {
    /// Creates a new `Spacing` strategy.
    ///
    /// # Arguments
    ///
    /// * `interval` - The minimum gap between two consecutive dispatches.
    pub fn new(interval: Duration) -> Self {
        Self {
            next_slot: AtomicU64::new(0),
            interval_ns: u64::try_from(interval.as_nanos()).unwrap_or(u64::MAX),
            anchor: Instant::now(),
        }
    }

    /// The configured minimum gap between dispatches.
    pub fn interval(&self) -> Duration {
        Duration::from_nanos(self.interval_ns)
    }

    /// The earliest instant at which the next dispatch will be admitted.
    pub fn next_slot(&self) -> Instant {
        self.anchor + Duration::from_nanos(self.next_slot.load(Ordering::Acquire))
    }

    fn now_ns(&self) -> u64 {
        u64::try_from(Instant::now().duration_since(self.anchor).as_nanos()).unwrap_or(u64::MAX)
    }
}

impl Strategy for Spacing {
    #[inline]
    fn process(&self) -> ControlFlow<Reason> {
        let now = self.now_ns();

        loop {
            let next = self.next_slot.load(Ordering::Acquire);

            if now < next {
                return ControlFlow::Break(Reason::Overloaded {
                    retry_after: Duration::from_nanos(next - now),
                });
            }

            if self
                .next_slot
                .compare_exchange_weak(
                    next,
                    now.saturating_add(self.interval_ns),
                    Ordering::Release,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                return ControlFlow::Continue(());
            }
        }
    }
}
