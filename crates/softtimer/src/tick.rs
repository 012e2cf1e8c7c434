//! Global tick counter.
//!
//! Incremented only by the timer task (through
//! [`TimerRegistry::advance`](crate::registry::TimerRegistry::advance)) and
//! read by any thread computing match or remaining ticks.

use core::sync::atomic::{AtomicU64, Ordering};

/// Monotonic count of processed tick notifications.
#[derive(Debug, Default)]
pub struct TickCounter {
    ticks: AtomicU64,
}

impl TickCounter {
    /// Create a counter starting at tick zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
        }
    }

    /// Current tick.
    #[inline]
    #[must_use]
    pub fn current(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Advance by one tick and return the new value.
    #[inline]
    pub(crate) fn advance(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }
}
