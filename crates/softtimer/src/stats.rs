//! Atomic counters for the timer manager and its task.
//!
//! All `inc_*` methods are a single relaxed `fetch_add`: no allocation, no
//! blocking, safe to call from the tick path. Counters are eventually
//! consistent with each other; read them through [`TimerStats::snapshot`].

use core::sync::atomic::{AtomicU64, Ordering};
use serde::Serialize;

/// Point-in-time copy of [`TimerStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TimerStatsSnapshot {
    /// Tick notifications processed by the timer task.
    pub ticks_processed: u64,
    /// Timers found due during a scan.
    pub expirations: u64,
    /// Callbacks invoked, on expiry or on stop.
    pub callbacks_invoked: u64,
    /// Periodic timers re-armed after firing.
    pub periodic_rearms: u64,
    /// Timers created.
    pub timers_created: u64,
    /// Timers returned to the pool, explicitly or after a one-shot fired.
    pub timers_deleted: u64,
    /// `create` calls rejected because the pool was empty.
    pub pool_exhausted: u64,
    /// Tick notifications dropped because the tick queue was full.
    pub dropped_ticks: u64,
    /// Internal consistency faults seen by the timer task.
    pub internal_faults: u64,
}

/// Lock-free counters shared by the manager, the task and tick notifiers.
#[derive(Debug, Default)]
pub struct TimerStats {
    ticks_processed: AtomicU64,
    expirations: AtomicU64,
    callbacks_invoked: AtomicU64,
    periodic_rearms: AtomicU64,
    timers_created: AtomicU64,
    timers_deleted: AtomicU64,
    pool_exhausted: AtomicU64,
    dropped_ticks: AtomicU64,
    internal_faults: AtomicU64,
}

impl TimerStats {
    /// Create zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ticks_processed: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            callbacks_invoked: AtomicU64::new(0),
            periodic_rearms: AtomicU64::new(0),
            timers_created: AtomicU64::new(0),
            timers_deleted: AtomicU64::new(0),
            pool_exhausted: AtomicU64::new(0),
            dropped_ticks: AtomicU64::new(0),
            internal_faults: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn inc_tick(&self) {
        self.ticks_processed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_callback(&self) {
        self.callbacks_invoked.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_rearm(&self) {
        self.periodic_rearms.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_created(&self) {
        self.timers_created.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_deleted(&self) {
        self.timers_deleted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_pool_exhausted(&self) {
        self.pool_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_dropped_tick(&self) {
        self.dropped_ticks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_internal_fault(&self) {
        self.internal_faults.fetch_add(1, Ordering::Relaxed);
    }

    /// Ticks processed so far.
    #[must_use]
    pub fn ticks_processed(&self) -> u64 {
        self.ticks_processed.load(Ordering::Relaxed)
    }

    /// Internal faults seen so far.
    #[must_use]
    pub fn internal_faults(&self) -> u64 {
        self.internal_faults.load(Ordering::Relaxed)
    }

    /// Read every counter.
    #[must_use]
    pub fn snapshot(&self) -> TimerStatsSnapshot {
        TimerStatsSnapshot {
            ticks_processed: self.ticks_processed.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            callbacks_invoked: self.callbacks_invoked.load(Ordering::Relaxed),
            periodic_rearms: self.periodic_rearms.load(Ordering::Relaxed),
            timers_created: self.timers_created.load(Ordering::Relaxed),
            timers_deleted: self.timers_deleted.load(Ordering::Relaxed),
            pool_exhausted: self.pool_exhausted.load(Ordering::Relaxed),
            dropped_ticks: self.dropped_ticks.load(Ordering::Relaxed),
            internal_faults: self.internal_faults.load(Ordering::Relaxed),
        }
    }
}
