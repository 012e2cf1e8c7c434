//! Timer lifecycle API.
//!
//! [`TimerManager`] owns the slot arena, the [`TimerPool`] and the
//! [`TimerRegistry`], and implements the timer state machine:
//!
//! ```text
//! Unused --create--> Stopped --start--> Running --expire--> Completed
//!                       ^                  |                    |
//!                       +------stop--------+      start (periodic re-arm)
//! Stopped | Running | Completed --delete--> Unused
//! ```
//!
//! # Locking
//!
//! Every slot has its own lock. An operation holds the slot lock and nests at
//! most one of the registry lock or the pool lock inside it; the registry and
//! pool locks are never nested. Callbacks run after every internal lock has
//! been released, so they may call back into the manager.

use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, error, trace, warn};

use crate::config::TimerConfig;
use crate::error::{TimerError, TimerResult};
use crate::pool::TimerPool;
use crate::registry::TimerRegistry;
use crate::stats::{TimerStats, TimerStatsSnapshot};
use crate::timer::{
    StopOption, StopOutcome, TimerCallback, TimerHandle, TimerInfo, TimerMode, TimerSlot,
    TimerState,
};

static NEXT_TAG: AtomicU32 = AtomicU32::new(1);

/// Tags distinguish handles minted by different managers. Zero marks the
/// null handle and is never issued.
fn next_tag() -> u32 {
    loop {
        let tag = NEXT_TAG.fetch_add(1, Ordering::Relaxed);
        if tag != 0 {
            return tag;
        }
    }
}

type Invocation<A> = Option<(TimerCallback<A>, A)>;

/// Result of processing one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Tick that was processed.
    pub tick: u64,
    /// Timers found in the scanned bucket.
    pub scanned: usize,
    /// Timers that fired.
    pub fired: usize,
}

/// Counts returned by [`TimerManager::verify_integrity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IntegrityReport {
    /// Slots in the free list.
    pub free: usize,
    /// Slots armed in the registry.
    pub running: usize,
    /// Stopped slots.
    pub stopped: usize,
    /// Completed slots.
    pub completed: usize,
}

/// Software timer manager.
///
/// One instance is built at startup and shared (usually through `Arc`) by
/// application threads and the [`TimerTask`](crate::TimerTask). `A` is the
/// argument type handed to timer callbacks.
///
/// # Example
///
/// ```rust
/// use softtimer::prelude::*;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// let manager: TimerManager<u32> = TimerManager::with_capacity(4)?;
/// let fired = Arc::new(AtomicU32::new(0));
/// let counter = Arc::clone(&fired);
///
/// let timer = manager.create(
///     3,
///     0,
///     TimerMode::OneShot,
///     Some(Arc::new(move |n| {
///         counter.fetch_add(n, Ordering::SeqCst);
///     })),
///     1,
///     "blink",
/// )?;
/// manager.start(timer)?;
///
/// for _ in 0..3 {
///     manager.process_tick();
/// }
/// assert_eq!(fired.load(Ordering::SeqCst), 1);
/// assert_eq!(manager.state_get(timer), Err(TimerError::Inactive));
/// # Ok::<(), TimerError>(())
/// ```
pub struct TimerManager<A = ()> {
    config: TimerConfig,
    tag: u32,
    slots: Box<[Mutex<TimerSlot<A>>]>,
    pool: TimerPool,
    registry: TimerRegistry,
    stats: Arc<TimerStats>,
}

impl<A> TimerManager<A>
where
    A: Clone + Send + 'static,
{
    /// Build a manager from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: TimerConfig) -> TimerResult<Self> {
        config.validate()?;
        let pool = TimerPool::new(config.pool_capacity)?;
        let registry = TimerRegistry::new(config.bucket_count, config.pool_capacity)?;
        let slots = (0..config.pool_capacity)
            .map(|_| Mutex::new(TimerSlot::unused()))
            .collect();

        debug!(
            pool_capacity = config.pool_capacity,
            bucket_count = config.bucket_count,
            "Timer manager initialized"
        );

        Ok(Self {
            config,
            tag: next_tag(),
            slots,
            pool,
            registry,
            stats: Arc::new(TimerStats::new()),
        })
    }

    /// Build a manager with `capacity` slots and default settings otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> TimerResult<Self> {
        Self::new(TimerConfig {
            pool_capacity: capacity,
            ..TimerConfig::default()
        })
    }

    /// Create a timer in the `Stopped` state.
    ///
    /// # Errors
    ///
    /// - [`TimerError::InvalidDelay`] if `delay` is zero.
    /// - [`TimerError::InvalidPeriod`] if `mode` is periodic and `period` is zero.
    /// - [`TimerError::NonAvailable`] if the pool is exhausted.
    pub fn create(
        &self,
        delay: u32,
        period: u32,
        mode: TimerMode,
        callback: Option<TimerCallback<A>>,
        arg: A,
        name: impl Into<Arc<str>>,
    ) -> TimerResult<TimerHandle> {
        if delay < 1 {
            return Err(TimerError::InvalidDelay);
        }
        if mode == TimerMode::Periodic && period < 1 {
            return Err(TimerError::InvalidPeriod);
        }

        let index = match self.pool.allocate() {
            Ok(index) => index,
            Err(exhausted) => {
                self.stats.inc_pool_exhausted();
                warn!(capacity = self.pool.capacity(), "Timer pool exhausted");
                return Err(exhausted.into());
            }
        };
        let Some(lock) = self.slots.get(index as usize) else {
            return Err(TimerError::inconsistent(format!(
                "pool handed out slot {index} outside the arena"
            )));
        };

        let handle = {
            let mut slot = lock.lock();
            slot.mode = mode;
            slot.delay = delay;
            slot.period = period;
            slot.match_tick = 0;
            slot.callback = callback;
            slot.arg = Some(arg);
            slot.name = name.into();
            slot.state = TimerState::Stopped;
            TimerHandle::new(index, slot.generation, self.tag)
        };

        self.stats.inc_created();
        debug!(timer = %handle, %mode, delay, period, "Timer created");
        Ok(handle)
    }

    /// Arm a timer and return its match tick.
    ///
    /// | prior state | mode | match tick |
    /// |---|---|---|
    /// | `Stopped` | any | tick + delay |
    /// | `Completed` | periodic | tick + period |
    /// | `Running` | periodic | tick + period (re-armed atomically) |
    /// | `Running` | one-shot | rejected |
    ///
    /// # Errors
    ///
    /// Returns a handle error, or [`TimerError::InvalidState`] when a running
    /// one-shot timer is started again or a one-shot timer is `Completed`.
    pub fn start(&self, handle: TimerHandle) -> TimerResult<u64> {
        let mut slot = self.lock_active(handle)?;
        let match_tick = self.arm_locked(&mut slot, handle.slot())?;
        drop(slot);
        trace!(timer = %handle, match_tick, "Timer started");
        Ok(match_tick)
    }

    /// Disarm a timer, optionally invoking its callback.
    ///
    /// The callback runs on the calling thread after the timer has been moved
    /// to `Stopped`. A callback option on a timer without a callback still
    /// stops it and reports [`StopOutcome::NoCallback`].
    ///
    /// # Errors
    ///
    /// Returns a handle error, or [`TimerError::AlreadyStopped`].
    pub fn stop(&self, handle: TimerHandle, option: StopOption<A>) -> TimerResult<StopOutcome> {
        let (invocation, outcome) = {
            let mut slot = self.lock_active(handle)?;
            self.stop_locked(&mut slot, handle.slot(), option)?
        };
        self.invoke(invocation);
        if outcome == StopOutcome::NoCallback {
            debug!(timer = %handle, "Stop requested a callback but none is set");
        }
        Ok(outcome)
    }

    /// Delete a timer and return its slot to the pool.
    ///
    /// # Errors
    ///
    /// Returns a handle error if the timer is not active.
    pub fn delete(&self, handle: TimerHandle) -> TimerResult<()> {
        let mut slot = self.lock_active(handle)?;
        self.release_locked(&mut slot, handle.slot())?;
        drop(slot);
        debug!(timer = %handle, "Timer deleted");
        Ok(())
    }

    /// Diagnostic name of a timer.
    ///
    /// # Errors
    ///
    /// Returns a handle error if the timer is not active.
    pub fn name_get(&self, handle: TimerHandle) -> TimerResult<Arc<str>> {
        let slot = self.lock_active(handle)?;
        Ok(Arc::clone(&slot.name))
    }

    /// Current state of a timer.
    ///
    /// # Errors
    ///
    /// Returns a handle error if the timer is not active; a deleted timer
    /// reports [`TimerError::Inactive`].
    pub fn state_get(&self, handle: TimerHandle) -> TimerResult<TimerState> {
        let slot = self.lock_active(handle)?;
        Ok(slot.state)
    }

    /// Ticks until the timer's match tick, saturating at zero.
    ///
    /// # Errors
    ///
    /// Returns a handle error if the timer is not active.
    pub fn remaining_ticks_get(&self, handle: TimerHandle) -> TimerResult<u64> {
        let slot = self.lock_active(handle)?;
        Ok(slot.remaining(self.registry.current_tick()))
    }

    /// Every read-only field of a timer in one consistent view.
    ///
    /// # Errors
    ///
    /// Returns a handle error if the timer is not active.
    pub fn info(&self, handle: TimerHandle) -> TimerResult<TimerInfo> {
        let slot = self.lock_active(handle)?;
        Ok(slot.info(self.registry.current_tick()))
    }

    /// Advance one tick and fire every timer due on it.
    ///
    /// This is the body of the timer task loop. Drive a manager either through
    /// a [`TimerTask`](crate::TimerTask) or by calling this directly, not both.
    pub fn process_tick(&self) -> TickReport {
        let mut scratch = Vec::new();
        self.process_tick_with(&mut scratch)
    }

    pub(crate) fn process_tick_with(&self, scratch: &mut Vec<u32>) -> TickReport {
        let tick = self.registry.advance(scratch);
        self.stats.inc_tick();

        let mut fired = 0;
        for &index in scratch.iter() {
            if self.expire(index, tick) {
                fired += 1;
            }
        }

        if fired > 0 {
            trace!(tick, scanned = scratch.len(), fired, "Tick processed");
        }
        TickReport {
            tick,
            scanned: scratch.len(),
            fired,
        }
    }

    /// Cross-check the pool, the registry and every slot state.
    ///
    /// Meant for quiescent points (tests, diagnostics): concurrent lifecycle
    /// calls can make a healthy manager look inconsistent mid-check.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Inconsistent`] describing the first violation.
    pub fn verify_integrity(&self) -> TimerResult<IntegrityReport> {
        let capacity = self.slots.len();
        let mut in_free = vec![false; capacity];
        for index in self.pool.free_slots()? {
            match in_free.get_mut(index as usize) {
                Some(seen) if !*seen => *seen = true,
                _ => {
                    return Err(TimerError::inconsistent(format!(
                        "slot {index} appears twice in the free list"
                    )));
                }
            }
        }

        let mut bucket_of: Vec<Option<u32>> = vec![None; capacity];
        for (index, bucket) in self.registry.members()? {
            match bucket_of.get_mut(index as usize) {
                Some(entry) if entry.is_none() => *entry = Some(bucket),
                _ => {
                    return Err(TimerError::inconsistent(format!(
                        "slot {index} appears in more than one bucket"
                    )));
                }
            }
        }

        let mut report = IntegrityReport::default();
        for (index, lock) in self.slots.iter().enumerate() {
            let slot = lock.lock();
            let free = in_free.get(index).copied().unwrap_or(false);
            let bucket = bucket_of.get(index).copied().flatten();
            let consistent = match slot.state {
                TimerState::Unused => {
                    report.free += 1;
                    free && bucket.is_none()
                }
                TimerState::Running => {
                    report.running += 1;
                    !free && bucket == Some(self.registry.bucket_of(slot.match_tick))
                }
                TimerState::Stopped => {
                    report.stopped += 1;
                    !free && bucket.is_none()
                }
                TimerState::Completed => {
                    report.completed += 1;
                    !free && bucket.is_none()
                }
            };
            if !consistent {
                return Err(TimerError::inconsistent(format!(
                    "slot {index} is {} but free={free} bucket={bucket:?}",
                    slot.state
                )));
            }
        }
        Ok(report)
    }

    /// Current tick.
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.registry.current_tick()
    }

    /// Number of timer slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Number of free timer slots.
    #[must_use]
    pub fn available(&self) -> usize {
        self.pool.available()
    }

    /// Number of armed timers.
    #[must_use]
    pub fn running(&self) -> usize {
        self.registry.armed()
    }

    /// Armed timers per registry bucket.
    #[must_use]
    pub fn bucket_counts(&self) -> Vec<usize> {
        self.registry.bucket_counts()
    }

    /// Snapshot of the manager counters.
    #[must_use]
    pub fn stats(&self) -> TimerStatsSnapshot {
        self.stats.snapshot()
    }

    /// The configuration the manager was built with.
    #[must_use]
    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    pub(crate) fn stats_handle(&self) -> Arc<TimerStats> {
        Arc::clone(&self.stats)
    }

    fn lock_active(&self, handle: TimerHandle) -> TimerResult<MutexGuard<'_, TimerSlot<A>>> {
        if handle.is_null() {
            return Err(TimerError::InvalidHandle);
        }
        if handle.tag() != self.tag {
            return Err(TimerError::InvalidType);
        }
        let Some(lock) = self.slots.get(handle.slot() as usize) else {
            return Err(TimerError::InvalidHandle);
        };
        let slot = lock.lock();
        if slot.state == TimerState::Unused || slot.generation != handle.generation() {
            return Err(TimerError::Inactive);
        }
        Ok(slot)
    }

    fn arm_locked(&self, slot: &mut TimerSlot<A>, index: u32) -> TimerResult<u64> {
        let offset = match (slot.state, slot.mode) {
            (TimerState::Stopped, _) => slot.delay,
            (TimerState::Completed | TimerState::Running, TimerMode::Periodic) => slot.period,
            (state @ (TimerState::Running | TimerState::Completed), TimerMode::OneShot) => {
                return Err(TimerError::InvalidState(state));
            }
            (TimerState::Unused, _) => return Err(TimerError::Inactive),
        };
        slot.match_tick = self.registry.arm(index, offset);
        slot.state = TimerState::Running;
        slot.firing = false;
        Ok(slot.match_tick)
    }

    fn stop_locked(
        &self,
        slot: &mut TimerSlot<A>,
        index: u32,
        option: StopOption<A>,
    ) -> TimerResult<(Invocation<A>, StopOutcome)> {
        if slot.state == TimerState::Stopped {
            return Err(TimerError::AlreadyStopped);
        }
        self.registry.remove(index);
        slot.state = TimerState::Stopped;
        slot.firing = false;
        Ok(slot.take_invocation(option))
    }

    fn release_locked(&self, slot: &mut TimerSlot<A>, index: u32) -> TimerResult<()> {
        self.registry.remove(index);
        slot.reset();
        self.pool.release(index)?;
        self.stats.inc_deleted();
        Ok(())
    }

    fn invoke(&self, invocation: Invocation<A>) {
        if let Some((callback, arg)) = invocation {
            callback(arg);
            self.stats.inc_callback();
        }
    }

    /// Fire slot `index` if it is running and due on `tick`.
    fn expire(&self, index: u32, tick: u64) -> bool {
        let Some(lock) = self.slots.get(index as usize) else {
            self.internal_fault(
                index,
                &TimerError::inconsistent("registry links a slot outside the arena"),
            );
            return false;
        };

        let (handle, invocation) = {
            let mut slot = lock.lock();
            if slot.state != TimerState::Running || slot.remaining(tick) != 0 {
                return false;
            }
            let handle = TimerHandle::new(index, slot.generation, self.tag);
            match self.stop_locked(&mut slot, index, StopOption::InvokeCallback) {
                Ok((invocation, _)) => {
                    slot.firing = true;
                    (handle, invocation)
                }
                Err(err) => {
                    drop(slot);
                    self.internal_fault(index, &err);
                    return false;
                }
            }
        };

        self.stats.inc_expiration();
        self.invoke(invocation);
        self.complete(handle);
        true
    }

    /// Mark a fired timer completed, then re-arm it (periodic) or return it to
    /// the pool (one-shot). Any start, stop or delete made after the timer
    /// fired, by its callback or by another thread, wins: the slot is left
    /// as that call left it.
    fn complete(&self, handle: TimerHandle) {
        let Some(lock) = self.slots.get(handle.slot() as usize) else {
            return;
        };
        let mut slot = lock.lock();
        if slot.generation != handle.generation()
            || slot.state != TimerState::Stopped
            || !slot.firing
        {
            return;
        }

        slot.firing = false;
        slot.state = TimerState::Completed;
        let index = handle.slot();
        let result = match slot.mode {
            TimerMode::Periodic => self.arm_locked(&mut slot, index).map(|match_tick| {
                self.stats.inc_rearm();
                trace!(timer = %handle, match_tick, "Periodic timer re-armed");
            }),
            TimerMode::OneShot => self.release_locked(&mut slot, index),
        };
        drop(slot);

        if let Err(err) = result {
            self.internal_fault(index, &err);
        }
    }

    fn internal_fault(&self, index: u32, err: &TimerError) {
        self.stats.inc_internal_fault();
        error!(slot = index, error = %err, "Timer task internal fault");
    }
}

impl<A> std::fmt::Debug for TimerManager<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerManager")
            .field("config", &self.config)
            .field("pool", &self.pool)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
