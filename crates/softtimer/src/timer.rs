//! Timer object types: states, modes, handles and the slot record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::TimerError;

/// Callback invoked when a timer expires or is stopped with a callback option.
///
/// Callbacks run synchronously on the timer task (or on the thread calling
/// [`stop`](crate::TimerManager::stop)) and must be short and non-blocking:
/// a slow callback delays every other timer due on the same tick.
pub type TimerCallback<A> = Arc<dyn Fn(A) + Send + Sync>;

/// Lifecycle state of a timer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerState {
    /// Slot is in the free pool.
    Unused,
    /// Created or stopped; not armed.
    Stopped,
    /// Armed in the registry.
    Running,
    /// Fired; periodic timers are re-armed from here.
    Completed,
}

impl TimerState {
    /// Whether the state belongs to a live (created, not deleted) timer.
    #[must_use]
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Unused)
    }
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerState::Unused => write!(f, "Unused"),
            TimerState::Stopped => write!(f, "Stopped"),
            TimerState::Running => write!(f, "Running"),
            TimerState::Completed => write!(f, "Completed"),
        }
    }
}

/// Firing mode, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TimerMode {
    /// Fires once after `delay` ticks, then returns to the pool.
    OneShot = 1,
    /// Fires after `delay` ticks and then every `period` ticks.
    Periodic = 2,
}

impl TryFrom<u8> for TimerMode {
    type Error = TimerError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::OneShot),
            2 => Ok(Self::Periodic),
            other => Err(TimerError::InvalidOption(other)),
        }
    }
}

impl From<TimerMode> for u8 {
    fn from(mode: TimerMode) -> Self {
        mode as u8
    }
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerMode::OneShot => write!(f, "one-shot"),
            TimerMode::Periodic => write!(f, "periodic"),
        }
    }
}

/// What [`stop`](crate::TimerManager::stop) does with the callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOption<A> {
    /// Stop without invoking the callback.
    None,
    /// Invoke the callback with the argument given at creation.
    InvokeCallback,
    /// Invoke the callback with this argument instead.
    InvokeCallbackWithArg(A),
}

impl<A> StopOption<A> {
    fn wants_callback(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Result of a successful stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Stopped, no callback requested.
    Stopped,
    /// Stopped and the callback ran.
    CallbackInvoked,
    /// Stopped, but the requested callback is not set.
    NoCallback,
}

impl StopOutcome {
    /// Advisory error carried by this outcome, if any.
    #[must_use]
    pub fn advisory(self) -> Option<TimerError> {
        match self {
            Self::NoCallback => Some(TimerError::NoCallback),
            Self::Stopped | Self::CallbackInvoked => None,
        }
    }
}

/// Opaque reference to a timer created by a [`TimerManager`](crate::TimerManager).
///
/// Handles are cheap to copy. A handle outlives its timer: once the timer is
/// deleted (or a one-shot timer fires) every operation on the handle reports
/// [`TimerError::Inactive`], even after the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    slot: u32,
    generation: u32,
    tag: u32,
}

impl TimerHandle {
    /// The null handle. Every operation rejects it with
    /// [`TimerError::InvalidHandle`].
    pub const NULL: Self = Self {
        slot: u32::MAX,
        generation: 0,
        tag: 0,
    };

    pub(crate) const fn new(slot: u32, generation: u32, tag: u32) -> Self {
        Self {
            slot,
            generation,
            tag,
        }
    }

    /// Whether this is the null handle.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.tag == 0 || self.slot == u32::MAX
    }

    /// Pool slot index the handle points at.
    #[must_use]
    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub(crate) fn generation(&self) -> u32 {
        self.generation
    }

    pub(crate) fn tag(&self) -> u32 {
        self.tag
    }
}

impl Default for TimerHandle {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "timer#null")
        } else {
            write!(f, "timer#{}.{}", self.slot, self.generation)
        }
    }
}

/// Read-only view of a timer, taken under a single lock acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimerInfo {
    /// Diagnostic label.
    pub name: Arc<str>,
    /// Current state.
    pub state: TimerState,
    /// Firing mode.
    pub mode: TimerMode,
    /// Ticks until the first expiry.
    pub delay: u32,
    /// Ticks between periodic expiries.
    pub period: u32,
    /// Absolute due tick; meaningful only while running.
    pub match_tick: u64,
    /// Ticks left until `match_tick`, saturating at zero.
    pub remaining_ticks: u64,
}

/// Storage for one timer object. Lives in the manager's arena for the
/// lifetime of the manager and is recycled through the pool.
pub(crate) struct TimerSlot<A> {
    pub(crate) state: TimerState,
    pub(crate) generation: u32,
    pub(crate) mode: TimerMode,
    pub(crate) delay: u32,
    pub(crate) period: u32,
    pub(crate) match_tick: u64,
    /// Set by the timer task between firing and completion. Any lifecycle
    /// call in that window clears it, and completion is then skipped.
    pub(crate) firing: bool,
    pub(crate) callback: Option<TimerCallback<A>>,
    pub(crate) arg: Option<A>,
    pub(crate) name: Arc<str>,
}

impl<A: Clone> TimerSlot<A> {
    pub(crate) fn unused() -> Self {
        Self {
            state: TimerState::Unused,
            generation: 0,
            mode: TimerMode::OneShot,
            delay: 0,
            period: 0,
            match_tick: 0,
            firing: false,
            callback: None,
            arg: None,
            name: Arc::from(""),
        }
    }

    /// Clear transient fields and mark the slot free. The generation moves on
    /// so outstanding handles go stale.
    pub(crate) fn reset(&mut self) {
        self.state = TimerState::Unused;
        self.generation = self.generation.wrapping_add(1);
        self.delay = 0;
        self.period = 0;
        self.match_tick = 0;
        self.firing = false;
        self.callback = None;
        self.arg = None;
        self.name = Arc::from("");
    }

    pub(crate) fn remaining(&self, now: u64) -> u64 {
        self.match_tick.saturating_sub(now)
    }

    /// Resolve a stop option into the callback call to make once the slot lock
    /// is released.
    pub(crate) fn take_invocation(
        &self,
        option: StopOption<A>,
    ) -> (Option<(TimerCallback<A>, A)>, StopOutcome) {
        if !option.wants_callback() {
            return (None, StopOutcome::Stopped);
        }
        let Some(callback) = self.callback.as_ref() else {
            return (None, StopOutcome::NoCallback);
        };
        let arg = match option {
            StopOption::InvokeCallbackWithArg(alt) => Some(alt),
            StopOption::InvokeCallback | StopOption::None => self.arg.clone(),
        };
        match arg {
            Some(arg) => (Some((Arc::clone(callback), arg)), StopOutcome::CallbackInvoked),
            None => (None, StopOutcome::NoCallback),
        }
    }

    pub(crate) fn info(&self, now: u64) -> TimerInfo {
        TimerInfo {
            name: Arc::clone(&self.name),
            state: self.state,
            mode: self.mode,
            delay: self.delay,
            period: self.period,
            match_tick: self.match_tick,
            remaining_ticks: self.remaining(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_codes() {
        assert_eq!(TimerMode::try_from(1), Ok(TimerMode::OneShot));
        assert_eq!(TimerMode::try_from(2), Ok(TimerMode::Periodic));
        assert_eq!(TimerMode::try_from(0), Err(TimerError::InvalidOption(0)));
        assert_eq!(TimerMode::try_from(9), Err(TimerError::InvalidOption(9)));
        assert_eq!(u8::from(TimerMode::Periodic), 2);
    }

    #[test]
    fn test_null_handle() {
        let handle = TimerHandle::default();
        assert!(handle.is_null());
        assert_eq!(handle, TimerHandle::NULL);
        assert_eq!(handle.to_string(), "timer#null");

        let handle = TimerHandle::new(3, 1, 7);
        assert!(!handle.is_null());
        assert_eq!(handle.to_string(), "timer#3.1");
    }

    #[test]
    fn test_reset_bumps_generation() {
        let mut slot: TimerSlot<()> = TimerSlot::unused();
        slot.state = TimerState::Stopped;
        slot.delay = 5;
        slot.period = 2;
        slot.firing = true;
        slot.reset();
        assert_eq!(slot.state, TimerState::Unused);
        assert_eq!(slot.generation, 1);
        assert_eq!(slot.delay, 0);
        assert_eq!(slot.period, 0);
        assert!(!slot.firing);
    }

    #[test]
    fn test_take_invocation() {
        let mut slot: TimerSlot<u32> = TimerSlot::unused();
        slot.arg = Some(1);

        let (call, outcome) = slot.take_invocation(StopOption::InvokeCallback);
        assert!(call.is_none());
        assert_eq!(outcome, StopOutcome::NoCallback);
        assert_eq!(outcome.advisory(), Some(TimerError::NoCallback));

        slot.callback = Some(Arc::new(|_| {}));
        let (call, outcome) = slot.take_invocation(StopOption::InvokeCallbackWithArg(9));
        assert_eq!(call.map(|(_, arg)| arg), Some(9));
        assert_eq!(outcome, StopOutcome::CallbackInvoked);

        let (call, outcome) = slot.take_invocation(StopOption::None);
        assert!(call.is_none());
        assert_eq!(outcome, StopOutcome::Stopped);
        assert_eq!(outcome.advisory(), None);
    }

    #[test]
    fn test_remaining_saturates() {
        let mut slot: TimerSlot<()> = TimerSlot::unused();
        slot.match_tick = 10;
        assert_eq!(slot.remaining(4), 6);
        assert_eq!(slot.remaining(10), 0);
        assert_eq!(slot.remaining(15), 0);
    }
}
