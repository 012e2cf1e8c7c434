//! Error types for the timer manager.
//!
//! Every lifecycle operation returns a [`TimerResult`]. Misuse of the API
//! (bad handle, wrong state, bad arguments) is always reported to the caller
//! and never corrupts the pool or the registry.

use thiserror::Error;

use crate::timer::TimerState;

/// Errors reported by timer operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    /// The handle is null or points outside the timer pool.
    #[error("Invalid timer handle")]
    InvalidHandle,

    /// The handle was not issued by this timer manager.
    #[error("Handle does not refer to a timer object of this manager")]
    InvalidType,

    /// The handle refers to a slot that is currently unused.
    #[error("Timer is inactive")]
    Inactive,

    /// The operation is not permitted in the timer's current state.
    #[error("Operation not permitted while timer is {0}")]
    InvalidState(TimerState),

    /// Delay must be at least one tick.
    #[error("Invalid delay: must be at least one tick")]
    InvalidDelay,

    /// Periodic timers need a period of at least one tick.
    #[error("Invalid period: periodic timers need at least one tick")]
    InvalidPeriod,

    /// Unrecognised timer mode code.
    #[error("Invalid timer option code: {0}")]
    InvalidOption(u8),

    /// The timer pool is exhausted.
    #[error("No timer objects available in the pool")]
    NonAvailable,

    /// The timer is already stopped.
    #[error("Timer is already stopped")]
    AlreadyStopped,

    /// A callback was requested but none is set. Advisory only: the operation
    /// that reports it has still completed.
    #[error("Timer has no callback")]
    NoCallback,

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Startup failed (worker thread or tick source could not be created).
    #[error("Timer startup failed: {0}")]
    Startup(String),

    /// The tick channel is full and the notification was dropped.
    #[error("Tick queue full, notification dropped")]
    TickQueueFull,

    /// The timer task is no longer receiving ticks.
    #[error("Timer task is not running")]
    TaskStopped,

    /// Internal bookkeeping no longer matches the timer states.
    #[error("Internal consistency fault: {0}")]
    Inconsistent(String),
}

impl TimerError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }

    /// Create a startup error.
    #[must_use]
    pub fn startup(reason: impl Into<String>) -> Self {
        Self::Startup(reason.into())
    }

    /// Create an internal consistency error.
    #[must_use]
    pub fn inconsistent(reason: impl Into<String>) -> Self {
        Self::Inconsistent(reason.into())
    }

    /// Whether the error is informational and the operation still completed.
    #[must_use]
    pub fn is_advisory(&self) -> bool {
        matches!(self, Self::NoCallback)
    }

    /// Whether the error stems from a bad or stale handle.
    #[must_use]
    pub fn is_handle_error(&self) -> bool {
        matches!(self, Self::InvalidHandle | Self::InvalidType | Self::Inactive)
    }
}

/// A specialized `Result` type for timer operations.
pub type TimerResult<T> = std::result::Result<T, TimerError>;
