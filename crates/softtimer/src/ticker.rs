//! Portable periodic tick source.
//!
//! [`IntervalTicker`] runs a named thread that calls [`TickNotifier::notify`]
//! once per period. Wake times are absolute (`next += period`) so sleep
//! overshoot does not accumulate into drift. When the thread falls more than
//! one period behind it notifies once per missed period to catch up.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::MAX_TICK_PERIOD;
use crate::error::{TimerError, TimerResult};
use crate::task::TickNotifier;

/// Thread-based tick source.
#[derive(Debug)]
pub struct IntervalTicker {
    period: Duration,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<u64>>,
}

impl IntervalTicker {
    /// Start notifying `notifier` every `period`.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidConfiguration`] for a zero period or one
    /// longer than [`MAX_TICK_PERIOD`], and [`TimerError::Startup`] if the
    /// thread cannot be spawned.
    pub fn start(period: Duration, notifier: TickNotifier) -> TimerResult<Self> {
        if period.is_zero() {
            return Err(TimerError::invalid_configuration(
                "tick period must be greater than 0",
            ));
        }
        if period > MAX_TICK_PERIOD {
            return Err(TimerError::invalid_configuration(format!(
                "tick period must be at most {}s",
                MAX_TICK_PERIOD.as_secs()
            )));
        }

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let thread = thread::Builder::new()
            .name("softtimer-ticker".to_string())
            .spawn(move || Self::run(period, &notifier, &flag))
            .map_err(|e| TimerError::startup(format!("failed to spawn tick source: {e}")))?;

        info!(period_us = period.as_micros(), "Tick source started");
        Ok(Self {
            period,
            running,
            thread: Some(thread),
        })
    }

    /// Tick period.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Stop the thread and join it. Returns the number of ticks delivered.
    pub fn stop(mut self) -> u64 {
        self.halt()
    }

    fn halt(&mut self) -> u64 {
        self.running.store(false, Ordering::Release);
        match self.thread.take().map(JoinHandle::join) {
            Some(Ok(delivered)) => delivered,
            Some(Err(_)) => {
                warn!("Tick source thread panicked");
                0
            }
            None => 0,
        }
    }

    fn run(period: Duration, notifier: &TickNotifier, running: &AtomicBool) -> u64 {
        let mut delivered = 0u64;
        let Some(mut next) = Instant::now().checked_add(period) else {
            warn!(period_us = period.as_micros(), "Tick period overflows the clock");
            return delivered;
        };

        while running.load(Ordering::Acquire) {
            let now = Instant::now();
            if let Some(wait) = next.checked_duration_since(now)
                && !wait.is_zero()
            {
                thread::sleep(wait);
                continue;
            }

            let Some(following) = next.checked_add(period) else {
                warn!(period_us = period.as_micros(), "Tick period overflows the clock");
                break;
            };
            next = following;
            match notifier.notify() {
                Ok(()) => delivered += 1,
                Err(TimerError::TickQueueFull) => {
                    debug!("Tick dropped, timer task is behind");
                }
                Err(_) => {
                    info!(delivered, "Timer task gone, tick source exiting");
                    break;
                }
            }
        }
        delivered
    }
}

impl Drop for IntervalTicker {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.halt();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::TimerManager;
    use crate::task::TimerTask;

    #[test]
    fn test_zero_period_rejected() {
        let manager: Arc<TimerManager> = Arc::new(TimerManager::with_capacity(1).unwrap());
        let (_task, notifier) = TimerTask::new(manager);
        assert!(matches!(
            IntervalTicker::start(Duration::ZERO, notifier),
            Err(TimerError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_oversized_period_rejected() {
        let manager: Arc<TimerManager> = Arc::new(TimerManager::with_capacity(1).unwrap());
        let (_task, notifier) = TimerTask::new(manager);
        assert!(matches!(
            IntervalTicker::start(Duration::MAX, notifier.clone()),
            Err(TimerError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            IntervalTicker::start(MAX_TICK_PERIOD + Duration::from_millis(1), notifier),
            Err(TimerError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_ticker_exits_when_task_gone() {
        let manager: Arc<TimerManager> = Arc::new(TimerManager::with_capacity(1).unwrap());
        let (task, notifier) = TimerTask::new(manager);
        drop(task);
        let ticker = IntervalTicker::start(Duration::from_millis(1), notifier).unwrap();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(ticker.stop(), 0);
    }
}
