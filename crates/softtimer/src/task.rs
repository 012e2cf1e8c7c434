//! The timer task: a single worker thread that consumes tick notifications.
//!
//! A tick source calls [`TickNotifier::notify`] once per elapsed tick. The
//! notification travels over a bounded channel to the worker, which advances
//! the tick counter and fires every timer due on the new tick through
//! [`TimerManager::process_tick`]. The notifier never runs timer code itself,
//! so it is safe to call from any thread context.
//!
//! Expiry callbacks run synchronously on the worker, one at a time and in scan
//! order. They must be short and non-blocking.

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

use crate::error::{TimerError, TimerResult};
use crate::manager::TimerManager;
use crate::stats::TimerStats;

/// Message sent from tick sources to the timer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickSignal {
    /// One tick elapsed.
    Tick,
    /// Exit the task loop.
    Shutdown,
}

/// Entry point for tick sources. Cheap to clone.
#[derive(Debug, Clone)]
pub struct TickNotifier {
    tx: Sender<TickSignal>,
    stats: Arc<TimerStats>,
}

impl TickNotifier {
    /// Report that one tick elapsed and wake the timer task.
    ///
    /// Never blocks.
    ///
    /// # Errors
    ///
    /// - [`TimerError::TickQueueFull`] if the task is behind by more than the
    ///   queue depth; the tick is dropped and counted.
    /// - [`TimerError::TaskStopped`] if the task has exited.
    pub fn notify(&self) -> TimerResult<()> {
        match self.tx.try_send(TickSignal::Tick) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.stats.inc_dropped_tick();
                Err(TimerError::TickQueueFull)
            }
            Err(TrySendError::Disconnected(_)) => Err(TimerError::TaskStopped),
        }
    }

    /// Ticks queued but not yet processed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tx.len()
    }
}

/// The timer task loop.
pub struct TimerTask<A> {
    manager: Arc<TimerManager<A>>,
    rx: Receiver<TickSignal>,
    scratch: Vec<u32>,
}

impl<A> TimerTask<A>
where
    A: Clone + Send + 'static,
{
    /// Build a task and the notifier that feeds it, without starting a thread.
    ///
    /// Use [`TimerTask::run`] to drive the loop on the current thread, or
    /// [`TimerTask::spawn`] to start the dedicated worker.
    #[must_use]
    pub fn new(manager: Arc<TimerManager<A>>) -> (Self, TickNotifier) {
        let depth = manager.config().tick_queue_depth.max(1);
        let (tx, rx) = channel::bounded(depth);
        let notifier = TickNotifier {
            tx,
            stats: manager.stats_handle(),
        };
        let scratch = Vec::with_capacity(manager.capacity());
        (
            Self {
                manager,
                rx,
                scratch,
            },
            notifier,
        )
    }

    /// Start the worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Startup`] if the thread cannot be spawned.
    pub fn spawn(manager: Arc<TimerManager<A>>) -> TimerResult<TimerTaskHandle> {
        let name = manager.config().worker_name.clone();
        let (task, notifier) = Self::new(manager);
        let shutdown_tx = notifier.tx.clone();

        let worker = thread::Builder::new()
            .name(name.clone())
            .spawn(move || task.run())
            .map_err(|e| TimerError::startup(format!("failed to spawn {name}: {e}")))?;

        info!(worker = %name, "Timer task started");
        Ok(TimerTaskHandle {
            notifier,
            shutdown_tx,
            worker: Some(worker),
        })
    }

    /// Run the loop until a shutdown signal arrives or every notifier has
    /// been dropped. Returns the number of ticks processed.
    pub fn run(mut self) -> u64 {
        let mut processed = 0u64;
        loop {
            match self.rx.recv() {
                Ok(TickSignal::Tick) => {
                    self.manager.process_tick_with(&mut self.scratch);
                    processed += 1;
                }
                Ok(TickSignal::Shutdown) => {
                    info!(processed, "Timer task received shutdown");
                    break;
                }
                Err(_) => {
                    info!(processed, "All tick notifiers dropped, timer task exiting");
                    break;
                }
            }
        }
        processed
    }
}

impl<A> std::fmt::Debug for TimerTask<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerTask")
            .field("pending", &self.rx.len())
            .finish_non_exhaustive()
    }
}

/// Owner of a running timer task thread.
///
/// Dropping the handle shuts the task down and joins it.
#[derive(Debug)]
pub struct TimerTaskHandle {
    notifier: TickNotifier,
    shutdown_tx: Sender<TickSignal>,
    worker: Option<JoinHandle<u64>>,
}

impl TimerTaskHandle {
    /// A notifier feeding this task.
    #[must_use]
    pub fn notifier(&self) -> TickNotifier {
        self.notifier.clone()
    }

    /// Notify one tick. Shorthand for `self.notifier().notify()`.
    ///
    /// # Errors
    ///
    /// See [`TickNotifier::notify`].
    pub fn notify(&self) -> TimerResult<()> {
        self.notifier.notify()
    }

    /// Whether the worker thread is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Stop the task after it drains already queued ticks, and join it.
    /// Returns the number of ticks processed.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::TaskStopped`] if the worker panicked.
    pub fn shutdown(mut self) -> TimerResult<u64> {
        self.stop_worker()
    }

    fn stop_worker(&mut self) -> TimerResult<u64> {
        let Some(worker) = self.worker.take() else {
            return Ok(0);
        };
        // Blocking send: the shutdown must queue behind pending ticks even
        // when the channel is full. It fails only if the task already exited.
        if self.shutdown_tx.send(TickSignal::Shutdown).is_err() {
            warn!("Timer task exited before shutdown was requested");
        }
        match worker.join() {
            Ok(processed) => {
                info!(processed, "Timer task stopped cleanly");
                Ok(processed)
            }
            Err(_) => Err(TimerError::TaskStopped),
        }
    }
}

impl Drop for TimerTaskHandle {
    fn drop(&mut self) {
        if self.worker.is_some()
            && let Err(err) = self.stop_worker()
        {
            warn!(error = %err, "Timer task did not stop cleanly");
        }
    }
}
