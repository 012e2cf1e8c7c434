//! # softtimer
//!
//! Software timers multiplexed onto a single periodic tick source.
//!
//! Application threads arm one-shot and periodic timers measured in ticks; a
//! dedicated timer task advances a global tick counter on every tick
//! notification and invokes the callback of each timer that falls due.
//!
//! ## Architecture
//!
//! - [`pool`] - fixed-capacity free list of timer slots
//! - [`registry`] - tick-indexed hash buckets of armed timers, plus the tick counter
//! - [`manager`] - the timer lifecycle API (create/start/stop/delete/query)
//! - [`task`] - the worker loop and the [`TickNotifier`] entry point for tick sources
//! - [`ticker`] - a portable thread-based tick source
//! - [`stats`] - lock-free counters
//! - [`config`] - startup configuration
//! - [`error`] - error types
//!
//! ## Callback contract
//!
//! Callbacks run synchronously on the timer task, one at a time. They must be
//! short and must not block: a slow callback delays every other timer due on
//! the same tick and the processing of the next tick.
//!
//! ## Example
//!
//! ```rust,no_run
//! use softtimer::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = TimerConfig::builder()
//!     .pool_capacity(8)
//!     .tick_period(Duration::from_millis(10))
//!     .build()?;
//! let period = config.tick_period;
//! let manager: Arc<TimerManager<&'static str>> = Arc::new(TimerManager::new(config)?);
//! let task = TimerTask::spawn(Arc::clone(&manager))?;
//! let ticker = IntervalTicker::start(period, task.notifier())?;
//!
//! let heartbeat = manager.create(
//!     1,
//!     50,
//!     TimerMode::Periodic,
//!     Some(Arc::new(|msg| println!("{msg}"))),
//!     "heartbeat",
//!     "heartbeat",
//! )?;
//! manager.start(heartbeat)?;
//!
//! std::thread::sleep(Duration::from_secs(2));
//! ticker.stop();
//! task.shutdown()?;
//! # Ok::<(), TimerError>(())
//! ```

#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    missing_debug_implementations
)]
#![warn(clippy::pedantic)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod error;
pub mod manager;
pub mod pool;
pub mod registry;
pub mod stats;
pub mod task;
pub mod tick;
pub mod ticker;
pub mod timer;

pub mod prelude;

pub use config::{MAX_TICK_PERIOD, TimerConfig, TimerConfigBuilder};
pub use error::{TimerError, TimerResult};
pub use manager::{IntegrityReport, TickReport, TimerManager};
pub use pool::{PoolExhausted, TimerPool};
pub use registry::TimerRegistry;
pub use stats::{TimerStats, TimerStatsSnapshot};
pub use task::{TickNotifier, TickSignal, TimerTask, TimerTaskHandle};
pub use tick::TickCounter;
pub use ticker::IntervalTicker;
pub use timer::{
    StopOption, StopOutcome, TimerCallback, TimerHandle, TimerInfo, TimerMode, TimerState,
};
