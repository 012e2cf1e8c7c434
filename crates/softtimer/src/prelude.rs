//! Prelude for softtimer.
//!
//! This module re-exports the most commonly used types for convenient importing.
//!
//! # Example
//!
//! ```rust
//! use softtimer::prelude::*;
//!
//! let manager: TimerManager = TimerManager::with_capacity(2)?;
//! let timer = manager.create(5, 0, TimerMode::OneShot, None, (), "once")?;
//! assert_eq!(manager.state_get(timer)?, TimerState::Stopped);
//! # Ok::<(), TimerError>(())
//! ```

pub use crate::config::{TimerConfig, TimerConfigBuilder};
pub use crate::error::{TimerError, TimerResult};
pub use crate::manager::{IntegrityReport, TickReport, TimerManager};
pub use crate::stats::TimerStatsSnapshot;
pub use crate::task::{TickNotifier, TimerTask, TimerTaskHandle};
pub use crate::ticker::IntervalTicker;
pub use crate::timer::{
    StopOption, StopOutcome, TimerCallback, TimerHandle, TimerInfo, TimerMode, TimerState,
};
