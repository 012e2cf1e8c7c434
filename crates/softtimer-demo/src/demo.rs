//! The three demonstration timers.

use chrono::{DateTime, Utc};
use softtimer::{TimerCallback, TimerHandle, TimerManager, TimerMode};
use std::sync::Arc;
use tracing::info;

use crate::error::DemoError;

/// One timer of the demonstration set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoTimer {
    /// Timer name, also used in log and error messages.
    pub name: &'static str,
    /// Number of the function the callback prints.
    pub function: u8,
    /// Firing mode.
    pub mode: TimerMode,
    /// Ticks until the first expiry.
    pub delay: u32,
    /// Ticks between expiries; zero for the one-shot timer.
    pub period: u32,
}

/// With the default 100 ms tick: Timer1 every 5 s, Timer2 every 3 s and
/// Timer3 once after 10 s. Timer1 and Timer2 first fire after 1 s.
pub const DEMO_TIMERS: [DemoTimer; 3] = [
    DemoTimer {
        name: "Timer1",
        function: 1,
        mode: TimerMode::Periodic,
        delay: 10,
        period: 50,
    },
    DemoTimer {
        name: "Timer2",
        function: 2,
        mode: TimerMode::Periodic,
        delay: 10,
        period: 30,
    },
    DemoTimer {
        name: "Timer3",
        function: 3,
        mode: TimerMode::OneShot,
        delay: 100,
        period: 0,
    },
];

/// Line printed by a demo callback, e.g.
/// `This is Function 2 and UTC time and date: Thu Oct 27 20:53:27 2016`.
#[must_use]
pub fn function_line(function: u8, now: DateTime<Utc>) -> String {
    format!(
        "This is Function {function} and UTC time and date: {}",
        now.format("%a %b %e %H:%M:%S %Y")
    )
}

fn print_function(function: u8) {
    println!("{}", function_line(function, Utc::now()));
}

/// Create and start every demo timer.
pub fn install(manager: &TimerManager<u8>) -> Result<Vec<TimerHandle>, DemoError> {
    let callback: TimerCallback<u8> = Arc::new(print_function);
    let mut handles = Vec::with_capacity(DEMO_TIMERS.len());

    for timer in DEMO_TIMERS {
        let handle = manager
            .create(
                timer.delay,
                timer.period,
                timer.mode,
                Some(Arc::clone(&callback)),
                timer.function,
                timer.name,
            )
            .and_then(|handle| manager.start(handle).map(|_| handle))
            .map_err(|source| DemoError::TimerSetup {
                name: timer.name,
                source,
            })?;
        info!(timer = timer.name, %handle, mode = %timer.mode, "Demo timer started");
        handles.push(handle);
    }
    Ok(handles)
}
