//! softtimer-demo - drive three software timers from a wall-clock tick
//!
//! Starts a timer manager, its timer task and an interval tick source, then
//! runs two periodic timers and one one-shot timer for a bounded time.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod demo;
mod error;
mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use softtimer::{
    IntervalTicker, TimerConfig, TimerError, TimerManager, TimerStatsSnapshot, TimerTask,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::demo::DEMO_TIMERS;
use crate::settings::Overrides;

#[derive(Parser)]
#[command(name = "softtimer-demo")]
#[command(about = "Software timer manager demonstration")]
#[command(version)]
#[command(long_about = "
softtimer-demo initializes a timer manager, starts the timer task as a thread
and feeds it from a periodic tick source. It creates three timers:

    Timer1 - periodic, 50 ticks (5 s at the default 100 ms tick)
    Timer2 - periodic, 30 ticks (3 s)
    Timer3 - one shot, 100 ticks (10 s)

Each timer prints a line with the current UTC time when it fires.
")]
struct Cli {
    /// Number of timer slots
    #[arg(long, env = "SOFTTIMER_POOL_SIZE")]
    pool_size: Option<usize>,

    /// Tick period in milliseconds
    #[arg(long, env = "SOFTTIMER_TICK_MS")]
    tick_ms: Option<u64>,

    /// Number of registry buckets
    #[arg(long)]
    buckets: Option<usize>,

    /// YAML file with timer settings; flags take precedence
    #[arg(long, value_name = "YAML")]
    config: Option<PathBuf>,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECONDS", default_value_t = 12)]
    run_for: u64,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("softtimer={log_level},softtimer_demo={log_level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let overrides = Overrides {
        pool_size: cli.pool_size,
        tick_ms: cli.tick_ms,
        buckets: cli.buckets,
    };
    let config = settings::resolve(cli.config.as_deref(), overrides)
        .context("Failed to resolve timer configuration")?;

    print_program_info(&config);
    run(config, Duration::from_secs(cli.run_for))
}

fn print_program_info(config: &TimerConfig) {
    println!("Timer Manager Demo");
    println!("==================");
    println!();
    println!(
        "-> Tick period {} ms, {} timer slots, {} buckets",
        config.tick_period.as_millis(),
        config.pool_capacity,
        config.bucket_count
    );
    println!("-> Creates {} timers", DEMO_TIMERS.len());
    for timer in DEMO_TIMERS {
        let ticks = if timer.period > 0 {
            timer.period
        } else {
            timer.delay
        };
        println!("\t{} - {} {} ticks", timer.name, timer.mode, ticks);
    }
    println!();
}

fn run(config: TimerConfig, run_for: Duration) -> Result<()> {
    let period = config.tick_period;
    let manager: Arc<TimerManager<u8>> =
        Arc::new(TimerManager::new(config).context("Failed to initialize timer manager")?);

    let task = TimerTask::spawn(Arc::clone(&manager)).context("Failed to start timer task")?;
    let ticker =
        IntervalTicker::start(period, task.notifier()).context("Failed to start tick source")?;
    info!(period_ms = period.as_millis(), "Tick source initialization completed");

    let timers = demo::install(&manager)?;
    println!("Application started");

    thread::sleep(run_for);

    for timer in timers {
        match manager.delete(timer) {
            // Timer3 has already fired and released itself.
            Ok(()) | Err(TimerError::Inactive) => {}
            Err(err) => warn!(timer = %timer, error = %err, "Failed to delete demo timer"),
        }
    }

    let delivered = ticker.stop();
    let processed = task.shutdown().context("Timer task did not stop cleanly")?;
    if processed != delivered {
        warn!(delivered, processed, "Tick count mismatch at shutdown");
    }

    print_summary(&manager.stats());
    Ok(())
}

fn print_summary(stats: &TimerStatsSnapshot) {
    println!();
    println!("Summary");
    println!("=======");
    println!("Ticks processed:    {}", stats.ticks_processed);
    println!("Expirations:        {}", stats.expirations);
    println!("Callbacks invoked:  {}", stats.callbacks_invoked);
    println!("Periodic re-arms:   {}", stats.periodic_rearms);
    println!("Timers created:     {}", stats.timers_created);
    println!("Timers deleted:     {}", stats.timers_deleted);
    println!("Dropped ticks:      {}", stats.dropped_ticks);
    println!("Internal faults:    {}", stats.internal_faults);
}
