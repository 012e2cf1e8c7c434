//! Lifecycle tests driven tick by tick through `TimerManager::process_tick`.

use parking_lot::Mutex;
use softtimer::prelude::*;
use std::sync::Arc;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn manager<A: Clone + Send + 'static>(capacity: usize) -> TimerResult<TimerManager<A>> {
    let config = TimerConfig::builder()
        .pool_capacity(capacity)
        .bucket_count(10)
        .build()?;
    TimerManager::new(config)
}

/// Advance `ticks` ticks and return every tick on which something fired.
fn run_ticks<A: Clone + Send + 'static>(manager: &TimerManager<A>, ticks: u64) -> Vec<u64> {
    (0..ticks)
        .map(|_| manager.process_tick())
        .filter(|report| report.fired > 0)
        .map(|report| report.tick)
        .collect()
}

fn recorder(log: &Arc<Mutex<Vec<u32>>>) -> TimerCallback<u32> {
    let log = Arc::clone(log);
    Arc::new(move |arg| log.lock().push(arg))
}

#[test]
fn test_create_reports_stopped_for_any_delay() -> TestResult {
    let manager: TimerManager = manager(4)?;
    for delay in [1, 2, 17, u32::MAX] {
        let timer = manager.create(delay, 0, TimerMode::OneShot, None, (), "t")?;
        assert_eq!(manager.state_get(timer)?, TimerState::Stopped);
        manager.delete(timer)?;
    }
    Ok(())
}

#[test]
fn test_zero_delay_and_zero_period_rejected() -> TestResult {
    let manager: TimerManager = manager(2)?;
    assert_eq!(
        manager.create(0, 10, TimerMode::Periodic, None, (), "d"),
        Err(TimerError::InvalidDelay)
    );
    assert_eq!(
        manager.create(5, 0, TimerMode::Periodic, None, (), "p"),
        Err(TimerError::InvalidPeriod)
    );
    assert_eq!(manager.available(), 2);
    assert_eq!(manager.stats().timers_created, 0);
    Ok(())
}

#[test]
fn test_unknown_mode_code_rejected() {
    assert_eq!(TimerMode::try_from(3u8), Err(TimerError::InvalidOption(3)));
}

#[test]
fn test_remaining_counts_down_to_zero() -> TestResult {
    let manager: TimerManager = manager(1)?;
    let delay = 7u32;
    let timer = manager.create(delay, 0, TimerMode::OneShot, None, (), "countdown")?;
    manager.start(timer)?;

    for elapsed in 0..u64::from(delay) {
        assert_eq!(manager.remaining_ticks_get(timer)?, u64::from(delay) - elapsed);
        manager.process_tick();
    }
    // The last tick fired the one-shot and released it.
    assert_eq!(manager.remaining_ticks_get(timer), Err(TimerError::Inactive));
    Ok(())
}

#[test]
fn test_remaining_saturates_for_stopped_timer() -> TestResult {
    let manager: TimerManager = manager(1)?;
    let timer = manager.create(2, 0, TimerMode::OneShot, None, (), "late")?;
    manager.start(timer)?;
    manager.process_tick();
    manager.stop(timer, StopOption::None)?;

    run_ticks(&manager, 5);
    assert_eq!(manager.remaining_ticks_get(timer)?, 0);
    assert_eq!(manager.state_get(timer)?, TimerState::Stopped);
    Ok(())
}

#[test]
fn test_one_shot_fires_once_then_inactive() -> TestResult {
    let log = Arc::new(Mutex::new(Vec::new()));
    let manager = manager(2)?;
    let timer = manager.create(3, 0, TimerMode::OneShot, Some(recorder(&log)), 9, "once")?;
    manager.start(timer)?;

    assert_eq!(run_ticks(&manager, 20), vec![3]);
    assert_eq!(*log.lock(), vec![9]);
    assert_eq!(manager.state_get(timer), Err(TimerError::Inactive));
    assert_eq!(manager.available(), 2);

    let stats = manager.stats();
    assert_eq!(stats.expirations, 1);
    assert_eq!(stats.timers_deleted, 1);
    Ok(())
}

#[test]
fn test_periodic_fires_after_delay_then_every_period() -> TestResult {
    let manager: TimerManager = manager(1)?;
    let timer = manager.create(50, 30, TimerMode::Periodic, None, (), "p")?;
    assert_eq!(manager.start(timer)?, 50);

    assert_eq!(run_ticks(&manager, 110), vec![50, 80, 110]);
    assert_eq!(manager.state_get(timer)?, TimerState::Running);
    assert_eq!(manager.remaining_ticks_get(timer)?, 30);
    assert_eq!(manager.stats().periodic_rearms, 3);
    Ok(())
}

#[test]
fn test_periodic_lands_in_expected_buckets() -> TestResult {
    let manager: TimerManager = manager(1)?;
    let timer = manager.create(23, 23, TimerMode::Periodic, None, (), "p23")?;
    manager.start(timer)?;

    let mut buckets = Vec::new();
    for _ in 0..3 {
        let info = manager.info(timer)?;
        buckets.push(info.match_tick % 10);
        assert_eq!(manager.bucket_counts()[usize::try_from(info.match_tick % 10)?], 1);
        let fired = run_ticks(&manager, info.remaining_ticks);
        assert_eq!(fired, vec![info.match_tick]);
    }

    assert_eq!(buckets, vec![3, 6, 9]);
    assert_eq!(manager.current_tick(), 69);
    Ok(())
}

#[test]
fn test_pool_exhaustion_and_recovery() -> TestResult {
    let capacity = 5;
    let manager: TimerManager = manager(capacity)?;
    let mut timers = Vec::new();
    for i in 0..capacity {
        timers.push(manager.create(10, 0, TimerMode::OneShot, None, (), format!("t{i}"))?);
    }

    assert_eq!(
        manager.create(10, 0, TimerMode::OneShot, None, (), "overflow"),
        Err(TimerError::NonAvailable)
    );
    assert_eq!(manager.stats().pool_exhausted, 1);

    manager.delete(timers[2])?;
    let replacement = manager.create(10, 0, TimerMode::OneShot, None, (), "again")?;
    assert_eq!(replacement.slot(), timers[2].slot());
    assert_eq!(manager.available(), 0);
    Ok(())
}

#[test]
fn test_start_stop_start_uses_delay() -> TestResult {
    let manager: TimerManager = manager(1)?;
    let timer = manager.create(10, 4, TimerMode::Periodic, None, (), "p")?;

    assert_eq!(manager.start(timer)?, 10);
    run_ticks(&manager, 3);
    manager.stop(timer, StopOption::None)?;
    assert_eq!(manager.start(timer)?, 13);
    Ok(())
}

#[test]
fn test_same_bucket_fires_most_recent_first() -> TestResult {
    let log = Arc::new(Mutex::new(Vec::new()));
    let manager = manager(3)?;
    for id in 1..=3 {
        let timer = manager.create(4, 0, TimerMode::OneShot, Some(recorder(&log)), id, "t")?;
        manager.start(timer)?;
    }

    run_ticks(&manager, 4);
    assert_eq!(*log.lock(), vec![3, 2, 1]);
    Ok(())
}

#[test]
fn test_same_bucket_different_round_waits() -> TestResult {
    let log = Arc::new(Mutex::new(Vec::new()));
    let manager = manager(2)?;
    let near = manager.create(2, 0, TimerMode::OneShot, Some(recorder(&log)), 2, "near")?;
    let far = manager.create(12, 0, TimerMode::OneShot, Some(recorder(&log)), 12, "far")?;
    manager.start(near)?;
    manager.start(far)?;
    assert_eq!(manager.bucket_counts()[2], 2);

    manager.process_tick();
    let report = manager.process_tick();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.fired, 1);
    assert_eq!(*log.lock(), vec![2]);
    assert_eq!(manager.remaining_ticks_get(far)?, 10);

    assert_eq!(run_ticks(&manager, 10), vec![12]);
    assert_eq!(*log.lock(), vec![2, 12]);
    Ok(())
}

#[test]
fn test_delete_running_timer_disarms_it() -> TestResult {
    let log = Arc::new(Mutex::new(Vec::new()));
    let manager = manager(1)?;
    let timer = manager.create(2, 2, TimerMode::Periodic, Some(recorder(&log)), 1, "p")?;
    manager.start(timer)?;
    manager.delete(timer)?;

    assert!(run_ticks(&manager, 10).is_empty());
    assert!(log.lock().is_empty());
    assert_eq!(manager.running(), 0);
    assert_eq!(manager.start(timer), Err(TimerError::Inactive));
    Ok(())
}

#[test]
fn test_stop_runs_callback_on_caller() -> TestResult {
    let log = Arc::new(Mutex::new(Vec::new()));
    let manager = manager(1)?;
    let timer = manager.create(5, 0, TimerMode::OneShot, Some(recorder(&log)), 1, "o")?;
    manager.start(timer)?;

    assert_eq!(
        manager.stop(timer, StopOption::InvokeCallbackWithArg(77))?,
        StopOutcome::CallbackInvoked
    );
    assert_eq!(*log.lock(), vec![77]);
    // A stopped timer no longer fires.
    assert!(run_ticks(&manager, 10).is_empty());
    assert_eq!(manager.stats().callbacks_invoked, 1);
    Ok(())
}

#[test]
fn test_info_and_name() -> TestResult {
    let manager: TimerManager = manager(1)?;
    let timer = manager.create(6, 3, TimerMode::Periodic, None, (), "heartbeat")?;
    manager.start(timer)?;
    manager.process_tick();

    let info = manager.info(timer)?;
    assert_eq!(&*info.name, "heartbeat");
    assert_eq!(info.state, TimerState::Running);
    assert_eq!(info.mode, TimerMode::Periodic);
    assert_eq!((info.delay, info.period), (6, 3));
    assert_eq!(info.match_tick, 6);
    assert_eq!(info.remaining_ticks, 5);
    assert_eq!(&*manager.name_get(timer)?, "heartbeat");
    Ok(())
}

#[test]
fn test_handle_errors() -> TestResult {
    let manager: TimerManager = manager(1)?;
    let other: TimerManager = TimerManager::new(TimerConfig::default())?;
    let timer = manager.create(1, 0, TimerMode::OneShot, None, (), "x")?;

    assert_eq!(manager.start(TimerHandle::NULL), Err(TimerError::InvalidHandle));
    assert_eq!(manager.delete(TimerHandle::default()), Err(TimerError::InvalidHandle));
    assert_eq!(other.delete(timer), Err(TimerError::InvalidType));
    assert!(TimerError::InvalidType.is_handle_error());

    manager.delete(timer)?;
    assert_eq!(manager.name_get(timer), Err(TimerError::Inactive));
    assert_eq!(
        manager.stop(timer, StopOption::None),
        Err(TimerError::Inactive)
    );
    Ok(())
}

#[test]
fn test_integrity_after_mixed_lifecycle() -> TestResult {
    let manager: TimerManager = manager(6)?;
    let a = manager.create(3, 0, TimerMode::OneShot, None, (), "a")?;
    let b = manager.create(2, 5, TimerMode::Periodic, None, (), "b")?;
    let c = manager.create(4, 0, TimerMode::OneShot, None, (), "c")?;
    manager.start(a)?;
    manager.start(b)?;
    manager.start(c)?;
    manager.stop(c, StopOption::None)?;

    run_ticks(&manager, 3);
    let report = manager.verify_integrity()?;
    assert_eq!(report.free, 4);
    assert_eq!(report.running, 1);
    assert_eq!(report.stopped, 1);
    assert_eq!(manager.stats().internal_faults, 0);
    Ok(())
}
