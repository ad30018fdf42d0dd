//! Tests for the circuit-breaker policy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use crate::backoff::BackoffSchedule;
use crate::classify::FailureClassifier;
use crate::control::Cancellation;
use crate::error::PolicyError;

use super::{lock_recovering, CircuitBreakerConfig, CircuitBreakerPolicy, CircuitState};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
enum Fault {
    #[error("unavailable")]
    Unavailable,
    #[error("invalid")]
    Invalid,
}

fn breaker(max_failures: usize, cool_down: Duration) -> CircuitBreakerPolicy<Fault> {
    let mut config = CircuitBreakerConfig::default();
    config.max_failures = max_failures;
    config.cool_down = BackoffSchedule::constant(cool_down);
    CircuitBreakerPolicy::new(config)
}

fn failing(calls: &AtomicUsize) -> impl FnOnce() -> Result<(), Fault> + '_ {
    move || {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(Fault::Unavailable)
    }
}

#[test]
fn open_circuit_rejects_without_calling_action() {
    let cb = breaker(1, Duration::from_secs(60));
    let calls = AtomicUsize::new(0);
    let never = Cancellation::never();

    for _ in 0..3 {
        let _ = cb.execute_void(&never, failing(&calls));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(cb.execute_void(&never, failing(&calls)).unwrap_err().is_circuit_broken());
    assert_eq!(cb.state(), CircuitState::Open);
}

#[test]
fn threshold_counts_consecutive_failures() {
    let cb = breaker(3, Duration::from_secs(60));
    let calls = AtomicUsize::new(0);
    let never = Cancellation::never();

    for _ in 0..3 {
        let err = cb.execute_void(&never, failing(&calls)).unwrap_err();
        assert!(matches!(err, PolicyError::Failed(Fault::Unavailable)));
    }
    assert!(cb.is_open());
    assert!(cb.execute_void(&never, failing(&calls)).unwrap_err().is_circuit_broken());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn success_resets_counter_before_threshold() {
    let cb = breaker(2, Duration::from_secs(60));
    let calls = AtomicUsize::new(0);
    let never = Cancellation::never();

    let _ = cb.execute_void(&never, failing(&calls));
    assert_eq!(cb.consecutive_failures(), 1);
    cb.execute(&never, || Ok::<_, Fault>("ok")).unwrap();
    assert_eq!(cb.consecutive_failures(), 0);
    let _ = cb.execute_void(&never, failing(&calls));
    assert_eq!(cb.state(), CircuitState::Closed);
}

#[test]
fn unhandled_failures_pass_through_without_counting() {
    let mut config = CircuitBreakerConfig::new(FailureClassifier::kind_of(&Fault::Unavailable));
    config.max_failures = 0;
    let cb = CircuitBreakerPolicy::new(config);
    let never = Cancellation::never();

    let err = cb.execute_void(&never, || Err(Fault::Invalid)).unwrap_err();
    assert!(matches!(err, PolicyError::Failed(Fault::Invalid)));
    assert_eq!(cb.consecutive_failures(), 0);
    assert_eq!(cb.state(), CircuitState::Closed);

    let _ = cb.execute_void(&never, || Err(Fault::Unavailable));
    assert!(cb.execute_void(&never, || Ok(())).unwrap_err().is_circuit_broken());
}

#[test]
fn returns_value_on_success() {
    let cb = breaker(1, Duration::from_secs(1));
    let value = cb.execute(&Cancellation::never(), || Ok::<_, Fault>("test")).unwrap();
    assert_eq!(value, "test");
}

#[test]
fn closes_again_after_cool_down() {
    let cb = breaker(1, Duration::from_millis(5));
    let calls = AtomicUsize::new(0);
    let never = Cancellation::never();

    let _ = cb.execute_void(&never, failing(&calls));
    assert!(cb.execute_void(&never, failing(&calls)).unwrap_err().is_circuit_broken());

    thread::sleep(Duration::from_millis(60));
    let err = cb.execute_void(&never, failing(&calls)).unwrap_err();
    assert!(matches!(err, PolicyError::Failed(Fault::Unavailable)));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn callbacks_report_break_and_reset() {
    let breaks = Arc::new(Mutex::new(Vec::new()));
    let resets = Arc::new(AtomicUsize::new(0));

    let mut config: CircuitBreakerConfig<Fault> = CircuitBreakerConfig::default();
    config.max_failures = 2;
    config.cool_down = BackoffSchedule::from_fn(|failures| {
        (Duration::from_millis(5 * failures as u64), true)
    });
    let record = Arc::clone(&breaks);
    config.on_break = Some(Arc::new(move |failure: &Fault, cool_down: Duration| {
        record.lock().unwrap().push((failure.clone(), cool_down));
    }));
    let count = Arc::clone(&resets);
    config.on_reset = Some(Arc::new(move || {
        count.fetch_add(1, Ordering::SeqCst);
    }));
    let cb = CircuitBreakerPolicy::new(config);
    let never = Cancellation::never();

    let _ = cb.execute_void(&never, || Err(Fault::Unavailable));
    assert!(breaks.lock().unwrap().is_empty());
    let _ = cb.execute_void(&never, || Err(Fault::Unavailable));
    assert_eq!(
        *breaks.lock().unwrap(),
        vec![(Fault::Unavailable, Duration::from_millis(10))]
    );

    thread::sleep(Duration::from_millis(100));
    assert_eq!(resets.load(Ordering::SeqCst), 1);
    assert_eq!(cb.state(), CircuitState::Closed);
    assert_eq!(cb.consecutive_failures(), 0);
}

#[test]
fn open_check_precedes_cancellation() {
    let cb = breaker(1, Duration::from_secs(60));
    let _ = cb.execute_void(&Cancellation::never(), || Err(Fault::Unavailable));

    let cancel = Cancellation::new();
    cancel.cancel();
    assert!(cb.execute_void(&cancel, || Ok(())).unwrap_err().is_circuit_broken());
}

#[test]
fn cancelled_call_skips_action_while_closed() {
    let cb = breaker(1, Duration::from_secs(60));
    let cancel = Cancellation::new();
    cancel.cancel();
    let calls = AtomicUsize::new(0);
    let err = cb.execute_void(&cancel, failing(&calls)).unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(cb.state(), CircuitState::Closed);
}

#[test]
fn concurrent_failures_break_exactly_once() {
    const THREADS: usize = 8;
    let breaks = Arc::new(AtomicUsize::new(0));
    let mut config: CircuitBreakerConfig<Fault> = CircuitBreakerConfig::default();
    config.max_failures = 2;
    config.cool_down = BackoffSchedule::constant(Duration::from_secs(60));
    let count = Arc::clone(&breaks);
    config.on_break = Some(Arc::new(move |_: &Fault, _: Duration| {
        count.fetch_add(1, Ordering::SeqCst);
    }));
    let cb = CircuitBreakerPolicy::new(config);
    let barrier = Barrier::new(THREADS);

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                // All actions are in flight before any result is recorded.
                let _ = cb.execute_void(&Cancellation::never(), || {
                    barrier.wait();
                    Err(Fault::Unavailable)
                });
            });
        }
    });
    assert_eq!(breaks.load(Ordering::SeqCst), 1);
    assert!(cb.is_open());
}

#[test]
fn dropping_breaker_cancels_pending_reset() {
    let resets = Arc::new(AtomicUsize::new(0));
    let mut config: CircuitBreakerConfig<Fault> = CircuitBreakerConfig::default();
    config.cool_down = BackoffSchedule::constant(Duration::from_millis(30));
    let count = Arc::clone(&resets);
    config.on_reset = Some(Arc::new(move || {
        count.fetch_add(1, Ordering::SeqCst);
    }));
    let cb = CircuitBreakerPolicy::new(config);
    let _ = cb.execute_void(&Cancellation::never(), || Err(Fault::Unavailable));
    assert!(cb.is_open());

    drop(cb);
    thread::sleep(Duration::from_millis(120));
    assert_eq!(resets.load(Ordering::SeqCst), 0);
}

#[test]
fn stale_timer_does_not_replace_newer_break() {
    let resets = Arc::new(AtomicUsize::new(0));
    let mut config: CircuitBreakerConfig<Fault> = CircuitBreakerConfig::default();
    config.cool_down = BackoffSchedule::constant(Duration::from_millis(30));
    let count = Arc::clone(&resets);
    config.on_reset = Some(Arc::new(move || {
        count.fetch_add(1, Ordering::SeqCst);
    }));
    let cb = CircuitBreakerPolicy::new(config);
    let never = Cancellation::never();

    // First break closes early, as if its timer had already fired.
    let _ = cb.execute_void(&never, || Err(Fault::Unavailable));
    assert!(lock_recovering(&cb.state).reset(1));

    let _ = cb.execute_void(&never, || Err(Fault::Unavailable));
    assert!(cb.is_open());

    // The first break's timer is stored late, after the second break armed its own.
    cb.schedule_reset(1, Duration::from_millis(30));

    thread::sleep(Duration::from_millis(150));
    assert_eq!(cb.state(), CircuitState::Closed);
    assert_eq!(resets.load(Ordering::SeqCst), 1);
}
