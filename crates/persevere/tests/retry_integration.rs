//! Integration tests for the retry engine
//!
//! Exercises the engine loop end to end: backoff timing, cancellation
//! races, abandonment of in-flight attempts, and budget-driven
//! termination across concurrent retry loops.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use persevere::{retry, retry_with_config, Budget, Fault, Jitter, RetryConfig, RetryError};
use tokio_util::sync::CancellationToken;

/// Route engine tracing through the test harness; filter with `RUST_LOG`.
fn init_diagnostics() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn close_to(got: Duration, want: Duration) -> bool {
    let diff = if got > want { got - want } else { want - got };
    diff < Duration::from_millis(50)
}

/// Ensures the default backoff schedule drives attempts at the expected
/// times.
///
/// The operation fails three times and then succeeds, so the attempts
/// should start at roughly 0ms, 100ms, 300ms, and 700ms with jitter
/// disabled.
#[tokio::test(flavor = "multi_thread")]
async fn test_default_schedule_end_to_end() {
    init_diagnostics();
    let cancel = CancellationToken::new();
    let config = RetryConfig::builder().no_jitter().build().expect("valid configuration");

    let start = Instant::now();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);

    let result = retry_with_config(&cancel, config, move |attempt| {
        let seen = Arc::clone(&seen_clone);
        async move {
            seen.lock().expect("mutex poisoned").push(start.elapsed());
            if attempt.index() < 3 {
                return Err(Fault::transient(std::io::Error::other("not yet")));
            }
            Ok(())
        }
    })
    .await;

    result.expect("succeeds on the fourth attempt");

    let seen = seen.lock().expect("mutex poisoned");
    let want = [
        Duration::ZERO,
        Duration::from_millis(100),
        Duration::from_millis(300),
        Duration::from_millis(700),
    ];
    assert_eq!(seen.len(), want.len());
    for (got, want) in seen.iter().zip(want) {
        assert!(close_to(*got, want), "attempt at {got:?}, want about {want:?}");
    }
}

/// Validates the cancellation race while an attempt is in flight.
///
/// The operation blocks until its derived token fires, so only the outer
/// cancellation can unblock the engine. The engine must return
/// `Cancelled` as soon as the outer token fires, regardless of the
/// configured backoff.
#[tokio::test(flavor = "multi_thread")]
async fn test_cancellation_during_attempt() {
    init_diagnostics();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let result: Result<(), _> = retry(&cancel, |attempt| async move {
        attempt.cancelled().await;
        Err(Fault::transient(std::io::Error::other("interrupted")))
    })
    .await;

    assert!(matches!(result, Err(RetryError::Cancelled)));
    assert!(
        close_to(start.elapsed(), Duration::from_millis(500)),
        "returned after {:?}, want about 500ms",
        start.elapsed()
    );
}

/// Validates the cancellation race during the backoff sleep.
///
/// The operation fails instantly and the backoff is far longer than the
/// cancellation deadline, so the engine must give up mid-sleep.
#[tokio::test(flavor = "multi_thread")]
async fn test_cancellation_during_backoff() {
    init_diagnostics();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let config = RetryConfig::builder()
        .exponential_backoff(Duration::from_secs(30), 2.0, Duration::from_secs(60))
        .no_jitter()
        .build()
        .expect("valid configuration");

    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = Arc::clone(&counter);

    let start = Instant::now();
    let result: Result<(), _> = retry_with_config(&cancel, config, move |_| {
        let c = Arc::clone(&counter_clone);
        async move {
            c.fetch_add(1, Ordering::SeqCst);
            Err(Fault::transient(std::io::Error::other("oh no")))
        }
    })
    .await;

    assert!(matches!(result, Err(RetryError::Cancelled)));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(
        close_to(start.elapsed(), Duration::from_millis(300)),
        "returned after {:?}, want about 300ms",
        start.elapsed()
    );
}

/// Confirms an abandoned attempt keeps running after the engine returns.
///
/// Cancellation propagates to the derived token, so the detached task can
/// observe it, finish its cleanup, and set a flag the test then checks.
#[tokio::test(flavor = "multi_thread")]
async fn test_abandoned_attempt_observes_cancellation() {
    init_diagnostics();
    let cancel = CancellationToken::new();
    let cleaned_up = Arc::new(AtomicBool::new(false));
    let cleaned_up_clone = Arc::clone(&cleaned_up);

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result: Result<(), _> = retry(&cancel, move |attempt| {
        let flag = Arc::clone(&cleaned_up_clone);
        async move {
            attempt.cancelled().await;
            flag.store(true, Ordering::SeqCst);
            Err(Fault::transient(std::io::Error::other("interrupted")))
        }
    })
    .await;

    assert!(matches!(result, Err(RetryError::Cancelled)));

    // The engine has returned; the detached task finishes on its own.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(cleaned_up.load(Ordering::SeqCst), "abandoned task never saw the cancellation");
}

/// Validates budget-driven termination across concurrent retry loops.
///
/// Several unbounded retry loops share one zero-headroom budget. Every
/// loop must terminate with the budget-exhausted sentinel instead of
/// retrying forever, and the refused attempts are never invoked.
#[tokio::test(flavor = "multi_thread")]
async fn test_shared_budget_terminates_unbounded_loops() {
    init_diagnostics();
    let budget = Arc::new(Budget::new(0.0, 0.1));
    // Settle the window so the very first ratio check sees history.
    for _ in 0..10 {
        budget.send_ok(false);
        std::thread::sleep(Duration::from_millis(1));
    }

    let invocations = Arc::new(AtomicU32::new(0));
    let mut tasks = Vec::new();

    for _ in 0..4 {
        let budget = Arc::clone(&budget);
        let invocations = Arc::clone(&invocations);
        tasks.push(tokio::spawn(async move {
            let cancel = CancellationToken::new();
            let config = RetryConfig::builder()
                .attempts(0)
                .exponential_backoff(Duration::from_millis(1), 2.0, Duration::from_millis(2))
                .no_jitter()
                .budget(budget)
                .build()
                .expect("valid configuration");

            retry_with_config(&cancel, config, move |_| {
                let invocations = Arc::clone(&invocations);
                async move {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(Fault::transient(std::io::Error::other("always fails")))
                }
            })
            .await
        }));
    }

    for task in tasks {
        let result = task.await.expect("task completes");
        assert!(matches!(result, Err(RetryError::BudgetExhausted)));
    }

    // 4 initial attempts plus the handful of retries the 0.1 ratio admits
    // against 14 recorded initial calls.
    let invoked = invocations.load(Ordering::SeqCst);
    assert!(invoked <= 12, "invoked {invoked} times, budget barely throttled");
}

/// Checks the distribution of full jitter over many samples.
///
/// Uniform samples over `[0, delay)` should average out to about half the
/// delay.
#[test]
fn test_full_jitter_is_roughly_uniform() {
    let delay = Duration::from_millis(1000);

    let mut sum = Duration::ZERO;
    for _ in 0..1000 {
        let sample = Jitter::Full.apply(delay);
        assert!(sample < delay, "sample {sample:?} outside [0, delay)");
        sum += sample;
    }

    let mean = sum / 1000;
    assert!(
        mean > Duration::from_millis(430) && mean < Duration::from_millis(570),
        "mean {mean:?} too far from 500ms for uniform samples"
    );
}
