//! Cooperative pool semantics that need only the scheduler, not sockets.

use std::time::{Duration, Instant};

use asupersync::runtime::RuntimeBuilder;
use asupersync::Cx;
use qmodel::prelude::*;

#[test]
fn async_acquire_times_out_at_the_cap() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        // A zero-capacity pool is always at its cap; acquire must park
        // until the deadline and then fail with exhaustion.
        let pool = AsyncPool::new(
            ConnectConfig::new("127.0.0.1", 1),
            PoolConfig::new(0, 0).timeout(Duration::from_millis(50)),
        );

        let started = Instant::now();
        let outcome = pool.acquire(&cx).await;
        let elapsed = started.elapsed();

        match outcome {
            Outcome::Err(Error::Pool(e)) => {
                assert_eq!(e.kind, qmodel::core::PoolErrorKind::Exhausted)
            }
            other => panic!("expected pool exhaustion, got {other:?}"),
        }
        assert!(
            elapsed >= Duration::from_millis(40),
            "gave up too early: {elapsed:?}"
        );
    });
}

#[test]
fn cooperative_sleep_respects_the_deadline() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create runtime");

    rt.block_on(async {
        let started = Instant::now();
        qmodel::core::task::sleep_for(Duration::from_millis(30)).await;
        assert!(started.elapsed() >= Duration::from_millis(25));
    });
}

#[test]
fn async_retry_policy_delays_match_the_sync_ones() {
    let policy = RetryPolicy::new(2)
        .base_delay(Duration::from_millis(10))
        .backoff_factor(3.0)
        .max_delay(Duration::from_millis(50));
    assert_eq!(policy.delay(0), Duration::from_millis(10));
    assert_eq!(policy.delay(1), Duration::from_millis(30));
    assert_eq!(policy.delay(2), Duration::from_millis(50));
}
