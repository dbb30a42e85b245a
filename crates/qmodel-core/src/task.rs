//! Small cooperative-scheduling helpers shared by the retry and pool
//! layers.

use std::future::poll_fn;
use std::task::Poll;
use std::time::{Duration, Instant};

/// Cooperative sleep: yields to the scheduler until the deadline passes.
///
/// Implemented as a self-waking poll loop so it works on any executor; the
/// runtime reschedules the task between polls.
pub async fn sleep_for(duration: Duration) {
    let deadline = Instant::now() + duration;
    poll_fn(|cx| {
        if Instant::now() >= deadline {
            Poll::Ready(())
        } else {
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    })
    .await;
}

/// Yield once to the scheduler.
pub async fn yield_now() {
    let mut yielded = false;
    poll_fn(|cx| {
        if yielded {
            Poll::Ready(())
        } else {
            yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    })
    .await;
}
