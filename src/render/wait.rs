//! Bounded polling.
//!
//! Pages render asynchronously after navigation settles, so elements are
//! waited for rather than read straight away. [`wait_until`] probes a
//! condition until it yields a value or the timeout elapses; it returns as
//! soon as the condition holds instead of sleeping a fixed delay.

use std::thread;
use std::time::{Duration, Instant};

/// How long to wait for a condition and how often to probe it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl WaitPolicy {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }
}

/// Probe `condition` until it returns `Some`, or give up after the policy's
/// timeout and return `Ok(None)`.
///
/// The condition is always probed at least once. An `Err` from the condition
/// aborts the wait and is returned as is.
pub fn wait_until<T, E>(
    policy: &WaitPolicy,
    mut condition: impl FnMut() -> Result<Option<T>, E>,
) -> Result<Option<T>, E> {
    let start = Instant::now();
    loop {
        if let Some(value) = condition()? {
            return Ok(Some(value));
        }
        let elapsed = start.elapsed();
        if elapsed >= policy.timeout {
            return Ok(None);
        }
        thread::sleep(policy.poll_interval.min(policy.timeout - elapsed));
    }
}
