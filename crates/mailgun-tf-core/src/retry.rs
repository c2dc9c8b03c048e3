//! Bounded retry utility
//!
//! A single retry loop used wherever the remote API is only eventually
//! consistent: reading the IPs of a freshly created domain and confirming
//! that a deleted object is gone.
//!
//! The loop is parameterized by the operation, a predicate deciding which
//! errors are worth retrying, and a [`RetryPolicy`] (backoff and wall-clock
//! ceiling). It blocks the calling task for at most the ceiling plus one
//! final attempt, and never reports exhaustion before the ceiling elapsed.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

/// Backoff schedule and wall-clock ceiling for [`retry`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total time after which a retryable failure becomes terminal
    pub ceiling: Duration,
    /// Delay after the first failed attempt
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor applied to the delay after each failure
    pub multiplier: u32,
}

impl RetryPolicy {
    /// Exponential backoff (doubling) capped at `max_delay`
    pub fn exponential(ceiling: Duration, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            ceiling,
            initial_delay,
            max_delay,
            multiplier: 2,
        }
    }

    /// Fixed-interval polling
    pub fn fixed(ceiling: Duration, interval: Duration) -> Self {
        Self {
            ceiling,
            initial_delay: interval,
            max_delay: interval,
            multiplier: 1,
        }
    }

    fn next_delay(&self, current: Duration) -> Duration {
        current
            .saturating_mul(self.multiplier.max(1))
            .min(self.max_delay)
    }
}

/// Why a retry loop gave up
#[derive(Debug)]
pub enum RetryError<E> {
    /// The predicate classified the error as not retryable
    Permanent(E),
    /// The ceiling elapsed; carries the error of the last attempt
    Exhausted {
        /// Error returned by the final attempt
        last: E,
        /// Number of attempts made
        attempts: usize,
        /// Time spent in the loop
        elapsed: Duration,
    },
}

impl<E> RetryError<E> {
    /// The error that ended the loop
    pub fn into_inner(self) -> E {
        match self {
            Self::Permanent(e) => e,
            Self::Exhausted { last, .. } => last,
        }
    }

    /// Whether the loop ended because the ceiling elapsed
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

impl From<RetryError<crate::Error>> for crate::Error {
    fn from(err: RetryError<crate::Error>) -> Self {
        err.into_inner()
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the policy's ceiling elapses.
pub async fn retry<T, E, Op, Fut, P>(
    policy: &RetryPolicy,
    mut operation: Op,
    is_retryable: P,
) -> Result<T, RetryError<E>>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let start = Instant::now();
    let mut delay = policy.initial_delay;
    let mut attempts = 0usize;

    loop {
        attempts += 1;

        match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    debug!("Operation succeeded after {} attempts", attempts);
                }
                return Ok(value);
            }
            Err(e) if !is_retryable(&e) => {
                debug!("Attempt {} failed with non-retryable error: {}", attempts, e);
                return Err(RetryError::Permanent(e));
            }
            Err(e) => {
                let elapsed = start.elapsed();
                if elapsed >= policy.ceiling {
                    warn!(
                        "Giving up after {} attempts ({:?}): {}",
                        attempts, elapsed, e
                    );
                    return Err(RetryError::Exhausted {
                        last: e,
                        attempts,
                        elapsed,
                    });
                }

                let wait = delay.min(policy.ceiling - elapsed);
                debug!(
                    "Attempt {} failed, retrying in {:?}: {}",
                    attempts, wait, e
                );
                sleep(wait).await;
                delay = policy.next_delay(delay);
            }
        }
    }
}
