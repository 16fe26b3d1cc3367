//! Retrying of transient failures with exponential backoff.
//!
//! Only the connection phase of a streaming call is ever retried; once a stream has
//! started yielding records, a failure ends the call.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;

#[cfg(feature = "metrics")]
use metrics::counter;

use crate::{Error, Result};

/// How many times an operation is attempted and how long to wait in between.
///
/// The delay before attempt `k + 1` is `initial_delay * backoff_factor^(k - 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one. `0` is treated as `1`.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after every retry. A delay that would not fit
    /// in a [`Duration`] saturates at [`Duration::MAX`].
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            initial_delay,
            backoff_factor,
        }
    }

    /// A policy that makes a single attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    pub fn backoff_factor(mut self, backoff_factor: f64) -> Self {
        self.backoff_factor = backoff_factor;
        self
    }

    fn schedule(&self) -> AttemptBackoff {
        AttemptBackoff {
            retries: self.max_attempts.max(1) - 1,
            initial_delay: self.initial_delay,
            backoff_factor: self.backoff_factor,
            remaining: self.max_attempts.max(1) - 1,
            next_delay: self.initial_delay,
        }
    }
}

/// A [`Backoff`] bounded by attempt count rather than elapsed time, without jitter.
struct AttemptBackoff {
    retries: u32,
    initial_delay: Duration,
    backoff_factor: f64,
    remaining: u32,
    next_delay: Duration,
}

impl Backoff for AttemptBackoff {
    fn reset(&mut self) {
        self.remaining = self.retries;
        self.next_delay = self.initial_delay;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let delay = self.next_delay;
        // Saturates instead of overflowing for huge factors or long schedules.
        self.next_delay =
            Duration::try_from_secs_f64(delay.as_secs_f64() * self.backoff_factor.max(0.0))
                .unwrap_or(Duration::MAX);
        Some(delay)
    }
}

/// Runs `operation` until it succeeds, fails permanently, or the policy runs out of
/// attempts.
///
/// Permanent errors (see [`Error::is_permanent`]) are returned straight away without
/// sleeping. The last attempt's error is returned as is. Dropping the returned future
/// cancels the attempt or sleep in progress, and nothing is retried afterwards.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    backoff::future::retry_notify(
        policy.schedule(),
        || {
            let attempt = operation();
            async move {
                attempt.await.map_err(|err| {
                    if err.is_permanent() {
                        backoff::Error::permanent(err)
                    } else {
                        backoff::Error::transient(err)
                    }
                })
            }
        },
        on_retry,
    )
    .await
}

fn on_retry(err: Error, delay: Duration) {
    #[cfg(feature = "tracing")]
    tracing::warn!(
        kind = ?err.kind(),
        delay_ms = delay.as_millis() as u64,
        "transient failure, retrying: {}",
        err
    );
    #[cfg(feature = "metrics")]
    counter!("ollama_client.retries_total", "kind" => format!("{:?}", err.kind())).increment(1);

    #[cfg(not(any(feature = "tracing", feature = "metrics")))]
    let _ = (err, delay);
    #[cfg(all(feature = "metrics", not(feature = "tracing")))]
    let _ = delay;
}
