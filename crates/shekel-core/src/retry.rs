//! Retry with backoff for unreliable external calls.
//!
//! Two policies are used by the pipeline:
//!
//! - [`RetryPolicy::translation`]: 5 attempts, 20s base delay doubling on
//!   every failure, randomized.
//! - [`RetryPolicy::notification`]: 5 attempts, fixed 30s floor, randomized.
//!
//! Randomized jitter multiplies each delay by a factor in `[1, 2)`, so the
//! computed delay is a lower bound.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::warn;

use crate::AppError;

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// `base_delay * factor^(attempt - 1)`.
    Exponential { factor: f64 },
    /// Always `base_delay`.
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jitter {
    None,
    /// Multiply the delay by a random factor in `[1, 2)`.
    Randomized,
}

/// Returned once every attempt has failed, or a non-retryable error stopped the loop.
#[derive(Error, Debug)]
#[error("Gave up after {attempts} attempt(s): {last_error}")]
pub struct RetryExhausted {
    pub attempts: u32,
    #[source]
    pub last_error: AppError,
}

/// Configuration for retries with backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
    pub jitter: Jitter,
    /// Cap applied before jitter.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Policy for batch translation calls.
    pub fn translation() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(20),
            backoff: Backoff::Exponential { factor: 2.0 },
            jitter: Jitter::Randomized,
            max_delay: Duration::from_secs(60 * 60),
        }
    }

    /// Policy for chat notifications.
    pub fn notification() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(30),
            backoff: Backoff::Fixed,
            jitter: Jitter::Randomized,
            max_delay: Duration::from_secs(60 * 60),
        }
    }

    /// Policy with no delay between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            backoff: Backoff::Fixed,
            jitter: Jitter::None,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before the retry that follows failed attempt number `attempt`, before jitter.
    ///
    /// - Attempt 0: no delay
    /// - Translation policy: 20s, 40s, 80s, 160s
    /// - Notification policy: 30s every time
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let delay = match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Exponential { factor } => {
                let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
                let secs = self.base_delay.as_secs_f64() * factor.powi(exponent);
                Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay)
            }
        };

        delay.min(self.max_delay)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        match self.jitter {
            Jitter::None => delay,
            Jitter::Randomized => {
                let factor: f64 = rand::rng().random_range(1.0..2.0);
                delay.mul_f64(factor)
            }
        }
    }

    /// Runs `op` until it succeeds or the policy gives up.
    ///
    /// Each failed attempt is logged at `warn` with `label`. Errors that are
    /// not [`AppError::is_retryable`] end the loop at once.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, RetryExhausted>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= max_attempts || !e.is_retryable() => {
                    warn!(
                        operation = label,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Giving up"
                    );
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: e,
                    });
                }
                Err(e) => {
                    let delay = self.jittered(self.delay_for_attempt(attempt));
                    warn!(
                        operation = label,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
