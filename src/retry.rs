//! Retry combinator for fallible operations.
//!
//! The caller decides which errors are transient through a classifier; the
//! combinator only owns the bounded backoff schedule. It does not log:
//! callers that want a trace of retried errors wrap the classifier.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Bounded exponential backoff schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    /// Maximum number of invocations of the operation, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial: Duration,
    /// Growth factor applied to the delay after each retry.
    pub factor: f64,
    /// Upper bound on a single delay.
    pub max_delay: Duration,
    /// Random spread added to each delay, as a fraction of it (0.0 - 1.0).
    pub jitter: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial: Duration::from_millis(500),
            factor: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: 0.1,
        }
    }
}

impl Backoff {
    /// Un-jittered delay that follows a failed attempt number `attempt`
    /// (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let scaled = self.initial.as_secs_f64() * self.factor.max(1.0).powi(exponent);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
    }

    /// Spread a delay by up to `jitter` of itself. A non-finite or
    /// non-positive jitter leaves the delay unchanged.
    fn jittered(&self, delay: Duration) -> Duration {
        if !self.jitter.is_finite() || self.jitter <= 0.0 || delay.is_zero() {
            return delay;
        }
        let spread = self.jitter.min(1.0);
        let extra = rand::thread_rng().gen_range(0.0..=spread);
        Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + extra)).unwrap_or(delay)
    }
}

/// Run `operation` under the default [`Backoff`], retrying while `classify`
/// deems the error transient.
///
/// # Errors
///
/// Returns the first non-retryable error, or the last error once the
/// attempt budget is spent. Errors are passed through unchanged.
pub async fn retry<T, E, F, Fut, C>(operation: F, classify: C) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: FnMut(&E) -> bool,
{
    retry_with(&Backoff::default(), operation, classify).await
}

/// Run `operation` under `backoff`, retrying while `classify` deems the
/// error transient.
///
/// Attempts run sequentially; the task sleeps between them. A
/// `max_attempts` of zero still runs the operation once.
///
/// # Errors
///
/// Returns the first non-retryable error, or the last error once the
/// attempt budget is spent. Errors are passed through unchanged.
pub async fn retry_with<T, E, F, Fut, C>(
    backoff: &Backoff,
    mut operation: F,
    mut classify: C,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: FnMut(&E) -> bool,
{
    let max_attempts = backoff.max_attempts.max(1);
    let mut attempt: u32 = 1;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !classify(&err) || attempt >= max_attempts {
            return Err(err);
        }

        let delay = backoff.jittered(backoff.delay_for(attempt));
        tokio::time::sleep(delay).await;
        attempt = attempt.saturating_add(1);
    }
}
