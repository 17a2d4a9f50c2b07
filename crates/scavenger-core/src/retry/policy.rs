//! Retry policy: decides backoff delays.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff shape shared by every retried backend call.
///
/// The policy only decides *how long* to wait. Whether an error is worth
/// retrying at all is decided by the predicate handed to
/// [`ThrottleRetry`](super::ThrottleRetry).
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay after the first failure.
    pub initial_interval: Duration,

    /// Ceiling for any single delay.
    pub maximum_interval: Duration,

    /// Total retry horizon; `None` retries without a time limit.
    pub expiration_interval: Option<Duration>,

    /// Growth factor between consecutive delays.
    pub backoff_coefficient: f64,

    /// Fraction of each delay that may be randomly shaved off (0.0 = none).
    pub jitter: f64,
}

pub const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_MAXIMUM_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_BACKOFF_COEFFICIENT: f64 = 2.0;
const DEFAULT_JITTER: f64 = 0.2;

impl RetryPolicy {
    /// Unbounded policy used for idempotent reclamation calls.
    pub fn retry_forever() -> Self {
        Self {
            initial_interval: DEFAULT_INITIAL_INTERVAL,
            maximum_interval: DEFAULT_MAXIMUM_INTERVAL,
            expiration_interval: None,
            backoff_coefficient: DEFAULT_BACKOFF_COEFFICIENT,
            jitter: DEFAULT_JITTER,
        }
    }

    /// Policy for fenced deletes.
    ///
    /// Same shape as [`RetryPolicy::retry_forever`]; deletes differ only in
    /// which errors they consider retryable.
    pub fn delete_retry() -> Self {
        Self::retry_forever()
    }

    pub fn with_intervals(mut self, initial: Duration, maximum: Duration) -> Self {
        self.initial_interval = initial;
        self.maximum_interval = maximum;
        self
    }

    pub fn with_expiration(mut self, expiration: Option<Duration>) -> Self {
        self.expiration_interval = expiration;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay before the next attempt, without jitter.
    ///
    /// `attempts` is the number of attempts already made (1-indexed):
    /// `initial_interval * backoff_coefficient^(attempts - 1)`, capped at
    /// `maximum_interval`.
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);
        let max_secs = self.maximum_interval.as_secs_f64();
        if !secs.is_finite() || secs >= max_secs {
            return self.maximum_interval;
        }
        Duration::from_secs_f64(secs)
    }

    /// [`next_delay`](Self::next_delay) with up to `jitter` of it randomly removed.
    pub fn jittered_delay<R: Rng + ?Sized>(&self, attempts: u32, rng: &mut R) -> Duration {
        let delay = self.next_delay(attempts);
        if self.jitter <= 0.0 {
            return delay;
        }
        let shave = rng.gen_range(0.0..=self.jitter);
        delay.mul_f64(1.0 - shave)
    }

    /// Would sleeping `next` after `elapsed` cross the expiration horizon?
    pub fn is_expired(&self, elapsed: Duration, next: Duration) -> bool {
        match self.expiration_interval {
            Some(expiration) => elapsed + next > expiration,
            None => false,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::retry_forever()
    }
}
