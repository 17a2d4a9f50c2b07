//! ThrottleRetry - バックオフ付きリトライ実行
//!
//! # 終了条件
//! - 操作が成功した
//! - 述語（is_retryable）が false を返した → 最後のエラーを返す
//! - expiration を越える → 最後のエラーを返す
//! - cancel token が発火した → バックオフ中の sleep を中断して最後のエラーを返す
//!
//! 発行済みのバックエンド呼び出しは中断しません（完了を待ってから判定する）。

use std::future::Future;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::RetryPolicy;
use crate::domain::BackendError;

/// Runs an async backend call under a [`RetryPolicy`] and a retry predicate.
pub struct ThrottleRetry<'a, P> {
    policy: &'a RetryPolicy,
    cancel: &'a CancellationToken,
    is_retryable: P,
}

impl<'a, P> ThrottleRetry<'a, P>
where
    P: Fn(&BackendError) -> bool,
{
    pub fn new(policy: &'a RetryPolicy, cancel: &'a CancellationToken, is_retryable: P) -> Self {
        Self {
            policy,
            cancel,
            is_retryable,
        }
    }

    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, BackendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let started = Instant::now();
        let mut attempts: u32 = 0;
        let mut last_error: Option<BackendError> = None;

        loop {
            if self.cancel.is_cancelled() {
                return Err(last_error.unwrap_or(BackendError::Cancelled));
            }

            attempts += 1;
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !(self.is_retryable)(&err) {
                return Err(err);
            }

            let delay = {
                let mut rng = rand::thread_rng();
                self.policy.jittered_delay(attempts, &mut rng)
            };
            if self.policy.is_expired(started.elapsed(), delay) {
                return Err(err);
            }

            debug!(attempts, ?delay, error = %err, "backend call failed, backing off");
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(err),
                _ = tokio::time::sleep(delay) => {}
            }
            last_error = Some(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn busy() -> BackendError {
        BackendError::ServiceBusy("throttled".into())
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let policy = RetryPolicy::retry_forever();
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let result = ThrottleRetry::new(&policy, &cancel, |_| true)
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        Err(BackendError::Unavailable("flaky".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_returns_immediately() {
        let policy = RetryPolicy::delete_retry();
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let retry = ThrottleRetry::new(&policy, &cancel, BackendError::is_service_busy);
        let result: Result<(), _> = retry
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(BackendError::ConditionFailed("range id mismatch".into())) }
            })
            .await;

        assert!(matches!(result, Err(BackendError::ConditionFailed(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn busy_predicate_retries_busy_then_surfaces_other_error() {
        let policy = RetryPolicy::delete_retry();
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let retry = ThrottleRetry::new(&policy, &cancel, BackendError::is_service_busy);
        let result: Result<(), _> = retry
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 5 {
                        Err(busy())
                    } else {
                        Err(BackendError::NotFound("gone".into()))
                    }
                }
            })
            .await;

        assert!(matches!(result, Err(BackendError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_backoff_sleep() {
        let policy = RetryPolicy::retry_forever()
            .with_intervals(Duration::from_secs(60), Duration::from_secs(60))
            .with_jitter(0.0);
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let result: Result<(), _> = ThrottleRetry::new(&policy, &cancel, |_| true)
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(busy()) }
            })
            .await;

        assert!(matches!(result, Err(BackendError::ServiceBusy(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn already_cancelled_makes_no_attempt() {
        let policy = RetryPolicy::retry_forever();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = ThrottleRetry::new(&policy, &cancel, |_| true)
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;

        assert!(matches!(result, Err(BackendError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn expiration_bounds_total_retry_time() {
        let policy = RetryPolicy::retry_forever()
            .with_jitter(0.0)
            .with_expiration(Some(Duration::from_secs(2)));
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result: Result<(), _> = ThrottleRetry::new(&policy, &cancel, |_| true)
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(busy()) }
            })
            .await;

        assert!(result.is_err());
        // 250ms + 500ms + 1s = 1.75s; the next 2s sleep would cross the horizon.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(started.elapsed() <= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_waits_for_the_call_in_flight() {
        let policy = RetryPolicy::retry_forever();
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let result = ThrottleRetry::new(&policy, &cancel, |_| true)
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<_, BackendError>("done")
                }
            })
            .await;

        assert!(cancel.is_cancelled());
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() >= Duration::from_secs(5));
    }
}
