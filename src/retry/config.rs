use super::{Backoff, RetryError};
use crate::cancel::CancelToken;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, warn};

/// Delay used between attempts when no delay function is configured
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

type DelayFn = Box<dyn FnMut() -> Duration + Send>;
type ShouldRetryFn = Box<dyn Fn(&anyhow::Error) -> bool + Send + Sync>;

/// Retry policy for a single operation.
///
/// The zero values mean "unbounded": a zero start timeout never expires and
/// zero tries retries forever. Without a predicate every error is retried.
/// The config is consumed by [`RetryConfig::run`], so a stateful delay such
/// as a [`Backoff`] starts fresh for each operation.
pub struct RetryConfig {
    start_timeout: Duration,
    retry_delay: Option<DelayFn>,
    tries: u32,
    should_retry: Option<ShouldRetryFn>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("start_timeout", &self.start_timeout)
            .field("custom_delay", &self.retry_delay.is_some())
            .field("tries", &self.tries)
            .field("custom_should_retry", &self.should_retry.is_some())
            .finish()
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self {
            start_timeout: Duration::ZERO,
            retry_delay: None,
            tries: 0,
            should_retry: None,
        }
    }

    /// Stop retrying once this much time has passed since `run` started
    pub fn with_start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = timeout;
        self
    }

    /// Maximum number of attempts, including the first
    pub fn with_tries(mut self, tries: u32) -> Self {
        self.tries = tries;
        self
    }

    /// Wait `delay` between every pair of attempts
    pub fn with_fixed_delay(self, delay: Duration) -> Self {
        self.with_retry_delay(move || delay)
    }

    /// Wait according to `backoff`, advancing it with [`Backoff::linear`]
    pub fn with_backoff(self, mut backoff: Backoff) -> Self {
        self.with_retry_delay(move || backoff.linear())
    }

    /// Compute each wait with `delay`
    pub fn with_retry_delay<F>(mut self, delay: F) -> Self
    where
        F: FnMut() -> Duration + Send + 'static,
    {
        self.retry_delay = Some(Box::new(delay));
        self
    }

    /// Retry only errors for which `should_retry` returns true
    pub fn with_should_retry<F>(mut self, should_retry: F) -> Self
    where
        F: Fn(&anyhow::Error) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Some(Box::new(should_retry));
        self
    }

    /// Await `operation` until it succeeds or the policy gives up.
    ///
    /// The operation always runs at least once. Cancellation and the start
    /// timeout are checked after each failed attempt and cut any pending
    /// wait short.
    pub async fn run<T, F, Fut>(
        mut self,
        cancel: &CancelToken,
        mut operation: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let deadline = (!self.start_timeout.is_zero()).then(|| Instant::now() + self.start_timeout);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let err = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "Operation succeeded after retrying");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if let Some(should_retry) = &self.should_retry {
                if !should_retry(&err) {
                    return Err(RetryError::Rejected(err));
                }
            }

            if self.tries != 0 && attempt >= self.tries {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled(err));
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(RetryError::TimedOut(err));
            }

            let delay = self.next_delay();
            warn!(attempt, ?delay, "Retryable error: {:#}", err);

            tokio::select! {
                _ = sleep(delay) => {}
                _ = cancel.cancelled() => return Err(RetryError::Cancelled(err)),
                _ = until(deadline) => return Err(RetryError::TimedOut(err)),
            }
        }
    }

    fn next_delay(&mut self) -> Duration {
        match &mut self.retry_delay {
            Some(delay) => delay(),
            None => DEFAULT_RETRY_DELAY,
        }
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast() -> RetryConfig {
        RetryConfig::new().with_fixed_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = fast()
            .with_tries(5)
            .run(&CancelToken::new(), || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(anyhow!("throttled"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_tries() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = fast()
            .with_tries(3)
            .run(&CancelToken::new(), || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(anyhow!("throttled")) }
            })
            .await;

        match result {
            Err(RetryError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last.to_string(), "throttled");
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_single_try_never_waits() {
        let result: Result<(), _> = RetryConfig::new()
            .with_tries(1)
            .run(&CancelToken::new(), || async { Err(anyhow!("nope")) })
            .await;

        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 1, .. })));
    }

    #[tokio::test]
    async fn test_predicate_rejects_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = fast()
            .with_should_retry(|e| e.to_string().contains("throttled"))
            .run(&CancelToken::new(), || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(anyhow!("access denied")) }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Rejected(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_start_timeout_stops_retrying() {
        let result: Result<(), _> = RetryConfig::new()
            .with_fixed_delay(Duration::from_millis(5))
            .with_start_timeout(Duration::from_millis(30))
            .run(&CancelToken::new(), || async { Err(anyhow!("not ready")) })
            .await;

        match result {
            Err(RetryError::TimedOut(last)) => assert_eq!(last.to_string(), "not ready"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_token_returns_last_error() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = fast()
            .run(&cancel, || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(anyhow!("busy")) }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Cancelled(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_cuts_wait_short() {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let result: Result<(), _> = RetryConfig::new()
            .with_fixed_delay(Duration::from_secs(60))
            .run(&cancel, || async { Err(anyhow!("busy")) })
            .await;

        assert!(matches!(result, Err(RetryError::Cancelled(_))));
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_backoff_drives_delays() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let record = seen.clone();
        let mut backoff = Backoff::new(Duration::from_millis(1), Duration::from_millis(4), 2.0);

        let result: Result<(), _> = RetryConfig::new()
            .with_tries(5)
            .with_retry_delay(move || {
                let delay = backoff.linear();
                record.lock().unwrap().push(delay.as_millis());
                delay
            })
            .run(&CancelToken::new(), || async { Err(anyhow!("throttled")) })
            .await;

        assert!(result.is_err());
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 4, 4]);
    }

    #[test]
    fn test_default_has_no_limits() {
        let config = RetryConfig::default();
        assert_eq!(config.tries, 0);
        assert_eq!(config.start_timeout, Duration::ZERO);
        assert!(config.retry_delay.is_none());
    }
}
