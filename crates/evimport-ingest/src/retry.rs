//! Bounded retry of a single unit of work
//!
//! [`RetryRunner`] re-invokes an async action until it succeeds or its
//! attempt budget runs out. Pacing between attempts is entirely up to the
//! failure hook; the runner itself never sleeps or grows a backoff.
//!
//! When the budget is exhausted the runner logs a terminal message and
//! returns `None`. It does not return the last error: callers that need to
//! treat exhaustion as a failure must do so themselves.

use futures::future::{BoxFuture, FutureExt};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

type FailureHook<'a> = Box<dyn FnMut() -> BoxFuture<'a, ()> + Send + 'a>;

/// Runs an action with a fixed attempt budget
pub struct RetryRunner<'a> {
    label: String,
    max_attempts: u32,
    on_failure: Option<FailureHook<'a>>,
}

impl<'a> RetryRunner<'a> {
    /// Create a runner; a budget of zero is treated as one attempt
    pub fn new(label: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            label: label.into(),
            max_attempts: max_attempts.max(1),
            on_failure: None,
        }
    }

    /// Hook awaited after every failed attempt that will be retried
    pub fn on_failure<F, Fut>(mut self, mut hook: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'a,
        Fut: Future<Output = ()> + Send + 'a,
    {
        self.on_failure = Some(Box::new(move || hook().boxed()));
        self
    }

    /// Sleep for `delay` between attempts
    pub fn with_fixed_delay(self, delay: Duration) -> Self {
        self.on_failure(move || tokio::time::sleep(delay))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `action` until it succeeds or the budget is spent
    pub async fn run<T, E, F, Fut>(mut self, mut action: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempts_left = self.max_attempts;

        loop {
            match action().await {
                Ok(value) => return Some(value),
                Err(e) => {
                    attempts_left -= 1;

                    if attempts_left == 0 {
                        error!(
                            label = %self.label,
                            attempts = self.max_attempts,
                            error = %e,
                            "Giving up, retry budget exhausted"
                        );
                        return None;
                    }

                    if let Some(hook) = self.on_failure.as_mut() {
                        hook().await;
                    }

                    warn!(
                        label = %self.label,
                        attempts_left,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                },
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Action that fails `failures` times, then returns the attempt number
    fn flaky(
        failures: u32,
        calls: Arc<AtomicU32>,
    ) -> impl FnMut() -> futures::future::Ready<Result<u32, String>> {
        move || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= failures {
                futures::future::ready(Err(format!("attempt {} failed", attempt)))
            } else {
                futures::future::ready(Ok(attempt))
            }
        }
    }

    fn counting_hook(hooks: Arc<AtomicU32>) -> impl FnMut() -> futures::future::Ready<()> + Send {
        move || {
            hooks.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(())
        }
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let hooks = Arc::new(AtomicU32::new(0));

        let result = RetryRunner::new("row 1", 10)
            .on_failure(counting_hook(hooks.clone()))
            .run(flaky(0, calls.clone()))
            .await;

        assert_eq!(result, Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(hooks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_recovers_after_k_failures() {
        for k in 1..5 {
            let calls = Arc::new(AtomicU32::new(0));
            let hooks = Arc::new(AtomicU32::new(0));

            let result = RetryRunner::new("row 10", 5)
                .on_failure(counting_hook(hooks.clone()))
                .run(flaky(k, calls.clone()))
                .await;

            assert_eq!(result, Some(k + 1));
            assert_eq!(calls.load(Ordering::SeqCst), k + 1);
            assert_eq!(hooks.load(Ordering::SeqCst), k);
        }
    }

    #[tokio::test]
    async fn test_exhausted_budget_returns_none_without_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let hooks = Arc::new(AtomicU32::new(0));

        let result = RetryRunner::new("row 20", 4)
            .on_failure(counting_hook(hooks.clone()))
            .run(flaky(u32::MAX, calls.clone()))
            .await;

        // Exhaustion is reported as "no value", never as an error.
        assert_eq!(result, None);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(hooks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_single_attempt_never_calls_hook() {
        let calls = Arc::new(AtomicU32::new(0));
        let hooks = Arc::new(AtomicU32::new(0));

        let result = RetryRunner::new("row 30", 1)
            .on_failure(counting_hook(hooks.clone()))
            .run(flaky(u32::MAX, calls.clone()))
            .await;

        assert_eq!(result, None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(hooks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_budget_still_runs_once() {
        let runner = RetryRunner::new("row 0", 0);
        assert_eq!(runner.max_attempts(), 1);

        let calls = Arc::new(AtomicU32::new(0));
        assert_eq!(runner.run(flaky(0, calls.clone())).await, Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_works_without_hook() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = RetryRunner::new("row 40", 3)
            .run(flaky(2, calls.clone()))
            .await;
        assert_eq!(result, Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_paces_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = tokio::time::Instant::now();

        let result = RetryRunner::new("row 50", 3)
            .with_fixed_delay(Duration::from_secs(10))
            .run(flaky(2, calls.clone()))
            .await;

        assert_eq!(result, Some(3));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(20), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(21), "elapsed {:?}", elapsed);
    }
}
