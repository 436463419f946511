use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Fixed-interval retry policy. The signup linking steps share one instance
/// instead of carrying their own hand-rolled loops.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        RetryPolicy {
            max_attempts,
            delay,
        }
    }

    /// Policy applied to identity creation and mapping persistence during
    /// signup: 3 attempts total, 1 second apart.
    pub const fn signup() -> Self {
        RetryPolicy::new(3, Duration::from_secs(1))
    }

    /// Runs `op` until it succeeds or attempts are exhausted. Every error is
    /// treated as retryable.
    pub async fn run<T, E, F, Fut>(&self, what: &str, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.run_if(what, |_| true, op).await
    }

    /// Like [`run`](Self::run), but gives up early on errors the predicate
    /// rejects.
    pub async fn run_if<T, E, F, Fut, P>(&self, what: &str, retryable: P, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && retryable(&e) => {
                    warn!(
                        "{} attempt {}/{} failed: {}",
                        what, attempt, self.max_attempts, e
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn succeeds_without_retrying() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, String> = fast(3)
            .run("op", || {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Ok(n) }
            })
            .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, String> = fast(3)
            .run("op", || {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(format!("boom {}", n))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), String> = fast(3)
            .run("op", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err("boom".to_string()) }
            })
            .await;

        assert_eq!(result.unwrap_err(), "boom");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_immediately_on_non_retryable_error() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), String> = fast(3)
            .run_if(
                "op",
                |e: &String| !e.contains("fatal"),
                || {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    async { Err("fatal: bad request".to_string()) }
                },
            )
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn signup_policy_is_three_attempts_one_second_apart() {
        let policy = RetryPolicy::signup();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(1));
    }
}
