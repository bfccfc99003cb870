// ── Bounded retry ──
//
// Liveness probes during connect are retried a fixed number of times with
// exponential backoff before the backend is given up on.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Total attempts, including the first one. Never less than 1.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 4,
        }
    }
}

/// Why a retried operation gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    Exhausted { attempts: u32, last: E },
    Cancelled,
}

impl RetryPolicy {
    pub fn new(initial_delay: Duration, max_attempts: u32) -> Self {
        Self {
            initial_delay,
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt.min(16)).unwrap_or(16);
        let base = self.initial_delay.as_secs_f64() * 2.0_f64.powi(exp);
        let capped = base.min(self.max_delay.as_secs_f64());

        // Deterministic spread seeded from the attempt number.
        let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
        Duration::from_secs_f64((capped * jitter_factor).max(0.0))
    }

    /// Run `op` until it succeeds, the attempts run out or `cancel` fires.
    pub async fn run<T, E, F, Fut>(
        &self,
        what: &str,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        E: std::fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(RetryError::Cancelled),
                outcome = op(attempt) => outcome,
            };
            let err = match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(what, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if attempt >= max_attempts {
                warn!(what, attempts = attempt, error = %err, "giving up");
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            let delay = self.backoff(attempt - 1);
            debug!(what, attempt, error = %err, delay_ms = delay.as_millis(), "retrying");
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(RetryError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_increases_exponentially() {
        let policy = RetryPolicy::new(Duration::from_secs(1), 4);
        let d0 = policy.backoff(0);
        let d1 = policy.backoff(1);
        let d2 = policy.backoff(2);
        assert!(d1 > d0);
        assert!(d2 > d1);
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::new(Duration::from_secs(1), 4);
        // 30 s cap plus at most 25 % spread.
        assert!(policy.backoff(20) <= Duration::from_secs_f64(37.5));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        assert_eq!(RetryPolicy::new(Duration::ZERO, 0).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(Duration::from_millis(10), 4);
        let result: Result<(), _> = policy
            .run("probe", &CancellationToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>("refused") }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 4, last: "refused" })));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn returns_value_after_transient_failures() {
        let policy = RetryPolicy::new(Duration::from_millis(10), 4);
        let result = policy
            .run("probe", &CancellationToken::new(), |attempt| async move {
                if attempt < 3 { Err("refused") } else { Ok(attempt) }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn cancellation_wins() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let policy = RetryPolicy::default();
        let result: Result<(), RetryError<&str>> =
            policy.run("probe", &cancel, |_| async { Err("refused") }).await;
        assert!(matches!(result, Err(RetryError::Cancelled)));
    }
}
