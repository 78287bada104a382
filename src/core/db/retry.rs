/// Retry Module
///
/// Fixed-bound, fixed-delay retry used when probing the backing store at
/// startup. Queries themselves are never retried.

use std::fmt::Display;
use std::time::Duration;
use tracing::{error, info};

/// Number of probe attempts before giving up.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 5;

/// Pause between two probe attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Bounded retry with a constant pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub attempts: u32,
    /// Sleep between consecutive attempts (never after the last one)
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Outcome of an exhausted retry loop: the last error and how many attempts ran.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

impl RetryPolicy {
    /// Creates a policy; zero attempts is clamped to one.
    pub fn new(attempts: u32, delay: Duration) -> Self {
        RetryPolicy {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Runs `op` until it succeeds or the attempts are used up, sleeping on
    /// the current thread between attempts.
    pub fn run<T, E, F>(&self, what: &str, op: F) -> std::result::Result<T, RetryExhausted<E>>
    where
        E: Display,
        F: FnMut(u32) -> std::result::Result<T, E>,
    {
        self.run_with_sleep(what, std::thread::sleep, op)
    }

    /// Same as [`RetryPolicy::run`] with an injectable sleep function.
    ///
    /// `op` receives the 1-based attempt number.
    pub fn run_with_sleep<T, E, F, S>(
        &self,
        what: &str,
        mut sleep: S,
        mut op: F,
    ) -> std::result::Result<T, RetryExhausted<E>>
    where
        E: Display,
        F: FnMut(u32) -> std::result::Result<T, E>,
        S: FnMut(Duration),
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => {
                    info!(target: "flightdeck::retry", attempt, "{} succeeded", what);
                    return Ok(value);
                }
                Err(err) => {
                    error!(
                        target: "flightdeck::retry",
                        attempt,
                        max_attempts = attempts,
                        error = %err,
                        "{} failed",
                        what
                    );
                    if attempt >= attempts {
                        error!(
                            target: "flightdeck::retry",
                            fatal = true,
                            attempts,
                            "{} failed after {} attempt(s), giving up",
                            what,
                            attempts
                        );
                        return Err(RetryExhausted {
                            attempts,
                            last_error: err,
                        });
                    }
                    sleep(self.delay);
                    attempt += 1;
                }
            }
        }
    }
}
