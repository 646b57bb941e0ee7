//! Explicit retry policy for operations that can hit transient contention
//!
//! A `RetryPolicy` is a plain value applied at the call site, e.g. around a
//! package removal that may find the package database locked.

use std::time::Duration;
use tracing::warn;

/// Delay schedule between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed(Duration),
    /// `base * factor^(retry - 1)`, capped at `max`
    Exponential {
        base: Duration,
        factor: u32,
        max: Duration,
    },
}

/// Maximum attempts plus a backoff schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Fixed(Duration::from_secs(2)),
        }
    }
}

impl RetryPolicy {
    /// Run once, never retry
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::Fixed(Duration::ZERO),
        }
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(delay),
        }
    }

    pub fn exponential(max_attempts: u32, base: Duration, max: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Exponential {
                base,
                factor: 2,
                max,
            },
        }
    }

    /// Delay to wait before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base, factor, max } => {
                let exp = retry.saturating_sub(1).min(16);
                base.saturating_mul(factor.saturating_pow(exp)).min(max)
            }
        }
    }

    /// Run `op` until it succeeds, returns a non-retryable error, or attempts run out.
    ///
    /// The last error is returned when every attempt failed.
    pub fn run<T, E, F, R>(&self, mut op: F, is_retryable: R) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        R: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts && is_retryable(&e) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "Attempt {}/{} failed ({}), retrying in {:?}",
                        attempt, attempts, e, delay
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_exponential_delays_are_capped() {
        let policy =
            RetryPolicy::exponential(5, Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(350));
    }

    #[test]
    fn test_retries_until_success() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::fixed(3, Duration::ZERO);
        let result: Result<u32, String> = policy.run(
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err("locked".to_string())
                } else {
                    Ok(7)
                }
            },
            |e| e == "locked",
        );
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_non_retryable_error_stops_immediately() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::fixed(5, Duration::ZERO);
        let result: Result<(), String> = policy.run(
            || {
                calls.set(calls.get() + 1);
                Err("broken".to_string())
            },
            |e| e == "locked",
        );
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let result: Result<(), String> = RetryPolicy::fixed(2, Duration::ZERO).run(
            || {
                calls.set(calls.get() + 1);
                Err("locked".to_string())
            },
            |_| true,
        );
        assert_eq!(result.unwrap_err(), "locked");
        assert_eq!(calls.get(), 2);
    }
}
