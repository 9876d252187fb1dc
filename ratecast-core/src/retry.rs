//! Bounded retry with linear-triangular backoff and uniform jitter.
//!
//! Wraps any fallible operation, primarily network calls. The policy
//! does not distinguish error kinds — every failure triggers another
//! attempt until the budget runs out.

use std::fmt::Display;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Retry policy applied explicitly at each network call site.
///
/// Delay before attempt `n+1` is `base + n*(n+1)/2` seconds, capped at
/// `max_delay_secs`, plus a uniform random jitter in `[0.1, 0.5)` when
/// `jitter` is on. The policy sleeps between attempts only; exhaustion
/// fails immediately with [`Error::RetriesExhausted`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_secs: f64,
    pub jitter: bool,
    pub max_delay_secs: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 2.0,
            jitter: true,
            max_delay_secs: 60.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps, for tests and offline use.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_secs: 0.0,
            jitter: false,
            max_delay_secs: 0.0,
        }
    }

    /// Backoff (without jitter) before retrying after failed attempt `attempt`.
    fn backoff_secs(&self, attempt: u32) -> f64 {
        let triangular = (attempt * (attempt + 1) / 2) as f64;
        (self.base_delay_secs + triangular).min(self.max_delay_secs)
    }

    /// Run `op` until it succeeds or the attempt budget is exhausted.
    ///
    /// `operation` names the wrapped call in the exhaustion error.
    pub fn run<T, E, F>(&self, operation: &str, mut op: F) -> Result<T>
    where
        E: Display,
        F: FnMut() -> std::result::Result<T, E>,
    {
        for attempt in 0..self.max_attempts {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let last = attempt + 1 == self.max_attempts;
                    if last {
                        eprintln!("'{operation}' attempt {}/{} failed: {e}", attempt + 1, self.max_attempts);
                        break;
                    }
                    let mut delay = self.backoff_secs(attempt);
                    if self.jitter {
                        delay += rand::thread_rng().gen_range(0.1..0.5);
                    }
                    eprintln!(
                        "'{operation}' attempt {}/{} failed: {e}; retrying in {delay:.2}s",
                        attempt + 1,
                        self.max_attempts
                    );
                    std::thread::sleep(Duration::from_secs_f64(delay));
                }
            }
        }

        Err(Error::RetriesExhausted {
            operation: operation.to_string(),
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn returns_first_success() {
        let policy = RetryPolicy::immediate(5);
        let calls = Cell::new(0u32);
        let out: Result<i32> = policy.run("op", || {
            calls.set(calls.get() + 1);
            Ok::<_, String>(7)
        });
        assert_eq!(out.unwrap(), 7);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn retries_until_success() {
        let policy = RetryPolicy::immediate(5);
        let calls = Cell::new(0u32);
        let out: Result<i32> = policy.run("op", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err("transient".to_string())
            } else {
                Ok(42)
            }
        });
        assert_eq!(out.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn exhaustion_names_the_operation() {
        let policy = RetryPolicy::immediate(3);
        let out: Result<()> = policy.run("history", || Err::<(), _>("boom".to_string()));
        match out {
            Err(Error::RetriesExhausted { operation, attempts }) => {
                assert_eq!(operation, "history");
                assert_eq!(attempts, 3);
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[test]
    fn backoff_is_triangular_and_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay_secs: 2.0,
            jitter: false,
            max_delay_secs: 6.0,
        };
        assert_eq!(policy.backoff_secs(0), 2.0);
        assert_eq!(policy.backoff_secs(1), 3.0);
        assert_eq!(policy.backoff_secs(2), 5.0);
        // 2 + 6 = 8 hits the cap
        assert_eq!(policy.backoff_secs(3), 6.0);
    }

    #[test]
    fn deserializes_from_toml_with_defaults() {
        let policy: RetryPolicy = toml::from_str("max_attempts = 2").unwrap();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.base_delay_secs, 2.0);
        assert!(policy.jitter);
    }
}
