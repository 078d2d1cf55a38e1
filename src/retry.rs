//! Bounded retry with exponential backoff.
//!
//! Replaces an unbounded connect loop: every wake cycle must reach SLEEP,
//! so the gateway gets at most `max_attempts` tries and at most
//! `max_backoff_total_ms` of accumulated backoff.  Time spent inside an
//! attempt is not counted; each attempt bounds its own duration (the
//! gateway's connect timeout).
//!
//! ```text
//!   attempt 1 ─ fail ─ wait b₀ ─ attempt 2 ─ fail ─ wait 2·b₀ ─ ...
//!                                        (each wait capped at max_backoff)
//! ```
//!
//! Backoff waits go through an injected `DelayNs`, so tests run instantly.

use embedded_hal::delay::DelayNs;
use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u8,
    /// Wait after the first failure (milliseconds).
    pub initial_backoff_ms: u32,
    /// Cap on any single wait (milliseconds).
    pub max_backoff_ms: u32,
    /// Cap on the sum of backoff waits between attempts (milliseconds).
    /// Not a wall-clock cap: time inside attempts is excluded.
    pub max_backoff_total_ms: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 500,
            max_backoff_ms: 4000,
            max_backoff_total_ms: 15_000,
        }
    }
}

/// Result of a retried operation plus how much it cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempted<R> {
    pub result: R,
    /// Attempts actually made (≥ 1).
    pub attempts: u8,
    /// Milliseconds spent in backoff waits.
    pub waited_ms: u32,
}

impl RetryPolicy {
    /// Wait that follows failed attempt number `attempt` (1-based).
    pub fn backoff_ms(&self, attempt: u8) -> u32 {
        let shift = u32::from(attempt.saturating_sub(1)).min(31);
        self.initial_backoff_ms
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff_ms)
    }

    /// Run `op` until it succeeds or the budget is spent.
    ///
    /// `op` receives `target` and the 1-based attempt number.  Between
    /// attempts `target` is used as the delay source.  No wait follows the
    /// final attempt.
    pub fn run<T, R, E, F>(&self, target: &mut T, mut op: F) -> Attempted<Result<R, E>>
    where
        T: DelayNs,
        F: FnMut(&mut T, u8) -> Result<R, E>,
    {
        let max = self.max_attempts.max(1);
        let mut waited_ms: u32 = 0;
        let mut attempt: u8 = 1;
        loop {
            let result = op(target, attempt);
            if result.is_ok() || attempt >= max {
                return Attempted {
                    result,
                    attempts: attempt,
                    waited_ms,
                };
            }
            let wait = self.backoff_ms(attempt);
            if waited_ms.saturating_add(wait) > self.max_backoff_total_ms {
                warn!(
                    "RETRY: backoff total {} ms spent after {} attempts",
                    self.max_backoff_total_ms, attempt
                );
                return Attempted {
                    result,
                    attempts: attempt,
                    waited_ms,
                };
            }
            warn!("RETRY: attempt {}/{} failed, waiting {} ms", attempt, max, wait);
            target.delay_ms(wait);
            waited_ms += wait;
            attempt += 1;
        }
    }
}
