//! Retry state machine for one adapter call.
//!
//! `Attempt(n)` -> `Backoff` -> `Attempt(n + 1)`, ending in `Succeeded` or
//! `Failed`. The machine only decides; the scheduler does the waiting and
//! the fetching, so timing and jitter can be tested without a network.

use rand::Rng;
use std::time::Duration;

use crate::config::FetchSettings;

/// Upper bound on a single backoff wait.
const MAX_BACKOFF: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Multiplier applied per failed attempt.
    pub backoff_base: f64,
    /// Random extra delay in `[0, max_jitter]`.
    pub max_jitter: Duration,
}

impl RetryPolicy {
    pub fn from_settings(s: &FetchSettings) -> Self {
        Self {
            max_retries: s.max_retries,
            base_delay: s.base_delay,
            backoff_base: s.backoff_base,
            max_jitter: s.max_jitter,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Deterministic wait after attempt `failed_attempt` (1-based) fails:
    /// `base_delay * backoff_base^(failed_attempt - 1)`.
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        let exp = failed_attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.backoff_base.powi(exp);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(MAX_BACKOFF)
            .min(MAX_BACKOFF)
    }

    /// Backoff plus uniform jitter.
    pub fn delay<R: Rng + ?Sized>(&self, failed_attempt: u32, rng: &mut R) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rng.gen_range(0..=jitter_ms))
        };
        self.backoff(failed_attempt) + jitter
    }
}

/// Result of one network attempt, as the machine sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    /// Retry-eligible failure (unreachable, rate limited, timeout).
    Transient,
    /// Failure that retrying the same request will not fix.
    Permanent,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryState {
    /// Attempt `n` (1-based) should run now.
    Attempt(u32),
    /// Attempt `attempt` failed; wait `delay` before the next one.
    Backoff { attempt: u32, delay: Duration },
    Succeeded { attempts: u32 },
    Failed { attempts: u32 },
}

impl RetryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RetryState::Succeeded { .. } | RetryState::Failed { .. })
    }
}

pub struct RetryMachine<R> {
    policy: RetryPolicy,
    state: RetryState,
    rng: R,
}

impl<R: Rng> RetryMachine<R> {
    pub fn new(policy: RetryPolicy, rng: R) -> Self {
        Self {
            policy,
            state: RetryState::Attempt(1),
            rng,
        }
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Feed the outcome of the current attempt. Ignored unless the machine
    /// is in `Attempt`.
    pub fn record(&mut self, outcome: AttemptOutcome) -> RetryState {
        let RetryState::Attempt(n) = self.state else {
            return self.state;
        };
        self.state = match outcome {
            AttemptOutcome::Succeeded => RetryState::Succeeded { attempts: n },
            AttemptOutcome::Permanent => RetryState::Failed { attempts: n },
            AttemptOutcome::Transient if n >= self.policy.max_attempts() => {
                RetryState::Failed { attempts: n }
            }
            AttemptOutcome::Transient => RetryState::Backoff {
                attempt: n,
                delay: self.policy.delay(n, &mut self.rng),
            },
        };
        self.state
    }

    /// Leave `Backoff` once the delay has elapsed.
    pub fn resume(&mut self) -> RetryState {
        if let RetryState::Backoff { attempt, .. } = self.state {
            self.state = RetryState::Attempt(attempt + 1);
        }
        self.state
    }
}
