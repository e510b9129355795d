//! Pure retry/backoff state machine for the dashboard's polling loop.
//!
//! The machine is driven entirely by explicit transitions so it can be
//! tested without a clock or any rendering machinery. Delays grow
//! exponentially from `base_delay` and are capped at `max_delay`; after
//! `max_attempts` consecutive failures the machine parks in `Exhausted`
//! until something succeeds again (e.g. a user-triggered refresh).

use std::time::Duration;

/// Backoff parameters. Explicitly constructed and passed in; there is no
/// ambient global policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-indexed): `base * 2^(n-1)`,
    /// capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let delay = self.base_delay.saturating_mul(2u32.saturating_pow(exp));
        delay.min(self.max_delay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// No failure observed yet.
    Idle,
    /// `attempt` consecutive failures so far, next retry pending.
    Retrying { attempt: u32 },
    /// The last operation succeeded.
    Succeeded,
    /// `max_attempts` consecutive failures; no further automatic retries.
    Exhausted,
}

impl RetryState {
    pub fn on_failure(self, policy: &RetryPolicy) -> Self {
        match self {
            RetryState::Idle | RetryState::Succeeded => RetryState::Retrying { attempt: 1 },
            RetryState::Retrying { attempt } if attempt >= policy.max_attempts => {
                RetryState::Exhausted
            }
            RetryState::Retrying { attempt } => RetryState::Retrying {
                attempt: attempt + 1,
            },
            RetryState::Exhausted => RetryState::Exhausted,
        }
    }

    /// A success from any state, including `Exhausted` via a manual retry.
    pub fn on_success(self) -> Self {
        RetryState::Succeeded
    }

    /// Delay to wait before the next automatic retry, if one is due.
    pub fn next_delay(&self, policy: &RetryPolicy) -> Option<Duration> {
        match self {
            RetryState::Retrying { attempt } => Some(policy.delay_for(*attempt)),
            _ => None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryState::Exhausted)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
