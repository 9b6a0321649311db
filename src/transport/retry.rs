//! Retry policy for connection-level and transient server failures.

use reqwest::Method;
use std::time::Duration;

use super::is_idempotent;

/// Bounded exponential backoff, applied to idempotent requests only.
///
/// POST and PATCH are never repeated automatically: a lost response to a
/// creation request would otherwise create the membership twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one (0 = no retries).
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: crate::config::MAX_RETRIES,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Retries without waiting between attempts.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Whether another attempt is allowed for `method` after `attempt`
    /// attempts have already failed.
    pub fn allows(&self, method: &Method, attempt: u32) -> bool {
        is_idempotent(method) && attempt < self.max_retries
    }

    /// Statuses worth another attempt: throttling and server-side failures,
    /// except `501 Not Implemented` which will never change.
    pub fn is_retryable_status(status: u16) -> bool {
        status == 429 || (status >= 500 && status != 501)
    }

    /// Delay before the retry following `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}
