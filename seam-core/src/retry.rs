//! Retry and timing policies for Seam drivers.
//!
//! Pure duration math, so backoff sequences are testable without a clock.
//! seam-client owns the actual sleeping.

use std::time::Duration;

/// Interval between popup-closed watchdog checks.
pub const WATCHDOG_INTERVAL: Duration = Duration::from_millis(500);

/// How long a finished subscription stays visible before its registry
/// entry is removed.
pub const GRACE_REMOVAL_DELAY: Duration = Duration::from_millis(2000);

/// How long the authorization callback page stays open after posting its
/// completion message.
pub const CALLBACK_AUTO_CLOSE_DELAY: Duration = Duration::from_millis(1500);

/// Exponential backoff policy for stream reconnects.
///
/// The delay before attempt `n` (1-based) is `min(base * 2^(n-1), cap)`:
/// 1s, 2s, 4s, 8s, 16s with the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt.
    pub base: Duration,
    /// Upper bound on any single delay.
    pub cap: Duration,
    /// Attempts allowed before the error becomes fatal.
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Delay before the given reconnect attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        let base_ms = self.base.as_millis() as u64;
        Duration::from_millis(base_ms.saturating_mul(factor)).min(self.cap)
    }

    /// Check whether the given attempt (1-based) is within budget.
    pub fn allows(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(1000),
            cap: Duration::from_millis(16_000),
            max_attempts: 5,
        }
    }
}

/// Fixed-delay retry schedule for the active-job lookup.
///
/// Absorbs the race where a freshly authorized connection has no
/// persisted job yet: one immediate attempt, then one retry per delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLookupPolicy {
    /// Delay before each retry, in order; the length bounds the retry
    /// count.
    pub delays: Vec<Duration>,
}

impl JobLookupPolicy {
    /// Total number of lookup calls (initial attempt plus retries).
    pub fn total_attempts(&self) -> usize {
        self.delays.len() + 1
    }
}

impl Default for JobLookupPolicy {
    fn default() -> Self {
        Self {
            delays: vec![
                Duration::from_millis(500),
                Duration::from_millis(1000),
                Duration::from_millis(2000),
            ],
        }
    }
}
