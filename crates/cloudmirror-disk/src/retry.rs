//! Retry policy for transient API failures
//!
//! Exponential backoff starting at `base_delay` and doubling per attempt,
//! capped at `max_delay`. A 429 with a parseable `Retry-After` header waits
//! for the server-requested duration instead.

use std::time::Duration;

use cloudmirror_core::config::RemoteConfig;
use tracing::warn;

use crate::DiskError;

/// Fallback wait when a `Retry-After` header cannot be parsed
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Upper bound on any single backoff delay
const MAX_DELAY: Duration = Duration::from_secs(60);

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Cap applied to every delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: MAX_DELAY,
        }
    }

    /// Policy that never retries
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn from_config(config: &RemoteConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.retry_base_delay_ms),
        )
    }

    /// Backoff before retry number `attempt + 1` (1s, 2s, 4s, ... by default)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay to wait after `err` on attempt `attempt`
    pub fn delay_for(&self, attempt: u32, err: &DiskError) -> Duration {
        err.retry_after()
            .map(|d| d.min(self.max_delay))
            .unwrap_or_else(|| self.backoff(attempt))
    }
}

/// Parses a `Retry-After` header value into a Duration
///
/// Supports integer seconds and HTTP-dates (RFC 2822). Dates more than an
/// hour out, or in the past, fall back to `default`.
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Duration::from_secs(seconds);
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
        let remaining = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
        if let Some(secs) = u64::try_from(remaining.num_seconds())
            .ok()
            .filter(|&s| s > 0 && s <= 3600)
        {
            return Duration::from_secs(secs);
        }
    }

    warn!(value, "Could not parse Retry-After header, using default");
    default
}
