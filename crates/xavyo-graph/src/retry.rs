//! Retry policy for throttled and transient Graph API responses.
//!
//! Graph answers with `429 Too Many Requests` when a tenant or application
//! exceeds its throttling limits, usually with a `Retry-After` header in
//! seconds. Gateway errors (502, 503, 504) are transient as well. Both are
//! retried with exponential backoff and jitter, bounded by `max_retries`.

use std::time::Duration;

use rand::Rng;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Retry configuration for the base client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum retry attempts per request (0 disables retries).
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Jitter factor as a fraction of delay.
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
            jitter_factor: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy that never retries.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Creates a policy with short delays, for tests against local servers.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 10,
            max_delay_ms: 100,
            jitter_factor: 0.0,
        }
    }

    /// Validates the policy.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_delay_ms == 0 {
            return Err("base_delay_ms must be > 0".to_string());
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err("max_delay_ms must be >= base_delay_ms".to_string());
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err("jitter_factor must be in range [0.0, 1.0]".to_string());
        }
        Ok(())
    }

    /// Returns true if a response with this status may be retried.
    #[must_use]
    pub fn is_retryable(status: StatusCode) -> bool {
        matches!(
            status,
            StatusCode::TOO_MANY_REQUESTS
                | StatusCode::BAD_GATEWAY
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT
        )
    }

    /// Parses a `Retry-After` header value.
    ///
    /// Only the delay-seconds form is supported; HTTP-dates fall back to backoff.
    #[must_use]
    pub fn parse_retry_after(header_value: &str) -> Option<u64> {
        header_value.trim().parse::<u64>().ok()
    }

    /// Calculates the backoff delay for an attempt: `base * 2^attempt`, capped.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }

    /// Returns the delay before retrying `attempt`, preferring the server's `Retry-After`.
    #[must_use]
    pub fn delay_for(&self, retry_after_secs: Option<u64>, attempt: u32) -> Duration {
        let delay = match retry_after_secs {
            Some(secs) => Duration::from_secs(secs).min(Duration::from_millis(self.max_delay_ms)),
            None => self.backoff_delay(attempt),
        };
        self.add_jitter(delay)
    }

    fn add_jitter(&self, delay: Duration) -> Duration {
        if self.jitter_factor <= 0.0 {
            return delay;
        }
        let delay_ms = delay.as_millis() as f64;
        let jitter = rand::thread_rng().gen_range(0.0..=delay_ms * self.jitter_factor);
        Duration::from_millis((delay_ms + jitter) as u64)
    }
}
