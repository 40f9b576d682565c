//! Retry policy for API slots: exponential backoff with jitter, and
//! classification of fetch errors into retryable and permanent failures.
//!
//! Fetch errors are plain strings (`"HTTP 503 Service Unavailable: …"`,
//! `"request failed: …"`), so classification is by substring.

use std::time::Duration;

use crate::config::RetryBackoff;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = one attempt only).
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Spread concurrent retries apart.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_backoff(&RetryBackoff::default(), 0)
    }
}

impl RetryPolicy {
    pub fn from_backoff(backoff: &RetryBackoff, max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(backoff.initial_delay_ms),
            max_delay: Duration::from_millis(backoff.max_delay_ms),
            multiplier: backoff.multiplier.max(1.0),
            jitter: true,
        }
    }

    /// Delay before retry number `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());
        if !self.jitter {
            return Duration::from_secs_f64(capped);
        }
        // Fixed jitter table.
        let factor = [0.75, 0.90, 0.60, 0.85][(attempt % 4) as usize];
        Duration::from_secs_f64(capped * factor)
    }
}

/// How a failed fetch should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Rate limits, 5xx, network and timeout errors.
    Transient,
    /// Client errors that will fail the same way again.
    Permanent,
    Unknown,
}

impl FailureClass {
    pub fn is_retryable(self) -> bool {
        self != FailureClass::Permanent
    }
}

pub fn classify(error: &str) -> FailureClass {
    const PERMANENT: [&str; 5] = ["HTTP 400", "HTTP 401", "HTTP 403", "HTTP 404", "HTTP 422"];
    const TRANSIENT_STATUS: [&str; 5] = ["HTTP 429", "HTTP 500", "HTTP 502", "HTTP 503", "HTTP 504"];
    const TRANSIENT_TEXT: [&str; 6] = [
        "request failed:",
        "connection reset",
        "connection refused",
        "timed out",
        "broken pipe",
        "network",
    ];

    if PERMANENT.iter().any(|p| error.contains(p)) {
        return FailureClass::Permanent;
    }
    if TRANSIENT_STATUS.iter().any(|p| error.contains(p)) {
        return FailureClass::Transient;
    }
    let lower = error.to_lowercase();
    if TRANSIENT_TEXT.iter().any(|p| lower.contains(p)) {
        FailureClass::Transient
    } else {
        FailureClass::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(retries: u32) -> RetryPolicy {
        RetryPolicy {
            jitter: false,
            ..RetryPolicy::from_backoff(&RetryBackoff::default(), retries)
        }
    }

    #[test]
    fn delay_grows_exponentially() {
        let policy = no_jitter(5);
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(800));
    }

    #[test]
    fn delay_is_capped() {
        let policy = no_jitter(20);
        assert_eq!(policy.delay_for_attempt(15), Duration::from_secs(5));
    }

    #[test]
    fn jitter_only_shortens() {
        let jittered = RetryPolicy::from_backoff(&RetryBackoff::default(), 3);
        let plain = no_jitter(3);
        for attempt in 0..4 {
            assert!(jittered.delay_for_attempt(attempt) <= plain.delay_for_attempt(attempt));
        }
    }

    #[test]
    fn classification() {
        assert_eq!(classify("HTTP 503 Service Unavailable: busy"), FailureClass::Transient);
        assert_eq!(classify("request failed: connection reset"), FailureClass::Transient);
        assert_eq!(classify("request timed out after 50ms"), FailureClass::Transient);
        assert_eq!(classify("HTTP 404 Not Found: gone"), FailureClass::Permanent);
        assert_eq!(classify("weird"), FailureClass::Unknown);
        assert!(!FailureClass::Permanent.is_retryable());
        assert!(FailureClass::Unknown.is_retryable());
    }
}
