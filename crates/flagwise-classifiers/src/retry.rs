//! Retry policy for remote providers
//!
//! Transient failures are retried with exponential backoff
//! (`base * 2^attempt`); everything else propagates on the first failure.

use flagwise_core::Error;
use std::io::ErrorKind;
use std::time::Duration;

/// Message fragments that mark a failure as rate-limit, timeout or 5xx-class
pub const TRANSIENT_SIGNALS: &[&str] = &[
    "temporary error",
    "rate limit",
    "timeout",
    "timed out",
    "network",
    "fetch",
    "429",
    "500",
    "502",
    "503",
    "504",
];

/// Signature of a function deciding whether an error is worth retrying
pub type TransientRecognizer = fn(&Error) -> bool;

/// Retry budget for one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = `max_retries + 1`)
    pub max_retries: u32,

    /// Delay before the first retry; doubles for each further retry
    pub backoff_base: Duration,
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new(max_retries: u32, backoff_base: Duration) -> Self {
        Self {
            max_retries,
            backoff_base,
        }
    }

    /// Policy that never retries
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Total number of requests the policy allows
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait after failed attempt number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        backoff_delay(self.backoff_base, attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_millis(1000))
    }
}

/// `base * 2^attempt`, saturating instead of overflowing
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Whether a message carries a rate-limit, timeout or 5xx-class signal
pub fn is_transient_signal(message: &str) -> bool {
    let lowered = message.to_lowercase();
    TRANSIENT_SIGNALS.iter().any(|s| lowered.contains(s))
}

/// Default recognizer for retryable provider errors
pub fn is_transient(error: &Error) -> bool {
    match error {
        Error::Transient(_) | Error::Timeout => true,
        Error::Io(e) => matches!(
            e.kind(),
            ErrorKind::TimedOut
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionRefused
                | ErrorKind::ConnectionAborted
                | ErrorKind::Interrupted
        ),
        Error::Internal(msg) => is_transient_signal(msg),
        Error::Configuration(_)
        | Error::Protocol(_)
        | Error::Permanent(_)
        | Error::Serialization(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let base = Duration::from_millis(1000);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(1000));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(2000));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(4000));
    }

    #[test]
    fn test_backoff_saturates() {
        let delay = backoff_delay(Duration::from_secs(1), 200);
        assert_eq!(delay, Duration::from_secs(u32::MAX as u64));
        assert_eq!(backoff_delay(Duration::MAX, 1), Duration::MAX);
    }

    #[test]
    fn test_policy_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10));
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.delay_for(2), Duration::from_millis(40));
        assert_eq!(RetryPolicy::none().max_attempts(), 1);
    }

    #[test]
    fn test_transient_classification() {
        assert!(is_transient(&Error::transient("Temporary error: 503")));
        assert!(is_transient(&Error::Timeout));
        assert!(is_transient(&Error::internal("Rate limit exceeded")));
        assert!(is_transient(&Error::Io(std::io::Error::from(
            ErrorKind::ConnectionReset
        ))));

        assert!(!is_transient(&Error::config("key not configured")));
        assert!(!is_transient(&Error::protocol("request timeout in body")));
        assert!(!is_transient(&Error::permanent("API Error: 401")));
        assert!(!is_transient(&Error::internal("unexpected state")));
    }

    #[test]
    fn test_transient_signals() {
        assert!(is_transient_signal("HTTP 502 Bad Gateway"));
        assert!(is_transient_signal("Network unreachable"));
        assert!(!is_transient_signal("invalid api key"));
    }
}
