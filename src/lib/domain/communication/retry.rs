//! Retry policy and backoff

use std::{collections::HashMap, time::Duration};

use crate::domain::communication::{
    classifier::{classify, Classification, ErrorCategory},
    mailer::ProviderError,
};

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    /// How the failure was classified
    pub classification: Classification,

    /// Whether to try the same provider again
    pub retry: bool,

    /// How long to wait before that attempt
    pub delay: Duration,
}

/// Retry ceiling, backoff curve and per-category overrides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed per provider (or per queue item)
    pub max_retries: u32,

    /// Delay before the second attempt
    pub base_delay: Duration,

    /// Upper bound for any delay
    pub max_delay: Duration,

    /// Caller overrides of the retryable flag
    pub overrides: HashMap<ErrorCategory, bool>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            overrides: HashMap::new(),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy without overrides
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            overrides: HashMap::new(),
        }
    }

    /// Forces a category to be retried (or not)
    pub fn with_override(mut self, category: ErrorCategory, retryable: bool) -> Self {
        self.overrides.insert(category, retryable);
        self
    }

    /// `base * 2^(attempt - 1)`, capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;

        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Classifies `error` and decides whether attempt `attempt + 1` should happen.
    pub fn decide(&self, error: &ProviderError, provider: &str, attempt: u32) -> RetryDecision {
        let mut classification = classify(error, provider);

        if let Some(retryable) = self.overrides.get(&classification.category) {
            classification.retryable = *retryable;
        }

        let retry = classification.retryable && attempt < self.max_retries;

        RetryDecision {
            classification,
            retry,
            delay: if retry {
                self.backoff(attempt)
            } else {
                Duration::ZERO
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_until_capped() {
        let policy = RetryPolicy::new(10, Duration::from_millis(100), Duration::from_millis(1000));

        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(800));
        assert_eq!(policy.backoff(5), Duration::from_millis(1000));
        assert_eq!(policy.backoff(64), Duration::from_millis(1000));
    }

    #[test]
    fn test_backoff_is_monotonic() {
        let policy = RetryPolicy::default();

        let delays: Vec<_> = (0..100).map(|attempt| policy.backoff(attempt)).collect();

        assert!(delays.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(delays.iter().all(|delay| *delay <= policy.max_delay));
    }

    #[test]
    fn test_decide_stops_at_ceiling() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10), Duration::from_secs(1));
        let err = ProviderError::response("sendgrid", Some(503), None, "unavailable");

        let first = policy.decide(&err, "sendgrid", 1);
        assert!(first.retry);
        assert_eq!(first.delay, Duration::from_millis(10));

        let last = policy.decide(&err, "sendgrid", 3);
        assert!(!last.retry);
        assert_eq!(last.delay, Duration::ZERO);
    }

    #[test]
    fn test_decide_never_retries_validation() {
        let policy = RetryPolicy::default();
        let err = ProviderError::response("sendgrid", Some(400), None, "bad request");

        let decision = policy.decide(&err, "sendgrid", 1);

        assert!(!decision.retry);
        assert_eq!(decision.classification.category, ErrorCategory::Validation);
    }

    #[test]
    fn test_override_makes_category_retryable() {
        let policy = RetryPolicy::default().with_override(ErrorCategory::Unknown, true);
        let err = ProviderError::response("mailgun", None, None, "???");

        let decision = policy.decide(&err, "mailgun", 1);

        assert!(decision.retry);
        assert!(decision.classification.retryable);
    }
}
