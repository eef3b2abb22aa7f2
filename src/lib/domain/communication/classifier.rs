//! Provider error classification
//!
//! Maps a [`ProviderError`] from any adapter onto one [`Classification`].
//! Retry decisions are taken from the classification by
//! [`RetryPolicy`](super::retry::RetryPolicy), never from the raw error.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::communication::mailer::{ProviderError, ProviderErrorKind};

/// Failure category shared by every provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// The message or one of its fields was rejected
    Validation,

    /// Credentials are missing, wrong or lack permission
    Authentication,

    /// The provider is throttling us
    RateLimit,

    /// The message exceeds the provider's size limit
    MessageTooLarge,

    /// 5xx, connection failure or timeout
    TemporaryFailure,

    /// The provider will never accept this message
    PermanentFailure,

    /// Anything we could not place
    Unknown,
}

impl ErrorCategory {
    /// Whether this category is retried unless a policy says otherwise
    pub fn default_retryable(&self) -> bool {
        matches!(self, Self::RateLimit | Self::TemporaryFailure)
    }

    /// Alerting level for this category
    pub fn severity(&self) -> Severity {
        match self {
            Self::Authentication => Severity::Critical,
            Self::PermanentFailure | Self::MessageTooLarge | Self::Unknown => Severity::Error,
            Self::RateLimit | Self::TemporaryFailure => Severity::Warning,
            Self::Validation => Severity::Info,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "VALIDATION",
            Self::Authentication => "AUTHENTICATION",
            Self::RateLimit => "RATE_LIMIT",
            Self::MessageTooLarge => "MESSAGE_TOO_LARGE",
            Self::TemporaryFailure => "TEMPORARY_FAILURE",
            Self::PermanentFailure => "PERMANENT_FAILURE",
            Self::Unknown => "UNKNOWN",
        };

        write!(f, "{name}")
    }
}

/// Alerting level; does not influence retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational
    Info,

    /// Worth a look
    Warning,

    /// Needs attention
    Error,

    /// Page someone
    Critical,
}

/// Outcome of classifying a provider error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Failure category
    pub category: ErrorCategory,

    /// Whether another attempt may succeed
    pub retryable: bool,

    /// Alerting level
    pub severity: Severity,
}

impl From<ErrorCategory> for Classification {
    fn from(category: ErrorCategory) -> Self {
        Self {
            category,
            retryable: category.default_retryable(),
            severity: category.severity(),
        }
    }
}

/// Classifies a provider error.
///
/// Timeouts and connection failures are always temporary. Otherwise the
/// status is read as an SMTP reply code for the `smtp` provider and as an
/// HTTP status for everything else, and vendor codes or messages refine
/// whatever the status could not place.
pub fn classify(error: &ProviderError, provider: &str) -> Classification {
    let category = match error.kind {
        ProviderErrorKind::Timeout | ProviderErrorKind::Connection => {
            ErrorCategory::TemporaryFailure
        }
        ProviderErrorKind::Configuration => ErrorCategory::Authentication,
        ProviderErrorKind::Payload => ErrorCategory::Validation,
        ProviderErrorKind::Response => {
            let by_status = match error.status {
                Some(code) if provider == "smtp" => smtp_category(code),
                Some(status) => http_category(status),
                None => ErrorCategory::Unknown,
            };

            if by_status == ErrorCategory::Unknown {
                keyword_category(error)
            } else {
                by_status
            }
        }
    };

    category.into()
}

fn http_category(status: u16) -> ErrorCategory {
    match status {
        400 | 422 => ErrorCategory::Validation,
        401 | 403 => ErrorCategory::Authentication,
        413 => ErrorCategory::MessageTooLarge,
        429 => ErrorCategory::RateLimit,
        408 | 500..=599 => ErrorCategory::TemporaryFailure,
        402 | 404..=499 => ErrorCategory::PermanentFailure,
        _ => ErrorCategory::Unknown,
    }
}

fn smtp_category(code: u16) -> ErrorCategory {
    match code {
        421 | 450 | 451 | 452 => ErrorCategory::TemporaryFailure,
        530 | 534 | 535 => ErrorCategory::Authentication,
        552 => ErrorCategory::MessageTooLarge,
        501 | 555 => ErrorCategory::Validation,
        550 | 551 | 553 | 554 => ErrorCategory::PermanentFailure,
        400..=499 => ErrorCategory::TemporaryFailure,
        500..=599 => ErrorCategory::PermanentFailure,
        _ => ErrorCategory::Unknown,
    }
}

fn keyword_category(error: &ProviderError) -> ErrorCategory {
    let haystack = format!(
        "{} {}",
        error.code.as_deref().unwrap_or_default(),
        error.message
    )
    .to_lowercase();

    let contains_any = |needles: &[&str]| needles.iter().any(|n| haystack.contains(n));

    if contains_any(&["rate limit", "too many", "throttl", "quota"]) {
        ErrorCategory::RateLimit
    } else if contains_any(&["unauthorized", "forbidden", "invalid api key", "authentication"]) {
        ErrorCategory::Authentication
    } else if contains_any(&["too large", "size limit"]) {
        ErrorCategory::MessageTooLarge
    } else if contains_any(&["timeout", "timed out", "unavailable", "try again"]) {
        ErrorCategory::TemporaryFailure
    } else if contains_any(&["invalid", "required", "malformed"]) {
        ErrorCategory::Validation
    } else {
        ErrorCategory::Unknown
    }
}
