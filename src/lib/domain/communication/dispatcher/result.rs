//! Delivery results and attempt log

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::communication::{
    classifier::{Classification, ErrorCategory, Severity},
    mailer::{ConfigValidation, ConnectionTest, ProviderError},
    suppressions::SuppressionCheck,
};

/// How a dispatch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Accepted by a provider
    Sent,

    /// Rehearsed without a transport call
    DryRun,

    /// Accepted but deliberately not sent
    Suppressed,
}

/// The classified failure of one attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptError {
    /// Failure category
    pub category: ErrorCategory,

    /// Whether it was considered retryable
    pub retryable: bool,

    /// Alerting level
    pub severity: Severity,

    /// Vendor status, if any
    pub status: Option<u16>,

    /// Normalized message
    pub message: String,
}

impl AttemptError {
    /// Combines a provider error with its classification
    pub fn new(error: &ProviderError, classification: Classification) -> Self {
        Self {
            category: classification.category,
            retryable: classification.retryable,
            severity: classification.severity,
            status: error.status,
            message: error.to_string(),
        }
    }
}

/// One try against one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    /// Provider name
    pub provider: String,

    /// 1-based attempt number for this provider
    pub attempt: u32,

    /// When the attempt started
    pub started_at: DateTime<Utc>,

    /// Whether the provider accepted the message
    pub success: bool,

    /// Classified failure
    pub error: Option<AttemptError>,

    /// How long the attempt took
    pub duration: Duration,
}

/// What a successful (or short-circuited) dispatch produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResult {
    /// How the dispatch ended
    pub status: DeliveryStatus,

    /// True when a provider (or the dry run) accepted the message
    pub success: bool,

    /// Winning provider
    pub provider: Option<String>,

    /// Provider message id
    pub message_id: Option<String>,

    /// Provider attempts made
    pub attempts: u32,

    /// Wall-clock time spent dispatching
    pub elapsed: Duration,

    /// Every attempt, in order
    pub attempt_log: Vec<DeliveryAttempt>,

    /// Why the message was not sent, for suppressed results
    pub suppression: Option<SuppressionCheck>,
}

impl DeliveryResult {
    pub(super) fn sent(
        provider: &str,
        message_id: String,
        attempt_log: Vec<DeliveryAttempt>,
        elapsed: Duration,
    ) -> Self {
        Self {
            status: DeliveryStatus::Sent,
            success: true,
            provider: Some(provider.to_string()),
            message_id: Some(message_id),
            attempts: attempt_log.len() as u32,
            elapsed,
            attempt_log,
            suppression: None,
        }
    }

    pub(super) fn dry_run(message_id: String, elapsed: Duration) -> Self {
        Self {
            status: DeliveryStatus::DryRun,
            success: true,
            provider: Some("dry-run".to_string()),
            message_id: Some(message_id),
            attempts: 0,
            elapsed,
            attempt_log: Vec::new(),
            suppression: None,
        }
    }

    pub(super) fn suppressed(check: SuppressionCheck, elapsed: Duration) -> Self {
        Self {
            status: DeliveryStatus::Suppressed,
            success: false,
            provider: None,
            message_id: None,
            attempts: 0,
            elapsed,
            attempt_log: Vec::new(),
            suppression: Some(check),
        }
    }
}

/// Configuration and connectivity of one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderHealth {
    /// Provider name
    pub provider: String,

    /// Position in the trial order, if it is part of it
    pub position: Option<usize>,

    /// Offline configuration check
    pub config: ConfigValidation,

    /// Live connection check
    pub connection: ConnectionTest,
}
