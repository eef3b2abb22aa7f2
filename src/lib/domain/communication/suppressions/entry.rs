//! Suppression entries and the events that create them

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::communication::email_addresses::EmailAddress;

/// Why an address is suppressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionReason {
    /// The receiving server said the address does not exist
    HardBounce,

    /// Too many transient failures in a row
    SoftBounceLimit,

    /// The recipient marked a message as spam
    SpamComplaint,

    /// The recipient asked to stop receiving email
    Unsubscribe,

    /// Added by an operator
    Manual,
}

impl SuppressionReason {
    /// Name of the list this reason files the address under
    pub fn list_name(&self) -> &'static str {
        match self {
            Self::HardBounce | Self::SoftBounceLimit => "bounces",
            Self::SpamComplaint => "complaints",
            Self::Unsubscribe => "unsubscribes",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for SuppressionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::HardBounce => "hard_bounce",
            Self::SoftBounceLimit => "soft_bounce_limit",
            Self::SpamComplaint => "spam_complaint",
            Self::Unsubscribe => "unsubscribe",
            Self::Manual => "manual",
        };

        write!(f, "{name}")
    }
}

impl std::str::FromStr for SuppressionReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hard_bounce" => Ok(Self::HardBounce),
            "soft_bounce_limit" => Ok(Self::SoftBounceLimit),
            "spam_complaint" | "complaint" => Ok(Self::SpamComplaint),
            "unsubscribe" => Ok(Self::Unsubscribe),
            "manual" => Ok(Self::Manual),
            _ => Err(format!("invalid suppression reason: {s}")),
        }
    }
}

/// An address barred from sending.
///
/// Entries never expire; only an explicit removal lifts them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuppressionEntry {
    /// Lowercased address
    pub email: String,

    /// Why it was added
    pub reason: SuppressionReason,

    /// When it was added
    pub created_at: DateTime<Utc>,

    /// The event that caused it
    pub source_event: serde_json::Value,
}

impl SuppressionEntry {
    /// Creates an entry for `email`, stamped now
    pub fn new(email: &EmailAddress, reason: SuppressionReason, source_event: serde_json::Value) -> Self {
        Self {
            email: email.normalized(),
            reason,
            created_at: Utc::now(),
            source_event,
        }
    }
}

/// Result of a suppression lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressionCheck {
    /// Whether sending is barred
    pub blocked: bool,

    /// Why, if blocked
    pub reason: Option<SuppressionReason>,

    /// Lists the address appears on
    pub lists: Vec<String>,
}

impl SuppressionCheck {
    /// Not suppressed
    pub fn clear() -> Self {
        Self::default()
    }
}

impl From<&SuppressionEntry> for SuppressionCheck {
    fn from(entry: &SuppressionEntry) -> Self {
        Self {
            blocked: true,
            reason: Some(entry.reason),
            lists: vec![entry.reason.list_name().to_string()],
        }
    }
}

/// How the receiving server classified a bounce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BounceType {
    /// Permanent
    Hard,

    /// Transient
    Soft,

    /// The provider could not tell
    Undetermined,
}

impl fmt::Display for BounceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Hard => "hard",
            Self::Soft => "soft",
            Self::Undetermined => "undetermined",
        };

        write!(f, "{name}")
    }
}

/// What to do with a bounce whose type is undetermined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndeterminedBouncePolicy {
    /// Count it towards the soft bounce limit
    #[default]
    Soft,

    /// Suppress immediately
    Hard,

    /// Record nothing
    Ignore,
}

impl std::str::FromStr for UndeterminedBouncePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "soft" => Ok(Self::Soft),
            "hard" => Ok(Self::Hard),
            "ignore" => Ok(Self::Ignore),
            _ => Err(format!("invalid undetermined bounce policy: {s}")),
        }
    }
}

/// A bounce reported by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BounceEvent {
    /// The bounced recipient
    pub email: EmailAddress,

    /// Hard, soft or undetermined
    pub bounce_type: BounceType,

    /// Diagnostic text from the receiving server
    pub reason: Option<String>,

    /// When the bounce happened
    pub timestamp: DateTime<Utc>,

    /// The raw provider payload
    pub payload: serde_json::Value,
}

/// A complaint or unsubscribe reported by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    /// The recipient
    pub email: EmailAddress,

    /// When it happened
    pub timestamp: DateTime<Utc>,

    /// The raw provider payload
    pub payload: serde_json::Value,
}

/// What processing a bounce did
#[derive(Debug, Clone, PartialEq)]
pub enum BounceOutcome {
    /// The address is now (or already was) suppressed
    Suppressed(SuppressionEntry),

    /// A soft bounce was counted
    SoftBounceRecorded {
        /// Soft bounces counted so far
        count: u32,
    },

    /// The bounce was ignored by policy
    Ignored,
}
