//! Analytics events

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle stage of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Accepted by a provider
    Sent,

    /// Accepted by the receiving server
    Delivered,

    /// Opened by the recipient
    Opened,

    /// A link was clicked
    Clicked,

    /// Rejected by the receiving server
    Bounced,

    /// Marked as spam
    Complained,

    /// The recipient unsubscribed
    Unsubscribed,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Opened => "opened",
            Self::Clicked => "clicked",
            Self::Bounced => "bounced",
            Self::Complained => "complained",
            Self::Unsubscribed => "unsubscribed",
        };

        write!(f, "{name}")
    }
}

/// Type-specific event details
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventMetadata {
    /// Nothing extra
    #[default]
    None,

    /// The provider that accepted the message
    Sent {
        /// Provider name
        provider: String,

        /// Our request id, used as the message id by tracking links
        request_id: String,
    },

    /// Opens and clicks
    Engagement {
        /// Client or device description
        device: Option<String>,

        /// Approximate location
        location: Option<String>,

        /// Clicked URL
        url: Option<String>,
    },

    /// Bounces
    Bounce {
        /// hard / soft / undetermined
        bounce_type: String,

        /// Diagnostic text
        reason: Option<String>,
    },
}

/// One entry in the append-only analytics log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    /// Provider message id
    pub message_id: String,

    /// What happened
    pub event_type: EventType,

    /// When it happened
    pub timestamp: DateTime<Utc>,

    /// Email type tag, when known
    pub email_type: Option<String>,

    /// Type-specific details
    pub metadata: EventMetadata,
}

impl AnalyticsEvent {
    /// An event stamped now
    pub fn new(message_id: impl Into<String>, event_type: EventType) -> Self {
        Self {
            message_id: message_id.into(),
            event_type,
            timestamp: Utc::now(),
            email_type: None,
            metadata: EventMetadata::None,
        }
    }

    /// Sets the email type
    pub fn with_email_type(mut self, email_type: impl Into<String>) -> Self {
        self.email_type = Some(email_type.into());
        self
    }

    /// Sets the metadata
    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sets the timestamp
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
