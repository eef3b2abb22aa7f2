//! Provider delivery callbacks

use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::communication::{
    analytics::{AnalyticsEvent, AnalyticsRecorder, EventMetadata, EventType},
    email_addresses::EmailAddress,
    suppressions::{BounceEvent, BounceType, FeedbackEvent, SuppressionService},
};

/// What a provider reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryEventKind {
    Delivered,
    Opened,
    Clicked,
    Bounced,
    Complained,
    Unsubscribed,
    Deferred,
}

impl DeliveryEventKind {
    /// The analytics event this maps to; deferrals are not recorded
    pub fn event_type(&self) -> Option<EventType> {
        match self {
            Self::Delivered => Some(EventType::Delivered),
            Self::Opened => Some(EventType::Opened),
            Self::Clicked => Some(EventType::Clicked),
            Self::Bounced => Some(EventType::Bounced),
            Self::Complained => Some(EventType::Complained),
            Self::Unsubscribed => Some(EventType::Unsubscribed),
            Self::Deferred => None,
        }
    }
}

impl fmt::Display for DeliveryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.event_type() {
            Some(event_type) => write!(f, "{event_type}"),
            None => write!(f, "deferred"),
        }
    }
}

/// A delivery event normalized from a provider callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryEvent {
    /// Provider message id
    pub message_id: String,

    /// The recipient the event is about
    pub email: EmailAddress,

    pub event: DeliveryEventKind,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub email_type: Option<String>,

    /// Set for bounces
    #[serde(default)]
    pub bounce_type: Option<BounceType>,

    /// Bounce diagnostic or complaint feedback
    #[serde(default)]
    pub reason: Option<String>,

    /// Clicked URL
    #[serde(default)]
    pub url: Option<String>,

    /// Client or device description
    #[serde(default)]
    pub device: Option<String>,

    /// Approximate location
    #[serde(default)]
    pub location: Option<String>,

    /// The raw provider payload
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl DeliveryEvent {
    /// An event with no optional details
    pub fn new(message_id: impl Into<String>, email: EmailAddress, event: DeliveryEventKind) -> Self {
        Self {
            message_id: message_id.into(),
            email,
            event,
            timestamp: Utc::now(),
            email_type: None,
            bounce_type: None,
            reason: None,
            url: None,
            device: None,
            location: None,
            metadata: serde_json::Value::Null,
        }
    }

    fn analytics_event(&self) -> Option<AnalyticsEvent> {
        let event_type = self.event.event_type()?;

        let metadata = match self.event {
            DeliveryEventKind::Opened | DeliveryEventKind::Clicked => EventMetadata::Engagement {
                device: self.device.clone(),
                location: self.location.clone(),
                url: self.url.clone(),
            },
            DeliveryEventKind::Bounced => EventMetadata::Bounce {
                bounce_type: self
                    .bounce_type
                    .unwrap_or(BounceType::Undetermined)
                    .to_string(),
                reason: self.reason.clone(),
            },
            _ => EventMetadata::None,
        };

        let mut event = AnalyticsEvent::new(&self.message_id, event_type)
            .at(self.timestamp)
            .with_metadata(metadata);

        if let Some(email_type) = &self.email_type {
            event = event.with_email_type(email_type);
        }

        Some(event)
    }

    fn feedback(&self) -> FeedbackEvent {
        FeedbackEvent {
            email: self.email.clone(),
            timestamp: self.timestamp,
            payload: self.metadata.clone(),
        }
    }
}

/// Routes delivery events to analytics and the suppression list.
///
/// Both sides are best effort: a failure is logged and never reaches the
/// provider callback.
pub struct DeliveryEventHandler<S>
where
    S: SuppressionService,
{
    suppressions: Arc<S>,
    analytics: Arc<AnalyticsRecorder>,
}

impl<S> DeliveryEventHandler<S>
where
    S: SuppressionService,
{
    /// Creates a new handler
    pub fn new(suppressions: Arc<S>, analytics: Arc<AnalyticsRecorder>) -> Self {
        Self {
            suppressions,
            analytics,
        }
    }

    /// Handles one event
    pub async fn handle(&self, event: &DeliveryEvent) {
        debug!(
            message_id = %event.message_id,
            email = %event.email,
            event = %event.event,
            "Delivery event received"
        );

        if let Some(analytics_event) = event.analytics_event() {
            self.analytics.record(analytics_event).await;
        }

        let result = match event.event {
            DeliveryEventKind::Bounced => self
                .suppressions
                .process_bounce(&BounceEvent {
                    email: event.email.clone(),
                    bounce_type: event.bounce_type.unwrap_or(BounceType::Undetermined),
                    reason: event.reason.clone(),
                    timestamp: event.timestamp,
                    payload: event.metadata.clone(),
                })
                .await
                .map(|outcome| debug!(email = %event.email, ?outcome, "Bounce processed")),
            DeliveryEventKind::Complained => self
                .suppressions
                .process_complaint(&event.feedback())
                .await
                .map(|_| info!(email = %event.email, "Spam complaint processed")),
            DeliveryEventKind::Unsubscribed => self
                .suppressions
                .process_unsubscribe(&event.feedback())
                .await
                .map(|_| info!(email = %event.email, "Unsubscribe processed")),
            DeliveryEventKind::Deferred => {
                debug!(
                    message_id = %event.message_id,
                    reason = ?event.reason,
                    "Delivery deferred by receiving server"
                );

                Ok(())
            }
            _ => Ok(()),
        };

        if let Err(err) = result {
            warn!(
                message_id = %event.message_id,
                email = %event.email,
                event = %event.event,
                error = %err,
                "Failed to update suppressions from delivery event"
            );
        }
    }

    /// Handles a batch of events in order, returning how many were handled
    pub async fn handle_all(&self, events: &[DeliveryEvent]) -> usize {
        for event in events {
            self.handle(event).await;
        }

        events.len()
    }
}
