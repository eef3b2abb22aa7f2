use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::communication::dispatcher::DeliveryResult;

/// What happened to one notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NotificationOutcome {
    /// The dispatcher returned a result (sent, rehearsed or suppressed)
    Dispatched { result: DeliveryResult },

    /// Inline delivery failed and the message was queued for another try
    Queued { queue_item_id: Uuid, error: String },

    /// Delivery failed and nothing will retry it
    Failed { error: String },
}

impl NotificationOutcome {
    /// Whether the message reached a provider (or the dry run)
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Dispatched { result } if result.success)
    }
}

/// Outcome of notifying the customer and the business about a quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteNotificationReport {
    pub quote_id: String,
    pub customer_confirmation: NotificationOutcome,
    pub business_notification: NotificationOutcome,

    /// Someone has to contact the customer by hand
    pub requires_follow_up: bool,
}

impl QuoteNotificationReport {
    pub fn new(
        quote_id: impl Into<String>,
        customer_confirmation: NotificationOutcome,
        business_notification: NotificationOutcome,
    ) -> Self {
        let requires_follow_up =
            !customer_confirmation.is_delivered() || !business_notification.is_delivered();

        Self {
            quote_id: quote_id.into(),
            customer_confirmation,
            business_notification,
            requires_follow_up,
        }
    }
}
