//! Quote submission notifications

mod errors;
mod report;
mod service;

use serde::{Deserialize, Serialize};

use crate::domain::communication::email_addresses::EmailAddress;

pub use errors::NotificationError;
pub use report::{NotificationOutcome, QuoteNotificationReport};
pub use service::{QuoteNotifier, QuoteNotifierImpl};

#[cfg(test)]
pub mod tests {
    pub use super::service::MockQuoteNotifier;
}

/// The customer who submitted a quote request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub email: EmailAddress,
    #[serde(default)]
    pub phone: Option<String>,
    pub moving_from: String,
    pub moving_to: String,
    #[serde(default)]
    pub moving_date: Option<String>,
    #[serde(default)]
    pub home_size: Option<String>,
    #[serde(default)]
    pub additional_services: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}
