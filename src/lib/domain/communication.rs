//! Outbound email: dispatch, retry, suppression, queueing and analytics

pub mod analytics;
pub mod classifier;
pub mod dispatcher;
pub mod email_addresses;
pub mod mailer;
pub mod notifications;
pub mod queue;
pub mod retry;
pub mod suppressions;
pub mod templates;
pub mod webhooks;
