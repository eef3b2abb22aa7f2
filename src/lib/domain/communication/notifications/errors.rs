//! Notification errors

use thiserror::Error;
use tracing::debug;

use crate::domain::communication::{
    dispatcher::DispatchError, email_addresses::EmailAddressError, templates::TemplateError,
};

/// Errors raised while notifying about a quote
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The business notification inbox is not a valid address
    #[error("invalid notification address: {0}")]
    InvalidRecipient(#[from] EmailAddressError),

    /// Rendering failed
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Dispatch failed
    #[error(transparent)]
    Dispatch(DispatchError),
}

impl From<DispatchError> for NotificationError {
    fn from(err: DispatchError) -> Self {
        debug!("DispatchError -> NotificationError");

        NotificationError::Dispatch(err)
    }
}
