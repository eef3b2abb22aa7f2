//! Dispatch errors

use thiserror::Error;

use crate::domain::communication::{mailer::ProviderError, templates::TemplateError};

use super::DeliveryAttempt;

/// Errors that end a dispatch
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The message can never be sent as built
    #[error("invalid email: {}", .0.join(", "))]
    Validation(Vec<String>),

    /// No provider is configured
    #[error("no email providers are configured")]
    NoProviders,

    /// The template could not be rendered
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Every provider and attempt failed
    #[error("all providers failed after {} attempts: {last_error}", attempts.len())]
    AllProvidersFailed {
        /// Every attempt made, in order
        attempts: Vec<DeliveryAttempt>,

        /// The final failure
        last_error: ProviderError,
    },
}

impl DispatchError {
    /// Whether re-sending later could succeed: some provider failed for a
    /// transient reason, or none was available.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NoProviders => true,
            Self::AllProvidersFailed { attempts, .. } => {
                attempts.is_empty()
                    || attempts
                        .iter()
                        .any(|a| a.error.as_ref().is_some_and(|e| e.retryable))
            }
            Self::Validation(_) | Self::Template(_) => false,
        }
    }
}
