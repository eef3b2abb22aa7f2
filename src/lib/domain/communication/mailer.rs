//! Provider adapter contract

mod errors;
mod message;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::mock;

pub use errors::{ProviderError, ProviderErrorKind};
pub use message::{Attachment, Message, MessageBuilder, Priority};

/// What a provider returns for an accepted message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentEmail {
    /// Message id assigned by the provider (or by us, for SMTP)
    pub message_id: String,

    /// Provider-specific response data
    pub metadata: serde_json::Value,
}

impl SentEmail {
    /// Create a new sent email with no metadata
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            metadata: serde_json::Value::Null,
        }
    }
}

/// Result of checking a provider's configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValidation {
    /// Whether the configuration can be used to send
    pub is_valid: bool,

    /// Human readable problems with the configuration
    pub errors: Vec<String>,
}

impl ConfigValidation {
    /// Builds a validation result from a list of problems
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// A configuration with no problems
    pub fn valid() -> Self {
        Self::from_errors(Vec::new())
    }
}

/// Result of a provider connectivity check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTest {
    /// Whether the provider answered
    pub success: bool,

    /// Why the check failed
    pub error: Option<String>,
}

impl From<Result<(), ProviderError>> for ConnectionTest {
    fn from(result: Result<(), ProviderError>) -> Self {
        match result {
            Ok(()) => Self {
                success: true,
                error: None,
            },
            Err(err) => Self {
                success: false,
                error: Some(err.to_string()),
            },
        }
    }
}

/// A transport able to deliver a [`Message`].
///
/// Implementations map the message into their vendor's wire format and map
/// vendor failures back into a [`ProviderError`]. They never retry; retry
/// policy belongs to the dispatcher.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    /// The provider name used in configuration and logs
    fn name(&self) -> &'static str;

    /// Send an email
    ///
    /// # Arguments
    /// * `message` - The [`Message`] to deliver.
    ///
    /// # Returns
    /// A [`Result`] with the provider's [`SentEmail`] or a normalized [`ProviderError`].
    async fn send_email(&self, message: &Message) -> Result<SentEmail, ProviderError>;

    /// Checks the configuration without touching the network
    fn validate_config(&self) -> ConfigValidation;

    /// Checks that the provider can be reached with the configured credentials
    async fn test_connection(&self) -> ConnectionTest;
}

#[cfg(test)]
mock! {
    pub Mailer {}

    #[async_trait]
    impl Mailer for Mailer {
        fn name(&self) -> &'static str;
        async fn send_email(&self, message: &Message) -> Result<SentEmail, ProviderError>;
        fn validate_config(&self) -> ConfigValidation;
        async fn test_connection(&self) -> ConnectionTest;
    }
}
