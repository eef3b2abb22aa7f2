//! Mailer errors

use std::{fmt, time::Duration};

use thiserror::Error;

/// The transport-level shape of a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// The provider answered with an error status
    Response,

    /// The attempt did not finish in time
    Timeout,

    /// The provider could not be reached
    Connection,

    /// The provider is missing credentials or endpoints
    Configuration,

    /// The message could not be encoded for the provider
    Payload,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Response => "response",
            Self::Timeout => "timeout",
            Self::Connection => "connection",
            Self::Configuration => "configuration",
            Self::Payload => "payload",
        };

        write!(f, "{kind}")
    }
}

/// A provider failure normalized across vendors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{provider} {kind} error{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
pub struct ProviderError {
    /// Name of the provider that failed
    pub provider: String,

    /// Transport-level shape of the failure
    pub kind: ProviderErrorKind,

    /// Vendor status (HTTP status or SMTP reply code)
    pub status: Option<u16>,

    /// Vendor error code or field name
    pub code: Option<String>,

    /// Vendor error message
    pub message: String,
}

impl ProviderError {
    /// An error status returned by the provider
    pub fn response(
        provider: &str,
        status: Option<u16>,
        code: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.to_string(),
            kind: ProviderErrorKind::Response,
            status,
            code,
            message: message.into(),
        }
    }

    /// The attempt exceeded its time budget
    pub fn timeout(provider: &str, after: Duration) -> Self {
        Self {
            provider: provider.to_string(),
            kind: ProviderErrorKind::Timeout,
            status: None,
            code: None,
            message: format!("no response after {}ms", after.as_millis()),
        }
    }

    /// The provider could not be reached
    pub fn connection(provider: &str, message: impl Into<String>) -> Self {
        Self {
            provider: provider.to_string(),
            kind: ProviderErrorKind::Connection,
            status: None,
            code: None,
            message: message.into(),
        }
    }

    /// The provider is not usable as configured
    pub fn configuration(provider: &str, message: impl Into<String>) -> Self {
        Self {
            provider: provider.to_string(),
            kind: ProviderErrorKind::Configuration,
            status: None,
            code: None,
            message: message.into(),
        }
    }

    /// The message could not be encoded
    pub fn payload(provider: &str, message: impl Into<String>) -> Self {
        Self {
            provider: provider.to_string(),
            kind: ProviderErrorKind::Payload,
            status: None,
            code: None,
            message: message.into(),
        }
    }
}
