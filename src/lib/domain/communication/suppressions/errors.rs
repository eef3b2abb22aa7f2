//! Suppression errors

use thiserror::Error;

/// Errors raised by the suppression store
#[derive(Debug, Error)]
pub enum SuppressionError {
    /// The backing store failed
    #[error("suppression store error: {0}")]
    StoreError(String),

    /// Unknown error
    #[error(transparent)]
    UnknownError(#[from] anyhow::Error),
}

impl From<sqlx::Error> for SuppressionError {
    fn from(err: sqlx::Error) -> Self {
        SuppressionError::StoreError(err.to_string())
    }
}

impl From<serde_json::Error> for SuppressionError {
    fn from(err: serde_json::Error) -> Self {
        SuppressionError::StoreError(err.to_string())
    }
}
