//! Queue errors

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Errors raised by the delivery queue
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue holds `capacity` items already
    #[error("queue is full ({capacity} items)")]
    Full { capacity: usize },

    /// No item with this id
    #[error("queue item {0} not found")]
    NotFound(Uuid),

    /// The backing store failed
    #[error("queue store error: {0}")]
    StoreError(String),

    /// Unknown error
    #[error(transparent)]
    UnknownError(#[from] anyhow::Error),
}

impl From<tokio::task::JoinError> for QueueError {
    fn from(err: tokio::task::JoinError) -> Self {
        debug!("Queue task failed: {err:?}");

        QueueError::UnknownError(err.into())
    }
}
