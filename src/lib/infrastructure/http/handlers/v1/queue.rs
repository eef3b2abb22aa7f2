//! Delivery queue administration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::communication::queue::QueueItem;

pub mod clear_completed;
pub mod get_queue;
pub mod retry_failed;

/// A queue item without its message body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueueItemResponse {
    pub id: Uuid,

    #[schema(example = "retry")]
    pub status: String,

    #[schema(example = "high")]
    pub priority: String,

    pub attempts: u32,
    pub last_error: Option<String>,
    pub next_retry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,

    #[schema(example = "Your Moving Quote #Q-1 - Acme Movers")]
    pub subject: String,

    pub recipients: Vec<String>,
    pub email_type: String,
    pub correlation_id: Option<String>,
}

impl From<QueueItem> for QueueItemResponse {
    fn from(item: QueueItem) -> Self {
        Self {
            id: item.id,
            status: item.status.to_string(),
            priority: item.priority.to_string(),
            attempts: item.attempts,
            last_error: item.last_error,
            next_retry: item.next_retry,
            created_at: item.created_at,
            recipients: item
                .message
                .recipients()
                .map(|address| address.to_string())
                .collect(),
            subject: item.message.subject,
            email_type: item.message.email_type,
            correlation_id: item.message.correlation_id,
        }
    }
}
