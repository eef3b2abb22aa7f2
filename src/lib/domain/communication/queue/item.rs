//! Queue items

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::communication::mailer::{Message, Priority};

/// Where an item is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Queued,
    Processing,
    Retry,
    Completed,
    Failed,
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Retry => "retry",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };

        write!(f, "{status}")
    }
}

impl std::str::FromStr for QueueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "retry" => Ok(Self::Retry),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid queue status: {s}")),
        }
    }
}

/// A message waiting in the delivery queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Queue item id
    pub id: Uuid,

    /// The message to deliver
    pub message: Message,

    /// Queue priority
    pub priority: Priority,

    /// Lifecycle status
    pub status: QueueStatus,

    /// Dispatches tried so far
    pub attempts: u32,

    /// Last dispatch error
    pub last_error: Option<String>,

    /// Earliest time a `retry` item may be picked up again
    pub next_retry: Option<DateTime<Utc>>,

    /// When the item was enqueued
    pub created_at: DateTime<Utc>,

    /// Insertion order, used to keep FIFO within a priority
    pub sequence: u64,
}

impl QueueItem {
    pub fn new(message: Message, priority: Priority, sequence: u64) -> Self {
        Self {
            id: Uuid::now_v7(),
            message,
            priority,
            status: QueueStatus::Queued,
            attempts: 0,
            last_error: None,
            next_retry: None,
            created_at: Utc::now(),
            sequence,
        }
    }

    /// Whether a pass at `now` may pick this item up
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            QueueStatus::Queued => true,
            QueueStatus::Retry => self.next_retry.map_or(true, |at| at <= now),
            _ => false,
        }
    }

    /// Sort key: priority first, then insertion order
    pub fn order_key(&self) -> (u8, u64) {
        (self.priority.rank(), self.sequence)
    }
}

/// Selects items for introspection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueFilter {
    pub status: Option<QueueStatus>,
    pub priority: Option<Priority>,
}

impl QueueFilter {
    pub fn matches(&self, item: &QueueItem) -> bool {
        self.status.map_or(true, |status| item.status == status)
            && self.priority.map_or(true, |priority| item.priority == priority)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn item(priority: Priority, sequence: u64) -> QueueItem {
        QueueItem::new(Message::builder().subject("s").build(), priority, sequence)
    }

    #[test]
    fn test_retry_items_wait_for_next_retry() {
        let now = Utc::now();
        let mut item = item(Priority::Normal, 0);

        assert!(item.is_due(now));

        item.status = QueueStatus::Retry;
        item.next_retry = Some(now + Duration::seconds(10));
        assert!(!item.is_due(now));
        assert!(item.is_due(now + Duration::seconds(10)));

        item.status = QueueStatus::Failed;
        assert!(!item.is_due(now + Duration::days(1)));
    }

    #[test]
    fn test_order_key_sorts_priority_then_insertion() {
        let mut items = vec![
            item(Priority::Low, 0),
            item(Priority::Critical, 1),
            item(Priority::Low, 2),
            item(Priority::Critical, 3),
        ];

        items.sort_by_key(QueueItem::order_key);

        assert_eq!(
            items.iter().map(|i| i.sequence).collect::<Vec<_>>(),
            vec![1, 3, 0, 2]
        );
    }

    #[test]
    fn test_filter_matches() {
        let item = item(Priority::High, 0);

        assert!(QueueFilter::default().matches(&item));
        assert!(QueueFilter {
            status: Some(QueueStatus::Queued),
            priority: Some(Priority::High),
        }
        .matches(&item));
        assert!(!QueueFilter {
            status: Some(QueueStatus::Failed),
            priority: None,
        }
        .matches(&item));
    }
}
