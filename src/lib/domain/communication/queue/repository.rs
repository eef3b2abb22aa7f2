//! Queue repository module

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

#[cfg(test)]
use mockall::mock;

use super::{QueueError, QueueItem};

/// Storage for queue items, keyed by item id
#[async_trait]
pub trait QueueRepository: Send + Sync + 'static {
    /// Get an item
    async fn get(&self, id: &Uuid) -> Result<Option<QueueItem>, QueueError>;

    /// Insert or replace an item
    async fn put(&self, item: &QueueItem) -> Result<(), QueueError>;

    /// Delete an item, returning whether it existed
    async fn delete(&self, id: &Uuid) -> Result<bool, QueueError>;

    /// Every item in priority then insertion order
    async fn list(&self) -> Result<Vec<QueueItem>, QueueError>;

    /// Number of stored items
    async fn count(&self) -> Result<usize, QueueError>;
}

#[cfg(test)]
mock! {
    pub QueueRepository {}

    #[async_trait]
    impl QueueRepository for QueueRepository {
        async fn get(&self, id: &Uuid) -> Result<Option<QueueItem>, QueueError>;
        async fn put(&self, item: &QueueItem) -> Result<(), QueueError>;
        async fn delete(&self, id: &Uuid) -> Result<bool, QueueError>;
        async fn list(&self) -> Result<Vec<QueueItem>, QueueError>;
        async fn count(&self) -> Result<usize, QueueError>;
    }
}

/// Process-local queue storage
#[derive(Debug, Default)]
pub struct InMemoryQueueRepository {
    items: RwLock<HashMap<Uuid, QueueItem>>,
}

impl InMemoryQueueRepository {
    /// Creates an empty repository
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueRepository for InMemoryQueueRepository {
    async fn get(&self, id: &Uuid) -> Result<Option<QueueItem>, QueueError> {
        Ok(self.items.read().await.get(id).cloned())
    }

    async fn put(&self, item: &QueueItem) -> Result<(), QueueError> {
        self.items.write().await.insert(item.id, item.clone());

        Ok(())
    }

    async fn delete(&self, id: &Uuid) -> Result<bool, QueueError> {
        Ok(self.items.write().await.remove(id).is_some())
    }

    async fn list(&self) -> Result<Vec<QueueItem>, QueueError> {
        let mut items: Vec<_> = self.items.read().await.values().cloned().collect();

        items.sort_by_key(QueueItem::order_key);

        Ok(items)
    }

    async fn count(&self) -> Result<usize, QueueError> {
        Ok(self.items.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::domain::communication::mailer::{Message, Priority};

    use super::*;

    #[tokio::test]
    async fn test_list_is_ordered_by_priority_then_sequence() -> TestResult {
        let repo = InMemoryQueueRepository::new();

        for (sequence, priority) in [Priority::Low, Priority::High, Priority::Low, Priority::Critical]
            .into_iter()
            .enumerate()
        {
            repo.put(&QueueItem::new(
                Message::builder().subject("s").build(),
                priority,
                sequence as u64,
            ))
            .await?;
        }

        let items = repo.list().await?;

        assert_eq!(
            items.iter().map(|i| i.sequence).collect::<Vec<_>>(),
            vec![3, 1, 0, 2]
        );
        assert_eq!(repo.count().await?, 4);

        Ok(())
    }

    #[tokio::test]
    async fn test_put_replaces_and_delete_removes() -> TestResult {
        let repo = InMemoryQueueRepository::new();
        let mut item = QueueItem::new(Message::builder().build(), Priority::Normal, 0);

        repo.put(&item).await?;
        item.attempts = 2;
        repo.put(&item).await?;

        assert_eq!(repo.get(&item.id).await?.map(|i| i.attempts), Some(2));
        assert!(repo.delete(&item.id).await?);
        assert!(!repo.delete(&item.id).await?);
        assert_eq!(repo.get(&item.id).await?, None);

        Ok(())
    }
}
