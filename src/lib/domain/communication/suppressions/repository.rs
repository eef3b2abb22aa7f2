//! Suppression repository module

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

#[cfg(test)]
use mockall::mock;

use super::{SuppressionEntry, SuppressionError};

/// Storage for suppression entries and soft bounce counters, keyed by the
/// lowercased address.
#[async_trait]
pub trait SuppressionRepository: Send + Sync + 'static {
    /// Get the entry for an address
    async fn get_entry(&self, email: &str) -> Result<Option<SuppressionEntry>, SuppressionError>;

    /// Insert or replace an entry
    async fn put_entry(&self, entry: &SuppressionEntry) -> Result<(), SuppressionError>;

    /// Delete an entry, returning whether one existed
    async fn delete_entry(&self, email: &str) -> Result<bool, SuppressionError>;

    /// All entries, oldest first
    async fn list_entries(&self) -> Result<Vec<SuppressionEntry>, SuppressionError>;

    /// Soft bounces counted for an address
    async fn get_soft_bounces(&self, email: &str) -> Result<u32, SuppressionError>;

    /// Store the soft bounce count for an address
    async fn put_soft_bounces(&self, email: &str, count: u32) -> Result<(), SuppressionError>;

    /// Forget the soft bounce count for an address
    async fn delete_soft_bounces(&self, email: &str) -> Result<(), SuppressionError>;
}

#[cfg(test)]
mock! {
    pub SuppressionRepository {}

    #[async_trait]
    impl SuppressionRepository for SuppressionRepository {
        async fn get_entry(&self, email: &str) -> Result<Option<SuppressionEntry>, SuppressionError>;
        async fn put_entry(&self, entry: &SuppressionEntry) -> Result<(), SuppressionError>;
        async fn delete_entry(&self, email: &str) -> Result<bool, SuppressionError>;
        async fn list_entries(&self) -> Result<Vec<SuppressionEntry>, SuppressionError>;
        async fn get_soft_bounces(&self, email: &str) -> Result<u32, SuppressionError>;
        async fn put_soft_bounces(&self, email: &str, count: u32) -> Result<(), SuppressionError>;
        async fn delete_soft_bounces(&self, email: &str) -> Result<(), SuppressionError>;
    }
}

/// Process-local suppression storage
#[derive(Debug, Default)]
pub struct InMemorySuppressionRepository {
    entries: RwLock<HashMap<String, SuppressionEntry>>,
    soft_bounces: RwLock<HashMap<String, u32>>,
}

impl InMemorySuppressionRepository {
    /// Creates an empty repository
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SuppressionRepository for InMemorySuppressionRepository {
    async fn get_entry(&self, email: &str) -> Result<Option<SuppressionEntry>, SuppressionError> {
        Ok(self.entries.read().await.get(email).cloned())
    }

    async fn put_entry(&self, entry: &SuppressionEntry) -> Result<(), SuppressionError> {
        self.entries
            .write()
            .await
            .insert(entry.email.clone(), entry.clone());

        Ok(())
    }

    async fn delete_entry(&self, email: &str) -> Result<bool, SuppressionError> {
        Ok(self.entries.write().await.remove(email).is_some())
    }

    async fn list_entries(&self) -> Result<Vec<SuppressionEntry>, SuppressionError> {
        let mut entries: Vec<_> = self.entries.read().await.values().cloned().collect();

        entries.sort_by_key(|entry| entry.created_at);

        Ok(entries)
    }

    async fn get_soft_bounces(&self, email: &str) -> Result<u32, SuppressionError> {
        Ok(self
            .soft_bounces
            .read()
            .await
            .get(email)
            .copied()
            .unwrap_or_default())
    }

    async fn put_soft_bounces(&self, email: &str, count: u32) -> Result<(), SuppressionError> {
        self.soft_bounces
            .write()
            .await
            .insert(email.to_string(), count);

        Ok(())
    }

    async fn delete_soft_bounces(&self, email: &str) -> Result<(), SuppressionError> {
        self.soft_bounces.write().await.remove(email);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use testresult::TestResult;

    use crate::domain::communication::{
        email_addresses::EmailAddress, suppressions::SuppressionReason,
    };

    use super::*;

    #[tokio::test]
    async fn test_put_get_delete_entry() -> TestResult {
        let repo = InMemorySuppressionRepository::new();
        let entry = SuppressionEntry::new(
            &EmailAddress::new("User@Example.com")?,
            SuppressionReason::Manual,
            json!({}),
        );

        repo.put_entry(&entry).await?;

        assert_eq!(repo.get_entry("user@example.com").await?, Some(entry));
        assert!(repo.delete_entry("user@example.com").await?);
        assert!(!repo.delete_entry("user@example.com").await?);
        assert_eq!(repo.get_entry("user@example.com").await?, None);

        Ok(())
    }

    #[tokio::test]
    async fn test_soft_bounce_counter_defaults_to_zero() -> TestResult {
        let repo = InMemorySuppressionRepository::new();

        assert_eq!(repo.get_soft_bounces("a@example.com").await?, 0);

        repo.put_soft_bounces("a@example.com", 2).await?;
        assert_eq!(repo.get_soft_bounces("a@example.com").await?, 2);

        repo.delete_soft_bounces("a@example.com").await?;
        assert_eq!(repo.get_soft_bounces("a@example.com").await?, 0);

        Ok(())
    }
}
