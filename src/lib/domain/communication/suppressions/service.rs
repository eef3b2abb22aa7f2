//! Suppression service

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::mock;

use crate::domain::communication::email_addresses::EmailAddress;

use super::{
    locks::AddressLocks, BounceEvent, BounceOutcome, BounceType, FeedbackEvent, SuppressionCheck,
    SuppressionEntry, SuppressionError, SuppressionReason, SuppressionRepository,
    UndeterminedBouncePolicy,
};

/// Suppression settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuppressionConfig {
    /// Soft bounces tolerated before an address is suppressed
    pub soft_bounce_limit: u32,

    /// Treatment of bounces the provider could not classify
    pub undetermined_bounces: UndeterminedBouncePolicy,
}

impl Default for SuppressionConfig {
    fn default() -> Self {
        Self {
            soft_bounce_limit: 5,
            undetermined_bounces: UndeterminedBouncePolicy::Soft,
        }
    }
}

/// Suppression service
#[async_trait]
pub trait SuppressionService: Send + Sync + 'static {
    /// Checks whether an address may be mailed.
    ///
    /// # Arguments
    /// * `email` - The [`EmailAddress`] to check, compared case-insensitively.
    ///
    /// # Returns
    /// A [`SuppressionCheck`] whose `blocked` flag is the hard gate for sending.
    async fn is_suppressed(&self, email: &EmailAddress) -> Result<SuppressionCheck, SuppressionError>;

    /// Handles a bounce. Hard bounces suppress immediately; soft bounces count
    /// towards the configured limit.
    async fn process_bounce(&self, event: &BounceEvent) -> Result<BounceOutcome, SuppressionError>;

    /// Handles a spam complaint
    async fn process_complaint(&self, event: &FeedbackEvent) -> Result<SuppressionEntry, SuppressionError>;

    /// Handles an unsubscribe request
    async fn process_unsubscribe(&self, event: &FeedbackEvent) -> Result<SuppressionEntry, SuppressionError>;

    /// Suppresses an address on an operator's request
    async fn suppress(
        &self,
        email: &EmailAddress,
        reason: SuppressionReason,
        source_event: serde_json::Value,
    ) -> Result<SuppressionEntry, SuppressionError>;

    /// Lifts a suppression, returning whether one existed
    async fn remove(&self, email: &EmailAddress) -> Result<bool, SuppressionError>;

    /// All suppressed addresses
    async fn list(&self) -> Result<Vec<SuppressionEntry>, SuppressionError>;

    /// Soft bounces currently counted for an address
    async fn soft_bounce_count(&self, email: &EmailAddress) -> Result<u32, SuppressionError>;
}

#[cfg(test)]
mock! {
    pub SuppressionService {}

    #[async_trait]
    impl SuppressionService for SuppressionService {
        async fn is_suppressed(&self, email: &EmailAddress) -> Result<SuppressionCheck, SuppressionError>;
        async fn process_bounce(&self, event: &BounceEvent) -> Result<BounceOutcome, SuppressionError>;
        async fn process_complaint(&self, event: &FeedbackEvent) -> Result<SuppressionEntry, SuppressionError>;
        async fn process_unsubscribe(&self, event: &FeedbackEvent) -> Result<SuppressionEntry, SuppressionError>;
        async fn suppress(
            &self,
            email: &EmailAddress,
            reason: SuppressionReason,
            source_event: serde_json::Value,
        ) -> Result<SuppressionEntry, SuppressionError>;
        async fn remove(&self, email: &EmailAddress) -> Result<bool, SuppressionError>;
        async fn list(&self) -> Result<Vec<SuppressionEntry>, SuppressionError>;
        async fn soft_bounce_count(&self, email: &EmailAddress) -> Result<u32, SuppressionError>;
    }
}

/// Suppression service implementation
pub struct SuppressionServiceImpl {
    config: SuppressionConfig,
    repo: Arc<dyn SuppressionRepository>,
    locks: AddressLocks,
}

impl std::fmt::Debug for SuppressionServiceImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuppressionServiceImpl")
            .field("config", &self.config)
            .field("repo", &"SuppressionRepository")
            .finish()
    }
}

impl SuppressionServiceImpl {
    /// Creates a new suppression service.
    pub fn new(config: SuppressionConfig, repo: Arc<dyn SuppressionRepository>) -> Self {
        Self {
            config,
            repo,
            locks: AddressLocks::default(),
        }
    }

    /// Adds an entry unless the address is already suppressed, in which case
    /// the existing entry (and its reason) is kept. Must be called with the
    /// address lock held.
    async fn add_locked(
        &self,
        email: &EmailAddress,
        reason: SuppressionReason,
        source_event: serde_json::Value,
    ) -> Result<SuppressionEntry, SuppressionError> {
        let key = email.normalized();

        if let Some(existing) = self.repo.get_entry(&key).await? {
            debug!(email = %key, reason = %existing.reason, "address already suppressed");

            return Ok(existing);
        }

        let entry = SuppressionEntry::new(email, reason, source_event);

        self.repo.put_entry(&entry).await?;
        self.repo.delete_soft_bounces(&key).await?;

        info!(email = %key, reason = %reason, "address suppressed");

        Ok(entry)
    }

    async fn record_soft_bounce(&self, event: &BounceEvent) -> Result<BounceOutcome, SuppressionError> {
        let key = event.email.normalized();

        if let Some(existing) = self.repo.get_entry(&key).await? {
            return Ok(BounceOutcome::Suppressed(existing));
        }

        let count = self.repo.get_soft_bounces(&key).await?.saturating_add(1);

        if count >= self.config.soft_bounce_limit {
            let payload = json!({
                "soft_bounces": count,
                "last_bounce": event.payload,
            });

            let entry = self
                .add_locked(&event.email, SuppressionReason::SoftBounceLimit, payload)
                .await?;

            return Ok(BounceOutcome::Suppressed(entry));
        }

        self.repo.put_soft_bounces(&key, count).await?;

        debug!(email = %key, count, limit = self.config.soft_bounce_limit, "soft bounce recorded");

        Ok(BounceOutcome::SoftBounceRecorded { count })
    }
}

#[async_trait]
impl SuppressionService for SuppressionServiceImpl {
    async fn is_suppressed(&self, email: &EmailAddress) -> Result<SuppressionCheck, SuppressionError> {
        let entry = self.repo.get_entry(&email.normalized()).await?;

        Ok(entry
            .as_ref()
            .map(SuppressionCheck::from)
            .unwrap_or_else(SuppressionCheck::clear))
    }

    async fn process_bounce(&self, event: &BounceEvent) -> Result<BounceOutcome, SuppressionError> {
        let _guard = self.locks.lock(&event.email.normalized()).await;

        let bounce_type = match event.bounce_type {
            BounceType::Undetermined => match self.config.undetermined_bounces {
                UndeterminedBouncePolicy::Soft => BounceType::Soft,
                UndeterminedBouncePolicy::Hard => BounceType::Hard,
                UndeterminedBouncePolicy::Ignore => {
                    debug!(email = %event.email, "ignoring undetermined bounce");

                    return Ok(BounceOutcome::Ignored);
                }
            },
            other => other,
        };

        match bounce_type {
            BounceType::Hard => {
                let entry = self
                    .add_locked(&event.email, SuppressionReason::HardBounce, event.payload.clone())
                    .await?;

                Ok(BounceOutcome::Suppressed(entry))
            }
            _ => self.record_soft_bounce(event).await,
        }
    }

    async fn process_complaint(&self, event: &FeedbackEvent) -> Result<SuppressionEntry, SuppressionError> {
        let _guard = self.locks.lock(&event.email.normalized()).await;

        warn!(email = %event.email, "spam complaint received");

        self.add_locked(&event.email, SuppressionReason::SpamComplaint, event.payload.clone())
            .await
    }

    async fn process_unsubscribe(&self, event: &FeedbackEvent) -> Result<SuppressionEntry, SuppressionError> {
        let _guard = self.locks.lock(&event.email.normalized()).await;

        self.add_locked(&event.email, SuppressionReason::Unsubscribe, event.payload.clone())
            .await
    }

    async fn suppress(
        &self,
        email: &EmailAddress,
        reason: SuppressionReason,
        source_event: serde_json::Value,
    ) -> Result<SuppressionEntry, SuppressionError> {
        let _guard = self.locks.lock(&email.normalized()).await;

        self.add_locked(email, reason, source_event).await
    }

    async fn remove(&self, email: &EmailAddress) -> Result<bool, SuppressionError> {
        let key = email.normalized();
        let _guard = self.locks.lock(&key).await;

        let removed = self.repo.delete_entry(&key).await?;
        self.repo.delete_soft_bounces(&key).await?;

        if removed {
            info!(email = %key, "suppression removed");
        }

        Ok(removed)
    }

    async fn list(&self) -> Result<Vec<SuppressionEntry>, SuppressionError> {
        self.repo.list_entries().await
    }

    async fn soft_bounce_count(&self, email: &EmailAddress) -> Result<u32, SuppressionError> {
        self.repo.get_soft_bounces(&email.normalized()).await
    }
}
