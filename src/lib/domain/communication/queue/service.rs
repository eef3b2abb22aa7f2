//! Queue service

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::{
    task::{JoinHandle, JoinSet},
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[cfg(test)]
use mockall::mock;

use crate::domain::communication::{
    dispatcher::{DeliveryResult, DispatchError, EmailDispatcher},
    mailer::{Message, Priority},
};

use super::{QueueConfig, QueueError, QueueFilter, QueueItem, QueueRepository, QueueStatus};

/// Counts by status plus lifetime counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSummary {
    pub total: usize,
    pub queued: usize,
    pub processing: usize,
    pub retry: usize,
    pub completed: usize,
    pub failed: usize,

    /// Items delivered since start-up
    pub processed_total: u64,

    /// Items given up on since start-up
    pub failed_total: u64,

    /// Whether a pass is running right now
    pub is_processing: bool,
}

/// What one processing pass did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Another pass was already running, nothing was done
    pub skipped: bool,

    /// Items handed to the dispatcher
    pub dispatched: usize,

    /// Items the dispatcher accepted
    pub delivered: usize,

    /// Items scheduled for another pass
    pub rescheduled: usize,

    /// Items moved to `failed`
    pub failed: usize,
}

/// Delivery queue service
#[async_trait]
pub trait QueueService: Send + Sync + 'static {
    /// Adds a message to the queue.
    ///
    /// # Returns
    /// The queue item id, or [`QueueError::Full`] when the queue is at capacity.
    async fn enqueue(&self, message: Message, priority: Priority) -> Result<Uuid, QueueError>;

    /// Dispatches the next batch of due items concurrently
    async fn process_next(&self) -> Result<BatchReport, QueueError>;

    /// Counts by status
    async fn status(&self) -> Result<QueueSummary, QueueError>;

    /// Items matching a filter, in processing order
    async fn items(&self, filter: &QueueFilter) -> Result<Vec<QueueItem>, QueueError>;

    /// Puts every failed item back in the queue, returning how many
    async fn retry_failed(&self) -> Result<usize, QueueError>;

    /// Drops every completed item, returning how many
    async fn clear_completed(&self) -> Result<usize, QueueError>;
}

#[cfg(test)]
mock! {
    pub QueueService {}

    #[async_trait]
    impl QueueService for QueueService {
        async fn enqueue(&self, message: Message, priority: Priority) -> Result<Uuid, QueueError>;
        async fn process_next(&self) -> Result<BatchReport, QueueError>;
        async fn status(&self) -> Result<QueueSummary, QueueError>;
        async fn items(&self, filter: &QueueFilter) -> Result<Vec<QueueItem>, QueueError>;
        async fn retry_failed(&self) -> Result<usize, QueueError>;
        async fn clear_completed(&self) -> Result<usize, QueueError>;
    }
}

/// Clears the busy flag when a pass ends, however it ends
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Priority queue that feeds the dispatcher on a fixed interval
pub struct DeliveryQueue<D>
where
    D: EmailDispatcher,
{
    config: QueueConfig,
    repo: Arc<dyn QueueRepository>,
    dispatcher: Arc<D>,
    busy: AtomicBool,
    sequence: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
}

impl<D> DeliveryQueue<D>
where
    D: EmailDispatcher,
{
    /// Creates a new queue
    pub fn new(config: QueueConfig, repo: Arc<dyn QueueRepository>, dispatcher: Arc<D>) -> Self {
        Self {
            config,
            repo,
            dispatcher,
            busy: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Runs a pass immediately, then one per configured interval
    #[mutants::skip]
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!(
                interval_ms = self.config.interval.as_millis() as u64,
                batch_size = self.config.batch_size,
                "Starting delivery queue"
            );

            loop {
                ticker.tick().await;

                if let Err(err) = self.process_next().await {
                    error!(error = %err, "Delivery queue pass failed");
                }
            }
        })
    }

    async fn settle(
        &self,
        mut item: QueueItem,
        result: Result<DeliveryResult, DispatchError>,
        report: &mut BatchReport,
    ) -> Result<(), QueueError> {
        match result {
            Ok(delivery) => {
                report.delivered += 1;
                self.processed.fetch_add(1, Ordering::Relaxed);

                info!(
                    queue_item_id = %item.id,
                    request_id = %item.message.id,
                    status = ?delivery.status,
                    provider = ?delivery.provider,
                    attempts = item.attempts,
                    "Queued email delivered"
                );

                if self.config.retain_completed {
                    item.status = QueueStatus::Completed;
                    item.last_error = None;
                    item.next_retry = None;
                    self.repo.put(&item).await?;
                } else {
                    self.repo.delete(&item.id).await?;
                }
            }
            Err(err) => {
                item.last_error = Some(err.to_string());

                if !err.is_retryable() || item.attempts >= self.config.retry.max_retries {
                    report.failed += 1;
                    self.failed.fetch_add(1, Ordering::Relaxed);

                    item.status = QueueStatus::Failed;
                    item.next_retry = None;

                    error!(
                        queue_item_id = %item.id,
                        request_id = %item.message.id,
                        correlation_id = ?item.message.correlation_id,
                        attempts = item.attempts,
                        error = %err,
                        "Queued email failed permanently"
                    );
                } else {
                    report.rescheduled += 1;

                    let delay = self.config.retry.backoff(item.attempts);
                    item.status = QueueStatus::Retry;
                    item.next_retry = chrono::Duration::from_std(delay)
                        .ok()
                        .and_then(|delay| Utc::now().checked_add_signed(delay));

                    warn!(
                        queue_item_id = %item.id,
                        request_id = %item.message.id,
                        attempts = item.attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Queued email will be retried"
                    );
                }

                self.repo.put(&item).await?;
            }
        }

        Ok(())
    }

    /// Hands back an item whose dispatch task died before settling it
    async fn release(&self, id: &Uuid) -> Result<(), QueueError> {
        if let Some(mut item) = self.repo.get(id).await? {
            if item.status != QueueStatus::Processing {
                return Ok(());
            }

            warn!(queue_item_id = %id, "Releasing unsettled queue item");

            item.next_retry = None;
            item.status = if item.attempts >= self.config.retry.max_retries {
                self.failed.fetch_add(1, Ordering::Relaxed);
                QueueStatus::Failed
            } else {
                QueueStatus::Retry
            };
            self.repo.put(&item).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl<D> QueueService for DeliveryQueue<D>
where
    D: EmailDispatcher,
{
    async fn enqueue(&self, message: Message, priority: Priority) -> Result<Uuid, QueueError> {
        let size = self.repo.count().await?;

        if size >= self.config.max_size {
            warn!(request_id = %message.id, size, "Delivery queue is full");

            return Err(QueueError::Full {
                capacity: self.config.max_size,
            });
        }

        let item = QueueItem::new(
            message,
            priority,
            self.sequence.fetch_add(1, Ordering::Relaxed),
        );

        self.repo.put(&item).await?;

        info!(
            queue_item_id = %item.id,
            request_id = %item.message.id,
            %priority,
            "Email queued"
        );

        Ok(item.id)
    }

    async fn process_next(&self) -> Result<BatchReport, QueueError> {
        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            debug!("Delivery queue pass already running");

            return Ok(BatchReport {
                skipped: true,
                ..BatchReport::default()
            });
        };

        let now = Utc::now();
        let batch: Vec<_> = self
            .repo
            .list()
            .await?
            .into_iter()
            .filter(|item| item.is_due(now))
            .take(self.config.batch_size)
            .collect();

        let mut report = BatchReport::default();

        if batch.is_empty() {
            return Ok(report);
        }

        let mut tasks = JoinSet::new();
        let mut in_flight = Vec::with_capacity(batch.len());

        for mut item in batch {
            item.status = QueueStatus::Processing;
            item.attempts += 1;
            self.repo.put(&item).await?;

            let dispatcher = self.dispatcher.clone();
            in_flight.push(item.id);

            tasks.spawn(async move {
                let result = dispatcher.send(&item.message).await;

                (item, result)
            });

            report.dispatched += 1;
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((item, result)) => {
                    let id = item.id;

                    if let Err(err) = self.settle(item, result, &mut report).await {
                        error!(queue_item_id = %id, error = %err, "Failed to update queue item");
                    }
                }
                Err(err) => {
                    error!(error = %err, "Queue dispatch task failed");
                }
            }
        }

        for id in &in_flight {
            self.release(id).await?;
        }

        info!(
            dispatched = report.dispatched,
            delivered = report.delivered,
            rescheduled = report.rescheduled,
            failed = report.failed,
            "Delivery queue pass finished"
        );

        Ok(report)
    }

    async fn status(&self) -> Result<QueueSummary, QueueError> {
        let items = self.repo.list().await?;

        let mut summary = QueueSummary {
            total: items.len(),
            processed_total: self.processed.load(Ordering::Relaxed),
            failed_total: self.failed.load(Ordering::Relaxed),
            is_processing: self.busy.load(Ordering::Acquire),
            ..QueueSummary::default()
        };

        for item in &items {
            match item.status {
                QueueStatus::Queued => summary.queued += 1,
                QueueStatus::Processing => summary.processing += 1,
                QueueStatus::Retry => summary.retry += 1,
                QueueStatus::Completed => summary.completed += 1,
                QueueStatus::Failed => summary.failed += 1,
            }
        }

        Ok(summary)
    }

    async fn items(&self, filter: &QueueFilter) -> Result<Vec<QueueItem>, QueueError> {
        Ok(self
            .repo
            .list()
            .await?
            .into_iter()
            .filter(|item| filter.matches(item))
            .collect())
    }

    async fn retry_failed(&self) -> Result<usize, QueueError> {
        let mut count = 0;

        for mut item in self.repo.list().await? {
            if item.status != QueueStatus::Failed {
                continue;
            }

            item.status = QueueStatus::Queued;
            item.attempts = 0;
            item.next_retry = None;
            self.repo.put(&item).await?;

            count += 1;
        }

        info!(count, "Failed emails re-queued");

        Ok(count)
    }

    async fn clear_completed(&self) -> Result<usize, QueueError> {
        let mut count = 0;

        for item in self.repo.list().await? {
            if item.status == QueueStatus::Completed && self.repo.delete(&item.id).await? {
                count += 1;
            }
        }

        debug!(count, "Completed emails cleared");

        Ok(count)
    }
}
