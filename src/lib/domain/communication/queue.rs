//! Delivery queue for asynchronous re-attempts

mod config;
mod errors;
mod item;
mod repository;
mod service;

pub use config::QueueConfig;
pub use errors::QueueError;
pub use item::{QueueFilter, QueueItem, QueueStatus};
pub use repository::{InMemoryQueueRepository, QueueRepository};
pub use service::{BatchReport, DeliveryQueue, QueueService, QueueSummary};
