//! Suppression list and bounce handling

mod entry;
mod errors;
mod locks;
mod repository;
mod service;

pub use entry::{
    BounceEvent, BounceOutcome, BounceType, FeedbackEvent, SuppressionCheck, SuppressionEntry,
    SuppressionReason, UndeterminedBouncePolicy,
};
pub use errors::SuppressionError;
pub use repository::{InMemorySuppressionRepository, SuppressionRepository};
pub use service::{SuppressionConfig, SuppressionService, SuppressionServiceImpl};
