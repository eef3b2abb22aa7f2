//! Suppression list administration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::communication::suppressions::SuppressionEntry;

pub mod create;
pub mod delete;
pub mod get;
pub mod list;

/// A suppressed address
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SuppressionResponse {
    #[schema(example = "gone@example.com")]
    pub email: String,

    #[schema(example = "hard_bounce")]
    pub reason: String,

    #[schema(example = "bounces")]
    pub list: String,

    pub created_at: DateTime<Utc>,

    /// The event that caused the suppression
    #[schema(value_type = Object)]
    pub source_event: serde_json::Value,
}

impl From<SuppressionEntry> for SuppressionResponse {
    fn from(entry: SuppressionEntry) -> Self {
        Self {
            email: entry.email,
            reason: entry.reason.to_string(),
            list: entry.reason.list_name().to_string(),
            created_at: entry.created_at,
            source_event: entry.source_event,
        }
    }
}
