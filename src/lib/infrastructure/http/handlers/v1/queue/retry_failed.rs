//! Requeue failed items

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::{
    domain::communication::{
        dispatcher::EmailDispatcher, notifications::QuoteNotifier, suppressions::SuppressionService,
    },
    infrastructure::http::{errors::ApiError, state::AppState},
};

/// Retry response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryFailedResponse {
    /// Items put back in the queue
    #[schema(example = 3)]
    pub retried: usize,
}

/// Put every failed queue item back in the queue
#[utoipa::path(
    post,
    operation_id = "retry_failed",
    tag = "Queue",
    path = "/api/v1/emails/queue/retry",
    responses(
        (status = StatusCode::OK, description = "Failed items requeued", body = RetryFailedResponse),
        (status = StatusCode::UNAUTHORIZED, description = "Missing or invalid webhook token", body = ErrorResponse),
    )
)]
pub async fn handler<S, D, N>(
    State(state): State<AppState<S, D, N>>,
) -> Result<Json<RetryFailedResponse>, ApiError>
where
    S: SuppressionService,
    D: EmailDispatcher,
    N: QuoteNotifier,
{
    let retried = state.queue.retry_failed().await?;

    info!(retried, "failed queue items requeued");

    Ok(Json(RetryFailedResponse { retried }))
}
