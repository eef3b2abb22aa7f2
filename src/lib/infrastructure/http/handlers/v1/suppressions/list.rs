//! List suppressed addresses

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    domain::communication::{
        dispatcher::EmailDispatcher, notifications::QuoteNotifier, suppressions::SuppressionService,
    },
    infrastructure::http::{errors::ApiError, state::AppState},
};

use super::SuppressionResponse;

/// Suppression list response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SuppressionListResponse {
    pub suppressions: Vec<SuppressionResponse>,
}

/// List every suppressed address
#[utoipa::path(
    get,
    operation_id = "list_suppressions",
    tag = "Suppressions",
    path = "/api/v1/suppressions",
    responses(
        (status = StatusCode::OK, description = "Suppressed addresses", body = SuppressionListResponse),
        (status = StatusCode::UNAUTHORIZED, description = "Missing or invalid webhook token", body = ErrorResponse),
    )
)]
pub async fn handler<S, D, N>(
    State(state): State<AppState<S, D, N>>,
) -> Result<Json<SuppressionListResponse>, ApiError>
where
    S: SuppressionService,
    D: EmailDispatcher,
    N: QuoteNotifier,
{
    let suppressions = state
        .suppressions
        .list()
        .await?
        .into_iter()
        .map(SuppressionResponse::from)
        .collect();

    Ok(Json(SuppressionListResponse { suppressions }))
}
