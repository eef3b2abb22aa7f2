//! Provider health

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    domain::communication::{
        dispatcher::{EmailDispatcher, ProviderHealth},
        notifications::QuoteNotifier,
        suppressions::SuppressionService,
    },
    infrastructure::http::{errors::ApiError, state::AppState},
};

/// Provider health response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProvidersResponse {
    /// One entry per registered provider
    #[schema(value_type = Vec<Object>)]
    pub providers: Vec<ProviderHealth>,
}

/// Check configuration and connectivity of every provider
#[utoipa::path(
    get,
    operation_id = "provider_health",
    tag = "Providers",
    path = "/api/v1/emails/providers",
    responses(
        (status = StatusCode::OK, description = "Provider health", body = ProvidersResponse),
        (status = StatusCode::UNAUTHORIZED, description = "Missing or invalid webhook token", body = ErrorResponse),
    )
)]
pub async fn handler<S, D, N>(
    State(state): State<AppState<S, D, N>>,
) -> Result<Json<ProvidersResponse>, ApiError>
where
    S: SuppressionService,
    D: EmailDispatcher,
    N: QuoteNotifier,
{
    let providers = state.dispatcher.provider_health().await;

    Ok(Json(ProvidersResponse { providers }))
}
