//! Suppress an address by hand

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    domain::communication::{
        dispatcher::EmailDispatcher,
        email_addresses::EmailAddress,
        notifications::QuoteNotifier,
        suppressions::{SuppressionReason, SuppressionService},
    },
    infrastructure::http::{errors::ApiError, state::AppState},
};

use super::SuppressionResponse;

/// Create suppression request body
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateSuppressionBody {
    /// The address to suppress
    #[schema(example = "ada@example.com")]
    pub email: String,

    /// Defaults to `manual`
    #[schema(value_type = Option<String>, example = "unsubscribe")]
    #[serde(default)]
    pub reason: Option<SuppressionReason>,

    /// Free-form note kept with the entry
    #[serde(default)]
    pub note: Option<String>,
}

/// Suppress an address
#[utoipa::path(
    post,
    operation_id = "create_suppression",
    tag = "Suppressions",
    path = "/api/v1/suppressions",
    request_body = CreateSuppressionBody,
    responses(
        (status = StatusCode::CREATED, description = "Address suppressed", body = SuppressionResponse),
        (status = StatusCode::UNAUTHORIZED, description = "Missing or invalid webhook token", body = ErrorResponse),
        (status = StatusCode::UNPROCESSABLE_ENTITY, description = "Unprocessable entity", body = ErrorResponse),
    )
)]
pub async fn handler<S, D, N>(
    State(state): State<AppState<S, D, N>>,
    request: Result<Json<CreateSuppressionBody>, JsonRejection>,
) -> Result<(StatusCode, Json<SuppressionResponse>), ApiError>
where
    S: SuppressionService,
    D: EmailDispatcher,
    N: QuoteNotifier,
{
    let Json(request) = request?;

    let email = EmailAddress::new(&request.email)?;
    let reason = request.reason.unwrap_or(SuppressionReason::Manual);

    let entry = state
        .suppressions
        .suppress(
            &email,
            reason,
            json!({ "source": "api", "note": request.note }),
        )
        .await?;

    info!(email = %email, reason = %entry.reason, "address suppressed through the API");

    Ok((StatusCode::CREATED, Json(entry.into())))
}
