//! Lift a suppression

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;

use crate::{
    domain::communication::{
        dispatcher::EmailDispatcher, email_addresses::EmailAddress, notifications::QuoteNotifier,
        suppressions::SuppressionService,
    },
    infrastructure::http::{errors::ApiError, state::AppState},
};

/// Remove an address from the suppression list
#[utoipa::path(
    delete,
    operation_id = "delete_suppression",
    tag = "Suppressions",
    path = "/api/v1/suppressions/{email}",
    params(
        ("email" = String, Path, description = "The email address", example = "ada@example.com"),
    ),
    responses(
        (status = StatusCode::NO_CONTENT, description = "Suppression lifted"),
        (status = StatusCode::UNAUTHORIZED, description = "Missing or invalid webhook token", body = ErrorResponse),
        (status = StatusCode::NOT_FOUND, description = "Address is not suppressed", body = ErrorResponse),
    )
)]
pub async fn handler<S, D, N>(
    State(state): State<AppState<S, D, N>>,
    Path(email): Path<String>,
) -> Result<StatusCode, ApiError>
where
    S: SuppressionService,
    D: EmailDispatcher,
    N: QuoteNotifier,
{
    let email = EmailAddress::new(&email)?;

    if !state.suppressions.remove(&email).await? {
        return Err(ApiError::new_404(&format!(
            "Email address \"{}\" is not suppressed",
            email.normalized()
        )));
    }

    info!(email = %email, "suppression lifted through the API");

    Ok(StatusCode::NO_CONTENT)
}
