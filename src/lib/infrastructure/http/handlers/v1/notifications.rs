//! Quote notifications

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use tracing::info;

use crate::{
    domain::communication::{
        dispatcher::EmailDispatcher,
        notifications::{CustomerDetails, QuoteNotificationReport, QuoteNotifier},
        suppressions::SuppressionService,
    },
    infrastructure::http::{errors::ApiError, state::AppState},
};

/// Send the customer confirmation and the business notification for a quote.
///
/// Email problems never fail the request; they show up as
/// `requires_follow_up` in the report.
#[utoipa::path(
    post,
    operation_id = "notify_quote_submitted",
    tag = "Notifications",
    path = "/api/v1/quotes/{quote_id}/notifications",
    request_body = CustomerDetails,
    params(
        ("quote_id" = String, Path, description = "The quote reference", example = "Q-1024"),
    ),
    responses(
        (status = StatusCode::OK, description = "Notification report"),
        (status = StatusCode::UNAUTHORIZED, description = "Missing or invalid webhook token", body = ErrorResponse),
        (status = StatusCode::UNPROCESSABLE_ENTITY, description = "Unprocessable entity", body = ErrorResponse),
    )
)]
pub async fn handler<S, D, N>(
    State(state): State<AppState<S, D, N>>,
    Path(quote_id): Path<String>,
    request: Result<Json<CustomerDetails>, JsonRejection>,
) -> Result<Json<QuoteNotificationReport>, ApiError>
where
    S: SuppressionService,
    D: EmailDispatcher,
    N: QuoteNotifier,
{
    let Json(customer) = request?;

    let report = state
        .notifier
        .notify_quote_submitted(&customer, &quote_id)
        .await;

    info!(
        quote_id = %quote_id,
        requires_follow_up = report.requires_follow_up,
        "quote notifications handled"
    );

    Ok(Json(report))
}
