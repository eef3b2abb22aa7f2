//! Delivery statistics

use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    domain::communication::{
        analytics::EmailStats, dispatcher::EmailDispatcher, notifications::QuoteNotifier,
        suppressions::SuppressionService,
    },
    infrastructure::http::{errors::ApiError, state::AppState},
};

/// Window used when the query gives no start
const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Statistics window, `start <= t < end`
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AnalyticsQuery {
    /// Defaults to 30 days before `end`
    pub start: Option<DateTime<Utc>>,

    /// Defaults to now
    pub end: Option<DateTime<Utc>>,
}

/// Statistics response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AnalyticsResponse {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,

    /// Totals and rates across every email type
    #[schema(value_type = Object)]
    pub overall: EmailStats,

    /// The same, per email type
    #[schema(value_type = Object)]
    pub by_type: BTreeMap<String, EmailStats>,
}

/// Get delivery statistics
#[utoipa::path(
    get,
    operation_id = "get_analytics",
    tag = "Analytics",
    path = "/api/v1/emails/analytics",
    params(AnalyticsQuery),
    responses(
        (status = StatusCode::OK, description = "Statistics for the window", body = AnalyticsResponse),
        (status = StatusCode::UNAUTHORIZED, description = "Missing or invalid webhook token", body = ErrorResponse),
        (status = StatusCode::UNPROCESSABLE_ENTITY, description = "Invalid window", body = ErrorResponse),
    )
)]
pub async fn handler<S, D, N>(
    State(state): State<AppState<S, D, N>>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsResponse>, ApiError>
where
    S: SuppressionService,
    D: EmailDispatcher,
    N: QuoteNotifier,
{
    let end = query.end.unwrap_or_else(Utc::now);
    let start = query
        .start
        .unwrap_or_else(|| end - Duration::days(DEFAULT_WINDOW_DAYS));

    if start > end {
        return Err(ApiError::new_422("start must not be after end"));
    }

    let overall = state.analytics.stats(start, end).await;
    let by_type = state.analytics.stats_by_type(start, end).await;

    Ok(Json(AnalyticsResponse {
        start,
        end,
        overall,
        by_type,
    }))
}
