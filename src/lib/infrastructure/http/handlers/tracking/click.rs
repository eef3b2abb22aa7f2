//! Click-tracking redirect

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    domain::communication::{
        analytics::{AnalyticsEvent, EventMetadata, EventType},
        dispatcher::EmailDispatcher,
        notifications::QuoteNotifier,
        suppressions::SuppressionService,
    },
    infrastructure::http::{errors::ApiError, state::AppState},
};

/// Query of a tracked link
#[derive(Debug, Deserialize)]
pub struct ClickParams {
    /// Original link target
    pub url: String,

    /// Signature of `url`
    pub sig: String,
}

/// Records a click and redirects to the original link.
///
/// Links whose signature does not verify are refused, so the endpoint cannot
/// be used as an open redirect.
pub async fn handler<S, D, N>(
    State(state): State<AppState<S, D, N>>,
    Path(message_id): Path<String>,
    Query(params): Query<ClickParams>,
) -> Result<Response, ApiError>
where
    S: SuppressionService,
    D: EmailDispatcher,
    N: QuoteNotifier,
{
    let Some(tracking) = &state.tracking else {
        return Err(ApiError::new_404("Click tracking is disabled"));
    };

    if !tracking.verify(&params.url, &params.sig) {
        warn!(message_id = %message_id, "click with an invalid signature");

        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Invalid link signature"));
    }

    debug!(message_id = %message_id, url = %params.url, "link clicked");

    state
        .analytics
        .record(
            AnalyticsEvent::new(&message_id, EventType::Clicked).with_metadata(
                EventMetadata::Engagement {
                    device: None,
                    location: None,
                    url: Some(params.url.clone()),
                },
            ),
        )
        .await;

    Ok((StatusCode::FOUND, [(header::LOCATION, params.url)]).into_response())
}
